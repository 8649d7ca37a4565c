// Discord side of moderation: gateway, event translation, slash commands.

pub mod commands;
pub mod events;
pub mod gateway;

pub use gateway::SerenityGateway;
