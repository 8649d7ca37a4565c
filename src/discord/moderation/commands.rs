// Anti-spam slash commands.

use crate::core::moderation::START_REPLY;
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

/// Explain what the bot does and which permissions it needs.
#[poise::command(slash_command)]
pub async fn start(ctx: Context<'_>) -> Result<(), Error> {
    ctx.say(START_REPLY).await?;
    Ok(())
}

/// Show whether a member is trusted or still on probation.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn trust(
    ctx: Context<'_>,
    #[description = "Member to look up"] user: serenity::User,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let record = ctx
        .data()
        .moderation
        .trust_status(guild_id.get(), user.id.get())
        .await?;

    let (state, color) = if record.trusted {
        ("✅ Trusted", 0x00FF00)
    } else {
        ("⏳ Probation", 0xFFA500)
    };

    let embed = serenity::CreateEmbed::new()
        .title("🛡️ Trust Status")
        .color(color)
        .field("Member", format!("<@{}>", user.id), true)
        .field("State", state, true)
        .footer(serenity::CreateEmbedFooter::new(
            "Members leave probation with their first clean message.",
        ));

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}
