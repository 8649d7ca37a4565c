// Spam classifier backends.

pub mod keyword_classifier;
pub mod openrouter_classifier;

pub use keyword_classifier::KeywordClassifier;
pub use openrouter_classifier::OpenRouterClassifier;
