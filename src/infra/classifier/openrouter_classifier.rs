// LLM-backed spam classifier over the OpenRouter chat-completions API.
//
// The model is asked to answer with exactly SPAM or NOT_SPAM. Anything else,
// and any transport failure, is reported as a ClassifierError so the engine
// can fail open.
//
// **Environment Variables:**
// - `OPENROUTER_API_KEY` - enables this classifier
// - `OPENROUTER_MODEL` - model slug, e.g. `openai/gpt-4o-mini`

use crate::core::moderation::{ClassifierError, SpamClassifier, SpamVerdict};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

const SYSTEM_PROMPT: &str = "You are a spam filter for a community chat server. \
    Decide whether the user's message is spam: unsolicited advertising, scams, \
    phishing, crypto or job offers, adult content promotion, or mass invitations. \
    Ordinary conversation, questions and jokes are not spam, even if rude. \
    Reply with exactly one word: SPAM or NOT_SPAM.";

pub struct OpenRouterClassifier {
    client: Client,
    api_key: String,
    model: String,
}

impl OpenRouterClassifier {
    pub fn new(api_key: String, model: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            model,
        })
    }
}

/// Turn the model's answer into a verdict.
///
/// NOT_SPAM has to be checked first since it contains SPAM.
fn parse_verdict(answer: &str) -> Result<SpamVerdict, ClassifierError> {
    let normalized = answer
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric() && c != '_')
        .to_uppercase()
        .replace(['-', ' '], "_");

    if normalized.starts_with("NOT_SPAM") {
        Ok(SpamVerdict::NotSpam)
    } else if normalized.starts_with("SPAM") {
        Ok(SpamVerdict::Spam)
    } else {
        Err(ClassifierError::UnexpectedAnswer(answer.to_string()))
    }
}

#[async_trait]
impl SpamClassifier for OpenRouterClassifier {
    async fn classify(&self, text: &str) -> Result<SpamVerdict, ClassifierError> {
        let payload = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": text },
            ],
            "temperature": 0.0,
            "max_tokens": 5,
        });

        let response = self
            .client
            .post(OPENROUTER_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| ClassifierError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Unavailable(format!(
                "OpenRouter API error: {} - {}",
                status, text
            )));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ClassifierError::Unavailable(e.to_string()))?;

        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                ClassifierError::UnexpectedAnswer("Failed to parse response content".to_string())
            })?;

        parse_verdict(content)
    }

    fn name(&self) -> &str {
        "openrouter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_answers() {
        assert_eq!(parse_verdict("SPAM").unwrap(), SpamVerdict::Spam);
        assert_eq!(parse_verdict("NOT_SPAM").unwrap(), SpamVerdict::NotSpam);
    }

    #[test]
    fn test_parse_is_lenient_about_formatting() {
        assert_eq!(parse_verdict(" spam.\n").unwrap(), SpamVerdict::Spam);
        assert_eq!(parse_verdict("Not spam").unwrap(), SpamVerdict::NotSpam);
        assert_eq!(parse_verdict("**NOT-SPAM**").unwrap(), SpamVerdict::NotSpam);
    }

    #[test]
    fn test_parse_rejects_other_answers() {
        assert!(matches!(
            parse_verdict("I cannot help with that"),
            Err(ClassifierError::UnexpectedAnswer(_))
        ));
        assert!(parse_verdict("").is_err());
    }
}
