// Offline keyword classifier.
//
// Used when no OpenRouter key is configured. Matching is case-insensitive
// (ASCII) and counts distinct keywords, so repeating one phrase does not
// push a message over the threshold.

use crate::core::moderation::{ClassifierError, SpamClassifier, SpamVerdict};
use aho_corasick::AhoCorasick;
use anyhow::{bail, Context};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;

pub const DEFAULT_KEYWORDS: &[&str] = &[
    "free nitro",
    "discord.gift/",
    "steamcommunity.com/gift",
    "claim your reward",
    "airdrop",
    "crypto signals",
    "guaranteed profit",
    "double your money",
    "investment opportunity",
    "work from home and earn",
    "earn $",
    "dm me for details",
    "onlyfans",
    "18+ content",
    "t.me/",
];

pub struct KeywordClassifier {
    matcher: AhoCorasick,
    min_matches: usize,
}

impl KeywordClassifier {
    pub fn new<I, P>(keywords: I, min_matches: usize) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        let keywords: Vec<String> = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        if keywords.is_empty() {
            bail!("Keyword list is empty");
        }

        let matcher = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(&keywords)
            .context("Failed to build keyword matcher")?;

        Ok(Self {
            matcher,
            min_matches: min_matches.max(1),
        })
    }

    pub fn with_defaults(min_matches: usize) -> anyhow::Result<Self> {
        Self::new(DEFAULT_KEYWORDS.iter().copied(), min_matches)
    }

    /// Load one keyword per line, skipping blank lines and `#` comments.
    pub fn from_file(path: impl AsRef<Path>, min_matches: usize) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read keyword file {}", path.display()))?;
        Self::new(parse_keyword_list(&contents), min_matches)
    }

    fn distinct_matches(&self, text: &str) -> usize {
        self.matcher
            .find_overlapping_iter(text)
            .map(|m| m.pattern())
            .collect::<HashSet<_>>()
            .len()
    }
}

fn parse_keyword_list(contents: &str) -> Vec<&str> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect()
}

#[async_trait]
impl SpamClassifier for KeywordClassifier {
    async fn classify(&self, text: &str) -> Result<SpamVerdict, ClassifierError> {
        if self.distinct_matches(text) >= self.min_matches {
            Ok(SpamVerdict::Spam)
        } else {
            Ok(SpamVerdict::NotSpam)
        }
    }

    fn name(&self) -> &str {
        "keywords"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_default_list_flags_common_spam() {
        let classifier = KeywordClassifier::with_defaults(1).unwrap();

        let spam = classifier
            .classify("Get FREE NITRO here: discord.gift/abc")
            .await
            .unwrap();
        let clean = classifier
            .classify("Anyone up for a game tonight?")
            .await
            .unwrap();

        assert_eq!(spam, SpamVerdict::Spam);
        assert_eq!(clean, SpamVerdict::NotSpam);
    }

    #[tokio::test]
    async fn test_threshold_counts_distinct_keywords() {
        let classifier = KeywordClassifier::new(["airdrop", "wallet"], 2).unwrap();

        assert_eq!(
            classifier.classify("airdrop airdrop airdrop").await.unwrap(),
            SpamVerdict::NotSpam
        );
        assert_eq!(
            classifier
                .classify("Connect your wallet for the airdrop")
                .await
                .unwrap(),
            SpamVerdict::Spam
        );
    }

    #[test]
    fn test_zero_threshold_is_clamped() {
        let classifier = KeywordClassifier::new(["x"], 0).unwrap();
        assert_eq!(classifier.min_matches, 1);
    }

    #[test]
    fn test_empty_list_is_rejected() {
        assert!(KeywordClassifier::new(Vec::<String>::new(), 1).is_err());
        assert!(KeywordClassifier::new(["  ", ""], 1).is_err());
    }

    #[test]
    fn test_parse_keyword_list() {
        let parsed = parse_keyword_list("# scams\nfree money\n\n  casino bonus  \n#end\n");
        assert_eq!(parsed, vec!["free money", "casino bonus"]);
    }

    #[tokio::test]
    async fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# one per line").unwrap();
        writeln!(file, "casino bonus").unwrap();

        let classifier = KeywordClassifier::from_file(file.path(), 1).unwrap();

        assert_eq!(
            classifier.classify("Casino Bonus inside!").await.unwrap(),
            SpamVerdict::Spam
        );
        assert!(KeywordClassifier::from_file("/definitely/not/here.txt", 1).is_err());
    }
}
