//! Offline template-based content generator.
//!
//! The default backend: composes a post from a rotating set of openers and
//! calls-to-action, weaving in the serving-area keywords it is given. No
//! network, no credentials, never fails — a fresh install can start
//! publishing before any API key is configured.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use localboost_core::error::Result;
use localboost_core::traits::ContentGenerator;

/// Opening lines, rotated per call. `{topic}` is substituted.
const OPENERS: &[&str] = &[
    "Big news from our team: {topic}!",
    "Ever wondered about {topic}? We've got you covered.",
    "This week we're all about {topic}.",
    "{topic} — done right, right here in your neighborhood.",
    "Your local experts for {topic} are at it again.",
];

/// Closing calls-to-action, rotated on the same counter.
const CALLS_TO_ACTION: &[&str] = &[
    "Call us today to learn more!",
    "Stop by or give us a call — we'd love to help.",
    "Book your appointment now, spots fill up fast!",
    "Message us for a free quote.",
    "Visit our website to get started today.",
];

/// Deterministic, offline post composer.
pub struct TemplateGenerator {
    /// Rotation counter so consecutive posts don't read identically.
    counter: AtomicUsize,
}

impl TemplateGenerator {
    pub fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
        }
    }

    /// Turn a keyword like "emergency plumber near me" into "#EmergencyPlumberNearMe".
    fn hashtag(keyword: &str) -> String {
        let mut tag = String::from("#");
        for word in keyword.split_whitespace() {
            let mut chars = word.chars().filter(|c| c.is_alphanumeric());
            if let Some(first) = chars.next() {
                tag.extend(first.to_uppercase());
                tag.extend(chars);
            }
        }
        tag
    }
}

impl Default for TemplateGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentGenerator for TemplateGenerator {
    fn name(&self) -> &str {
        "template"
    }

    async fn generate(
        &self,
        topic: &str,
        keywords: &[String],
        _style_guide: &str,
    ) -> Result<String> {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let topic = if topic.trim().is_empty() {
            "our services"
        } else {
            topic.trim()
        };

        let mut post = OPENERS[n % OPENERS.len()].replace("{topic}", topic);

        // Weave in up to three keywords as a supporting sentence.
        let picks: Vec<&str> = keywords.iter().take(3).map(String::as_str).collect();
        if !picks.is_empty() {
            post.push_str(&format!(
                " Whether you're searching for {}, our team is ready.",
                picks.join(", ")
            ));
        }

        post.push(' ');
        post.push_str(CALLS_TO_ACTION[n % CALLS_TO_ACTION.len()]);

        // Hashtag line from the same keywords, skipping any that collapse to "#".
        let tags: Vec<String> = picks
            .iter()
            .map(|k| Self::hashtag(k))
            .filter(|t| t.len() > 1)
            .collect();
        if !tags.is_empty() {
            post.push_str("\n\n");
            post.push_str(&tags.join(" "));
        }

        tracing::debug!("📝 Template generator produced {} chars", post.len());
        Ok(post)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rotates_openers_between_calls() {
        let generator = TemplateGenerator::new();
        let first = generator.generate("spring tune-up", &[], "").await.unwrap();
        let second = generator.generate("spring tune-up", &[], "").await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn weaves_keywords_and_hashtags() {
        let generator = TemplateGenerator::new();
        let keywords = vec![
            "emergency plumber near me".to_string(),
            "water heater repair".to_string(),
        ];
        let post = generator
            .generate("water heaters", &keywords, "")
            .await
            .unwrap();
        assert!(post.contains("emergency plumber near me"));
        assert!(post.contains("#EmergencyPlumberNearMe"));
        assert!(post.contains("#WaterHeaterRepair"));
    }

    #[tokio::test]
    async fn empty_topic_still_produces_a_post() {
        let generator = TemplateGenerator::new();
        let post = generator.generate("  ", &[], "").await.unwrap();
        assert!(post.contains("our services"));
    }

    #[test]
    fn hashtag_strips_punctuation() {
        assert_eq!(
            TemplateGenerator::hashtag("24/7 plumber's van"),
            "#247PlumbersVan"
        );
    }
}
