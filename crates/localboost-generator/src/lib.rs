//! # LocalBoost Generator
//!
//! Content generation backends for LocalBoost.
//!
//! The built-in `TemplateGenerator` works fully offline and is the default.
//! Any OpenAI-compatible chat API (OpenAI itself, or a self-hosted server
//! reached via `custom:<url>`) is handled by a single `OpenAiGenerator`.

pub mod openai;
pub mod template;

use localboost_core::config::LocalBoostConfig;
use localboost_core::error::{LocalBoostError, Result};
use localboost_core::traits::ContentGenerator;

/// Create a content generator from configuration.
///
/// `[generator].provider` selects the backend; the empty string falls back
/// to the offline template engine so a fresh install posts out of the box.
pub fn create_generator(config: &LocalBoostConfig) -> Result<Box<dyn ContentGenerator>> {
    match config.generator.provider.as_str() {
        // Offline, deterministic — no credentials needed
        "" | "template" => Ok(Box::new(template::TemplateGenerator::new())),

        // Custom endpoint: "custom:https://my-server.com/v1"
        other if other.starts_with("custom:") => Ok(Box::new(openai::OpenAiGenerator::custom(
            other,
            &config.generator,
        ))),

        "openai" => Ok(Box::new(openai::OpenAiGenerator::new(&config.generator))),

        other => Err(LocalBoostError::Config(format!(
            "Unknown generator provider '{other}' (expected template, openai, or custom:<url>)"
        ))),
    }
}

/// List all available generator backend names.
pub fn available_generators() -> Vec<&'static str> {
    vec!["template", "openai", "custom"]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_selects_template_backend() {
        let config = LocalBoostConfig::default();
        let generator = create_generator(&config).unwrap();
        assert_eq!(generator.name(), "template");
        assert!(available_generators().contains(&generator.name()));
    }

    #[test]
    fn custom_prefix_selects_openai_compatible_backend() {
        let mut config = LocalBoostConfig::default();
        config.generator.provider = "custom:https://llm.internal/v1".into();
        let generator = create_generator(&config).unwrap();
        assert_eq!(generator.name(), "custom");
    }

    #[test]
    fn unknown_provider_is_a_config_error() {
        let mut config = LocalBoostConfig::default();
        config.generator.provider = "markov".into();
        assert!(matches!(
            create_generator(&config),
            Err(LocalBoostError::Config(_))
        ));
    }
}
