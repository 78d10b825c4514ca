//! # LocalBoost Channels
//!
//! Social platform adapters: Google Business Profile, Facebook Page,
//! Instagram Business, LinkedIn organization, X/Twitter.
//!
//! ## Design
//! - Every adapter implements [`ChannelAdapter`]; callers look adapters up
//!   by [`Platform`] in a [`ChannelRegistry`] and never branch on platform
//!   identity themselves.
//! - The registry is total: all five platforms get an entry whether or not
//!   credentials exist. Unconfigured channels answer `is_configured() ==
//!   false` and surface as explicit dashboard entries instead of silently
//!   disappearing (or worse, reporting made-up numbers).

pub mod adapters;

use std::collections::HashMap;
use std::sync::Arc;

use localboost_core::config::ChannelsConfig;
use localboost_core::traits::ChannelAdapter;
use localboost_core::types::Platform;

use crate::adapters::{
    FacebookAdapter, GoogleBusinessAdapter, InstagramAdapter, LinkedInAdapter, TwitterAdapter,
};

/// Lookup table of platform adapters, one entry per [`Platform`].
/// Clones share the adapters behind `Arc`.
#[derive(Clone)]
pub struct ChannelRegistry {
    adapters: HashMap<Platform, Arc<dyn ChannelAdapter>>,
}

impl ChannelRegistry {
    /// Build the full adapter set from config. Platforms without a config
    /// section still get an adapter — it just reports unconfigured.
    pub fn from_config(config: &ChannelsConfig) -> Self {
        let adapters: Vec<Arc<dyn ChannelAdapter>> = vec![
            Arc::new(GoogleBusinessAdapter::new(config.google_business.clone())),
            Arc::new(FacebookAdapter::new(config.facebook.clone())),
            Arc::new(InstagramAdapter::new(config.instagram.clone())),
            Arc::new(LinkedInAdapter::new(config.linkedin.clone())),
            Arc::new(TwitterAdapter::new(config.twitter.clone())),
        ];
        let registry = Self::from_adapters(adapters);
        tracing::info!(
            "🌐 Channel registry ready: {}/{} platforms configured",
            registry.configured().len(),
            Platform::ALL.len()
        );
        registry
    }

    /// Build a registry from pre-built adapters, keyed by their platform.
    pub fn from_adapters(adapters: Vec<Arc<dyn ChannelAdapter>>) -> Self {
        Self {
            adapters: adapters.into_iter().map(|a| (a.platform(), a)).collect(),
        }
    }

    /// Adapter for `platform`. Present for every platform built by
    /// [`from_config`](Self::from_config).
    pub fn get(&self, platform: Platform) -> Option<Arc<dyn ChannelAdapter>> {
        self.adapters.get(&platform).cloned()
    }

    /// Platforms with working credentials, in declaration order.
    pub fn configured(&self) -> Vec<Platform> {
        Platform::ALL
            .iter()
            .copied()
            .filter(|p| self.adapters.get(p).is_some_and(|a| a.is_configured()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use localboost_core::config::FacebookConfig;

    #[test]
    fn registry_is_total_even_with_empty_config() {
        let registry = ChannelRegistry::from_config(&ChannelsConfig::default());
        for platform in Platform::ALL {
            let adapter = registry.get(platform).unwrap();
            assert_eq!(adapter.platform(), platform);
            assert!(!adapter.is_configured());
        }
        assert!(registry.configured().is_empty());
    }

    #[test]
    fn only_platforms_with_credentials_count_as_configured() {
        let config = ChannelsConfig {
            facebook: Some(FacebookConfig {
                access_token: "tok".into(),
                page_id: "123".into(),
                enabled: true,
            }),
            ..Default::default()
        };
        let registry = ChannelRegistry::from_config(&config);
        assert_eq!(registry.configured(), vec![Platform::Facebook]);
    }

    #[test]
    fn disabled_channel_is_not_configured() {
        let config = ChannelsConfig {
            facebook: Some(FacebookConfig {
                access_token: "tok".into(),
                page_id: "123".into(),
                enabled: false,
            }),
            ..Default::default()
        };
        let registry = ChannelRegistry::from_config(&config);
        assert!(registry.configured().is_empty());
    }
}
