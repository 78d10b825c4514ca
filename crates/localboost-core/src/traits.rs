//! Collaborator traits — the seams between the engine and the outside world.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChannelSnapshot, Platform, PostReceipt};

/// One external publishing/analytics platform.
///
/// Implementations are registered in a lookup table keyed by [`Platform`];
/// the pipeline and the sync aggregator only ever talk to this trait and
/// never branch on platform identity.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// The platform this adapter serves.
    fn platform(&self) -> Platform;

    /// Whether credentials are present and the channel is enabled.
    /// Unconfigured channels appear as an explicit `Unconfigured` entry in
    /// the dashboard snapshot and are never called.
    fn is_configured(&self) -> bool;

    /// Publish `content` (plus any media URLs the platform supports).
    async fn publish(&self, content: &str, media_urls: &[String]) -> Result<PostReceipt>;

    /// Read current performance statistics from the platform.
    async fn fetch_stats(&self) -> Result<ChannelSnapshot>;
}

/// External content-generation collaborator.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Provider name, for logs and the info endpoint.
    fn name(&self) -> &str;

    /// Produce post text for `topic` using `keywords`, under the constraints
    /// in `style_guide`. Empty output is a generation failure.
    async fn generate(&self, topic: &str, keywords: &[String], style_guide: &str)
    -> Result<String>;
}
