//! Publish pipeline — everything that happens inside one firing.
//! Generation gates the fan-out: a failed or timed-out generation aborts
//! before any channel is called. Publishes then run concurrently, each
//! under its own timeout, and one accepted post is enough to count the
//! firing as published. Every outcome lands in the post history; nothing
//! is retried within the firing and nothing propagates to the scheduler.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use localboost_channels::ChannelRegistry;
use localboost_core::error::LocalBoostError;
use localboost_core::traits::ContentGenerator;
use localboost_core::types::{
    AutomatedPost, Platform, PlatformResult, PostStatus, ScheduleTemplate,
};
use localboost_keywords::KeywordStore;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use crate::history::PostHistory;

/// Turns one firing of a schedule template into platform posts.
pub struct PublishPipeline {
    generator: Box<dyn ContentGenerator>,
    channels: ChannelRegistry,
    keywords: Arc<KeywordStore>,
    history: Arc<AsyncMutex<PostHistory>>,
    business_profile_id: String,
    generation_timeout: Duration,
    publish_timeout: Duration,
    /// Round-robin position per template, so each schedule walks the
    /// serving areas on its own cadence. In-memory only; a restart begins
    /// again at the first area.
    cursors: Mutex<HashMap<Uuid, usize>>,
}

impl PublishPipeline {
    pub fn new(
        generator: Box<dyn ContentGenerator>,
        channels: ChannelRegistry,
        keywords: Arc<KeywordStore>,
        history: Arc<AsyncMutex<PostHistory>>,
        business_profile_id: impl Into<String>,
        generation_timeout: Duration,
        publish_timeout: Duration,
    ) -> Self {
        Self {
            generator,
            channels,
            keywords,
            history,
            business_profile_id: business_profile_id.into(),
            generation_timeout,
            publish_timeout,
            cursors: Mutex::new(HashMap::new()),
        }
    }

    /// Run one firing end to end. Infallible by design: every outcome —
    /// published, partially published, or failed — is recorded on the
    /// returned post record instead of being raised.
    pub async fn execute(
        &self,
        template: &ScheduleTemplate,
        scheduled_for: DateTime<Utc>,
    ) -> AutomatedPost {
        let mut post = AutomatedPost::begin(template, scheduled_for, &self.business_profile_id);

        // Link to a failed predecessor so operators can trace catch-ups.
        if let Some(previous) = self.history.lock().await.latest_for_schedule(template.id)
            && previous.status == PostStatus::Failed
        {
            post.retry_of = Some(previous.id);
        }

        let keywords = self.pick_area_keywords(&mut post, template.id);
        let style = style_guide(&template.platforms);

        tracing::info!(
            "📝 Generating content for '{}' via {}",
            template.name,
            self.generator.name()
        );
        let generated = match tokio::time::timeout(
            self.generation_timeout,
            self.generator
                .generate(&template.content_template, &keywords, &style),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(LocalBoostError::Generation(format!(
                "generation timed out after {:?}",
                self.generation_timeout
            ))),
        };
        let content = match generated {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => return self.abort(post, "generator returned empty content").await,
            Err(e) => return self.abort(post, e.to_string()).await,
        };
        post.generated_content = Some(content.clone());

        post.platform_results = self.fan_out(template, &content, &post.media_urls).await;

        let accepted = post.receipts().len();
        if accepted > 0 {
            post.mark_published();
            tracing::info!(
                "✅ '{}' published to {}/{} platform(s)",
                template.name,
                accepted,
                template.platforms.len()
            );
        } else {
            post.mark_failed("every platform rejected the post");
            tracing::warn!(
                "⚠️ '{}' failed on all {} platform(s)",
                template.name,
                template.platforms.len()
            );
        }
        self.save(&post).await;
        post
    }

    /// Generation never ran to completion; record the failure and stop
    /// before any channel is touched.
    async fn abort(&self, mut post: AutomatedPost, reason: impl Into<String>) -> AutomatedPost {
        let reason = reason.into();
        tracing::warn!("❌ Firing aborted before publish: {reason}");
        post.mark_failed(reason);
        self.save(&post).await;
        post
    }

    /// Pick the next serving area for this template and return its
    /// keyword cluster's terms (empty until discovery has run).
    fn pick_area_keywords(&self, post: &mut AutomatedPost, template_id: Uuid) -> Vec<String> {
        let areas = self.keywords.areas();
        if areas.is_empty() {
            return Vec::new();
        }
        let index = {
            let mut cursors = self.cursors.lock().unwrap();
            let cursor = cursors.entry(template_id).or_insert(0);
            let index = *cursor % areas.len();
            *cursor = (index + 1) % areas.len();
            index
        };
        let area = &areas[index];
        post.area = Some(area.name.clone());
        match self.keywords.cluster_for(&area.name) {
            Some(cluster) => cluster.all_keywords(),
            None => {
                tracing::debug!("🔑 No keyword cluster for area '{}' yet", area.name);
                Vec::new()
            }
        }
    }

    /// Publish to every target platform concurrently. Each call gets its
    /// own timeout; one slow or broken channel cannot hold up or sink the
    /// others.
    async fn fan_out(
        &self,
        template: &ScheduleTemplate,
        content: &str,
        media_urls: &[String],
    ) -> Vec<PlatformResult> {
        let publishes = template.platforms.iter().map(|&platform| {
            let adapter = self.channels.get(platform);
            let content = content.to_string();
            let media = media_urls.to_vec();
            let deadline = self.publish_timeout;
            async move {
                let Some(adapter) = adapter else {
                    return PlatformResult::failure(platform, "no adapter registered");
                };
                match tokio::time::timeout(deadline, adapter.publish(&content, &media)).await {
                    Ok(Ok(receipt)) => {
                        tracing::info!("✅ Published to {}: {}", platform, receipt.remote_id);
                        PlatformResult::success(receipt)
                    }
                    Ok(Err(e)) => {
                        tracing::warn!("⚠️ {} publish failed: {e}", platform);
                        PlatformResult::failure(platform, e.to_string())
                    }
                    Err(_) => {
                        tracing::warn!("⚠️ {} publish timed out after {:?}", platform, deadline);
                        PlatformResult::failure(
                            platform,
                            format!("publish timed out after {deadline:?}"),
                        )
                    }
                }
            }
        });
        futures::future::join_all(publishes).await
    }

    async fn save(&self, post: &AutomatedPost) {
        if let Err(e) = self.history.lock().await.save(post) {
            tracing::warn!("⚠️ Failed to record post in history: {e}");
        }
    }
}

/// Merged style constraints for one generation across the template's
/// platform set. The tightest length cap wins so a single text fits
/// everywhere it is going.
fn style_guide(platforms: &[Platform]) -> String {
    let cap = platforms.iter().map(|p| p.max_post_len()).min().unwrap_or(280);
    let mut guide = format!("Write for a local business audience. Hard limit: {cap} characters.");
    for platform in platforms {
        guide.push_str(&format!(" {}: {}.", platform, platform.style_hint()));
    }
    guide
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use localboost_core::error::Result;
    use localboost_core::traits::ChannelAdapter;
    use localboost_core::types::{
        ChannelSnapshot, Frequency, PostCategory, PostReceipt, ServingArea,
    };
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct StubGenerator {
        delay: Duration,
        fail: Arc<AtomicBool>,
    }

    #[async_trait]
    impl ContentGenerator for StubGenerator {
        fn name(&self) -> &str {
            "stub"
        }

        async fn generate(
            &self,
            topic: &str,
            _keywords: &[String],
            _style_guide: &str,
        ) -> Result<String> {
            tokio::time::sleep(self.delay).await;
            if self.fail.load(Ordering::SeqCst) {
                return Err(LocalBoostError::Generation("model unavailable".into()));
            }
            Ok(format!("Fresh take on {topic}"))
        }
    }

    fn instant_generator() -> StubGenerator {
        StubGenerator {
            delay: Duration::ZERO,
            fail: Arc::new(AtomicBool::new(false)),
        }
    }

    struct StubAdapter {
        platform: Platform,
        configured: bool,
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    impl StubAdapter {
        fn ok(platform: Platform, calls: &Arc<AtomicUsize>) -> Arc<dyn ChannelAdapter> {
            Arc::new(Self {
                platform,
                configured: true,
                fail: false,
                calls: calls.clone(),
            })
        }

        fn failing(platform: Platform, calls: &Arc<AtomicUsize>) -> Arc<dyn ChannelAdapter> {
            Arc::new(Self {
                platform,
                configured: true,
                fail: true,
                calls: calls.clone(),
            })
        }

        fn unconfigured(platform: Platform, calls: &Arc<AtomicUsize>) -> Arc<dyn ChannelAdapter> {
            Arc::new(Self {
                platform,
                configured: false,
                fail: false,
                calls: calls.clone(),
            })
        }
    }

    #[async_trait]
    impl ChannelAdapter for StubAdapter {
        fn platform(&self) -> Platform {
            self.platform
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn publish(&self, _content: &str, _media_urls: &[String]) -> Result<PostReceipt> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.configured {
                return Err(LocalBoostError::Unconfigured(self.platform.to_string()));
            }
            if self.fail {
                return Err(LocalBoostError::Publish(format!(
                    "{}: simulated outage",
                    self.platform
                )));
            }
            Ok(PostReceipt {
                platform: self.platform,
                remote_id: format!("{}-1", self.platform),
                url: None,
                posted_at: Utc::now(),
            })
        }

        async fn fetch_stats(&self) -> Result<ChannelSnapshot> {
            Err(LocalBoostError::Fetch("not exercised here".into()))
        }
    }

    fn pipeline(
        adapters: Vec<Arc<dyn ChannelAdapter>>,
        generator: StubGenerator,
        areas: &[&str],
    ) -> PublishPipeline {
        let dir = std::env::temp_dir().join(format!("lb-pipeline-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).ok();
        let areas = areas
            .iter()
            .map(|name| ServingArea {
                name: name.to_string(),
                zip_codes: Vec::new(),
                radius_km: None,
            })
            .collect();
        let keywords = Arc::new(KeywordStore::open(&dir.join("keywords"), areas));
        let history = Arc::new(AsyncMutex::new(
            PostHistory::open(&dir.join("posts.db")).unwrap(),
        ));
        PublishPipeline::new(
            Box::new(generator),
            ChannelRegistry::from_adapters(adapters),
            keywords,
            history,
            "test-biz",
            Duration::from_millis(100),
            Duration::from_millis(100),
        )
    }

    fn template(platforms: Vec<Platform>) -> ScheduleTemplate {
        ScheduleTemplate::new(
            "weekly special",
            "friday pizza deal",
            Frequency::Daily,
            "09:00",
            platforms,
            PostCategory::Promotional,
        )
    }

    #[tokio::test]
    async fn one_accepted_platform_is_enough_to_publish() {
        let calls = Arc::new(AtomicUsize::new(0));
        let p = pipeline(
            vec![
                StubAdapter::ok(Platform::Facebook, &calls),
                StubAdapter::failing(Platform::Twitter, &calls),
                StubAdapter::ok(Platform::LinkedIn, &calls),
            ],
            instant_generator(),
            &["Downtown"],
        );
        let tpl = template(vec![Platform::Facebook, Platform::Twitter, Platform::LinkedIn]);

        let post = p.execute(&tpl, Utc::now()).await;
        assert_eq!(post.status, PostStatus::Published);
        assert_eq!(post.platform_results.len(), 3);
        assert_eq!(post.receipts().len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(post.published_at.is_some());

        let saved = p.history.lock().await.recent(5);
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].id, post.id);
    }

    #[tokio::test]
    async fn generation_timeout_never_touches_channels() {
        let calls = Arc::new(AtomicUsize::new(0));
        let slow = StubGenerator {
            delay: Duration::from_millis(400),
            fail: Arc::new(AtomicBool::new(false)),
        };
        let p = pipeline(
            vec![StubAdapter::ok(Platform::Facebook, &calls)],
            slow,
            &["Downtown"],
        );

        let post = p.execute(&template(vec![Platform::Facebook]), Utc::now()).await;
        assert_eq!(post.status, PostStatus::Failed);
        assert!(post.failure_reason.as_deref().unwrap().contains("timed out"));
        assert!(post.platform_results.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // The failed firing still left a row behind.
        assert_eq!(p.history.lock().await.recent(5).len(), 1);
    }

    #[tokio::test]
    async fn generation_error_never_touches_channels() {
        let calls = Arc::new(AtomicUsize::new(0));
        let broken = StubGenerator {
            delay: Duration::ZERO,
            fail: Arc::new(AtomicBool::new(true)),
        };
        let p = pipeline(
            vec![StubAdapter::ok(Platform::Facebook, &calls)],
            broken,
            &["Downtown"],
        );

        let post = p.execute(&template(vec![Platform::Facebook]), Utc::now()).await;
        assert_eq!(post.status, PostStatus::Failed);
        assert!(post.failure_reason.as_deref().unwrap().contains("model unavailable"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn all_rejections_mark_the_firing_failed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let p = pipeline(
            vec![
                StubAdapter::failing(Platform::Facebook, &calls),
                StubAdapter::failing(Platform::Twitter, &calls),
            ],
            instant_generator(),
            &["Downtown"],
        );
        let tpl = template(vec![Platform::Facebook, Platform::Twitter]);

        let post = p.execute(&tpl, Utc::now()).await;
        assert_eq!(post.status, PostStatus::Failed);
        assert!(post.receipts().is_empty());
        assert_eq!(post.platform_results.len(), 2);
        assert_eq!(
            post.failure_reason.as_deref(),
            Some("every platform rejected the post")
        );
    }

    #[tokio::test]
    async fn next_firing_links_back_to_a_failed_one() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fail = Arc::new(AtomicBool::new(true));
        let generator = StubGenerator {
            delay: Duration::ZERO,
            fail: fail.clone(),
        };
        let p = pipeline(
            vec![StubAdapter::ok(Platform::Facebook, &calls)],
            generator,
            &["Downtown"],
        );
        let tpl = template(vec![Platform::Facebook]);

        let first = p.execute(&tpl, Utc::now()).await;
        assert_eq!(first.status, PostStatus::Failed);
        assert!(first.retry_of.is_none());

        fail.store(false, Ordering::SeqCst);
        let second = p.execute(&tpl, Utc::now()).await;
        assert_eq!(second.status, PostStatus::Published);
        assert_eq!(second.retry_of, Some(first.id));

        // After a success the chain is broken.
        let third = p.execute(&tpl, Utc::now()).await;
        assert!(third.retry_of.is_none());
    }

    #[tokio::test]
    async fn serving_areas_rotate_per_template() {
        let calls = Arc::new(AtomicUsize::new(0));
        let p = pipeline(
            vec![StubAdapter::ok(Platform::Facebook, &calls)],
            instant_generator(),
            &["Downtown", "Riverside"],
        );
        let tpl = template(vec![Platform::Facebook]);

        let a = p.execute(&tpl, Utc::now()).await;
        let b = p.execute(&tpl, Utc::now()).await;
        let c = p.execute(&tpl, Utc::now()).await;
        assert_eq!(a.area.as_deref(), Some("Downtown"));
        assert_eq!(b.area.as_deref(), Some("Riverside"));
        assert_eq!(c.area.as_deref(), Some("Downtown"));

        // A different template starts its own walk from the first area.
        let other = template(vec![Platform::Facebook]);
        let d = p.execute(&other, Utc::now()).await;
        assert_eq!(d.area.as_deref(), Some("Downtown"));
    }

    #[tokio::test]
    async fn unconfigured_channel_is_recorded_without_blocking_the_rest() {
        let calls = Arc::new(AtomicUsize::new(0));
        let p = pipeline(
            vec![
                StubAdapter::ok(Platform::Facebook, &calls),
                StubAdapter::unconfigured(Platform::Instagram, &calls),
            ],
            instant_generator(),
            &["Downtown"],
        );
        let tpl = template(vec![Platform::Facebook, Platform::Instagram]);

        let post = p.execute(&tpl, Utc::now()).await;
        assert_eq!(post.status, PostStatus::Published);
        assert_eq!(post.receipts().len(), 1);

        let rejected = post
            .platform_results
            .iter()
            .find(|r| !r.succeeded())
            .unwrap();
        assert!(rejected.error.as_deref().unwrap().contains("not configured"));
    }
}
