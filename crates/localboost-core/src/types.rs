//! Domain types — schedule templates, posts, channel snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{LocalBoostError, Result};

/// A publishing platform. One `ChannelAdapter` implementation exists per
/// variant; everything else looks adapters up by this key and never
/// branches on platform identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    GoogleBusiness,
    Facebook,
    Instagram,
    LinkedIn,
    Twitter,
}

impl Platform {
    /// Every supported platform, in dashboard display order.
    pub const ALL: [Platform; 5] = [
        Platform::GoogleBusiness,
        Platform::Facebook,
        Platform::Instagram,
        Platform::LinkedIn,
        Platform::Twitter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::GoogleBusiness => "google_business",
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::LinkedIn => "linkedin",
            Platform::Twitter => "twitter",
        }
    }

    /// Hard length cap the adapter truncates to before sending.
    pub fn max_post_len(&self) -> usize {
        match self {
            Platform::GoogleBusiness => 1500,
            Platform::Facebook => 5000,
            Platform::Instagram => 2200,
            Platform::LinkedIn => 3000,
            Platform::Twitter => 280,
        }
    }

    /// One-line tone/format constraint fed into the content generator.
    pub fn style_hint(&self) -> &'static str {
        match self {
            Platform::GoogleBusiness => "local search focus, plain factual tone, mention the area",
            Platform::Facebook => "conversational, community-oriented, 1-2 short paragraphs",
            Platform::Instagram => "visual-first caption, friendly, 3-5 relevant hashtags",
            Platform::LinkedIn => "professional tone, lead with the business value",
            Platform::Twitter => "under 280 characters, punchy, at most 2 hashtags",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = LocalBoostError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "google_business" | "gbp" => Ok(Platform::GoogleBusiness),
            "facebook" => Ok(Platform::Facebook),
            "instagram" => Ok(Platform::Instagram),
            "linkedin" => Ok(Platform::LinkedIn),
            "twitter" | "x" => Ok(Platform::Twitter),
            other => Err(LocalBoostError::InvalidTemplate(format!(
                "Unknown platform '{other}'"
            ))),
        }
    }
}

/// Editorial category of a scheduled post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostCategory {
    Promotional,
    Educational,
    Engagement,
    Seasonal,
}

/// Recurrence rule. Weekly carries its weekday (0 = Sunday .. 6 = Saturday)
/// so a daily template can never hold a stray weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    Daily,
    Weekly { day_of_week: u8 },
}

/// A declarative recurrence rule plus content/platform targeting,
/// independent of any specific future execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleTemplate {
    /// Unique id, assigned at creation, immutable afterwards.
    pub id: Uuid,
    /// Human-readable name.
    pub name: String,
    /// Topic/seed text handed to the content generator.
    pub content_template: String,
    /// Daily or weekly recurrence.
    pub frequency: Frequency,
    /// Local wall-clock firing time, "HH:MM" 24h, in the business timezone.
    pub time_of_day: String,
    /// Target platforms. Never empty; deduplicated, order preserved.
    pub platforms: Vec<Platform>,
    /// Editorial category.
    pub category: PostCategory,
    /// Whether the template currently drives a timer.
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl ScheduleTemplate {
    /// Create a new template (active by default). Call
    /// [`ScheduleTemplate::validate`] — or let the registry do it — before
    /// handing it to the scheduler.
    pub fn new(
        name: &str,
        content_template: &str,
        frequency: Frequency,
        time_of_day: &str,
        platforms: Vec<Platform>,
        category: PostCategory,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            content_template: content_template.to_string(),
            frequency,
            time_of_day: time_of_day.to_string(),
            platforms: dedup_platforms(platforms),
            category,
            active: true,
            created_at: Utc::now(),
        }
    }

    /// Check the template invariants: non-empty platform set, parseable
    /// time of day, weekly weekday in 0..=6.
    pub fn validate(&self) -> Result<()> {
        if self.platforms.is_empty() {
            return Err(LocalBoostError::InvalidTemplate(
                "platforms must not be empty".into(),
            ));
        }
        if parse_time_of_day(&self.time_of_day).is_none() {
            return Err(LocalBoostError::InvalidTemplate(format!(
                "time_of_day '{}' is not a valid HH:MM",
                self.time_of_day
            )));
        }
        if let Frequency::Weekly { day_of_week } = self.frequency {
            if day_of_week > 6 {
                return Err(LocalBoostError::InvalidTemplate(format!(
                    "day_of_week {day_of_week} out of range 0..=6"
                )));
            }
        }
        Ok(())
    }
}

/// Partial update applied by the registry's `update` operation.
/// `None` fields are left unchanged; `active` is toggled via `set_active`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleUpdate {
    pub name: Option<String>,
    pub content_template: Option<String>,
    pub frequency: Option<Frequency>,
    pub time_of_day: Option<String>,
    pub platforms: Option<Vec<Platform>>,
    pub category: Option<PostCategory>,
}

impl ScheduleUpdate {
    /// Apply this patch to a copy of `template` (dedups platforms).
    /// The caller re-validates the result before storing it.
    pub fn apply(&self, template: &ScheduleTemplate) -> ScheduleTemplate {
        let mut next = template.clone();
        if let Some(name) = &self.name {
            next.name = name.clone();
        }
        if let Some(content) = &self.content_template {
            next.content_template = content.clone();
        }
        if let Some(frequency) = self.frequency {
            next.frequency = frequency;
        }
        if let Some(time_of_day) = &self.time_of_day {
            next.time_of_day = time_of_day.clone();
        }
        if let Some(platforms) = &self.platforms {
            next.platforms = dedup_platforms(platforms.clone());
        }
        if let Some(category) = self.category {
            next.category = category;
        }
        next
    }
}

fn dedup_platforms(platforms: Vec<Platform>) -> Vec<Platform> {
    let mut seen = Vec::with_capacity(platforms.len());
    for p in platforms {
        if !seen.contains(&p) {
            seen.push(p);
        }
    }
    seen
}

/// Parse "HH:MM" into an (hour, minute) pair. Returns `None` for anything
/// outside 00:00..=23:59.
pub fn parse_time_of_day(s: &str) -> Option<(u32, u32)> {
    let (h, m) = s.split_once(':')?;
    let hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some((hour, minute))
}

/// Proof of a successful publish on one platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostReceipt {
    pub platform: Platform,
    /// Platform-side id of the created post.
    pub remote_id: String,
    /// Public URL when the platform returns one.
    pub url: Option<String>,
    pub posted_at: DateTime<Utc>,
}

/// Per-platform outcome of one firing. Exactly one of `receipt`/`error`
/// is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformResult {
    pub platform: Platform,
    pub receipt: Option<PostReceipt>,
    pub error: Option<String>,
}

impl PlatformResult {
    pub fn success(receipt: PostReceipt) -> Self {
        Self {
            platform: receipt.platform,
            receipt: Some(receipt),
            error: None,
        }
    }

    pub fn failure(platform: Platform, reason: impl Into<String>) -> Self {
        Self {
            platform,
            receipt: None,
            error: Some(reason.into()),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.receipt.is_some()
    }
}

/// Lifecycle status of an automated post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Scheduled,
    Published,
    Failed,
}

/// Record of one firing: what was generated, where it went, what happened.
/// Transitions Scheduled→Published or Scheduled→Failed exactly once and is
/// never mutated after that; retry linkage lives on the *next* firing's row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomatedPost {
    pub id: Uuid,
    /// Originating template; `None` for one-off manual firings.
    pub schedule_id: Option<Uuid>,
    pub business_profile_id: String,
    /// Seed text the generation started from.
    pub content_template: String,
    /// The instant this firing was scheduled for (not when it ran).
    pub scheduled_time: DateTime<Utc>,
    pub status: PostStatus,
    pub platforms: Vec<Platform>,
    pub generated_content: Option<String>,
    pub media_urls: Vec<String>,
    /// One entry per target platform once the fan-out has run.
    pub platform_results: Vec<PlatformResult>,
    /// Why the whole firing failed (generation failure or all channels down).
    pub failure_reason: Option<String>,
    /// Links back to a failed predecessor of the same template, if any.
    pub retry_of: Option<Uuid>,
    /// Serving area whose keyword cluster fed this post.
    pub area: Option<String>,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl AutomatedPost {
    /// Start a post record for one firing of `template`.
    pub fn begin(
        template: &ScheduleTemplate,
        scheduled_time: DateTime<Utc>,
        business_profile_id: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            schedule_id: Some(template.id),
            business_profile_id: business_profile_id.to_string(),
            content_template: template.content_template.clone(),
            scheduled_time,
            status: PostStatus::Scheduled,
            platforms: template.platforms.clone(),
            generated_content: None,
            media_urls: Vec::new(),
            platform_results: Vec::new(),
            failure_reason: None,
            retry_of: None,
            area: None,
            created_at: Utc::now(),
            published_at: None,
        }
    }

    /// Terminal transition: at least one platform accepted the post.
    pub fn mark_published(&mut self) {
        self.status = PostStatus::Published;
        self.published_at = Some(Utc::now());
    }

    /// Terminal transition: generation failed or every platform failed.
    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.status = PostStatus::Failed;
        self.failure_reason = Some(reason.into());
    }

    /// Receipts from the platforms that accepted the post.
    pub fn receipts(&self) -> Vec<&PostReceipt> {
        self.platform_results
            .iter()
            .filter_map(|r| r.receipt.as_ref())
            .collect()
    }
}

/// Point-in-time statistics for one channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    pub platform: Platform,
    pub followers: u64,
    pub impressions: u64,
    pub engagements: u64,
    pub posts_published: u32,
    pub collected_at: DateTime<Utc>,
}

/// A failed stats read for one channel during a sync tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelError {
    pub platform: Platform,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// What the aggregator knows about one channel after a tick. `Unconfigured`
/// means the channel has no credentials and was never called — shown as-is
/// on the dashboard instead of placeholder numbers.
///
/// Serializes internally tagged (`"kind": "stats" | "error" | "unconfigured"`)
/// so every dashboard channel entry is a uniform JSON object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelReport {
    Stats(ChannelSnapshot),
    Error(ChannelError),
    Unconfigured,
}

impl ChannelReport {
    pub fn is_stats(&self) -> bool {
        matches!(self, ChannelReport::Stats(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ChannelReport::Error(_))
    }
}

/// Immutable aggregation of per-channel statistics, rebuilt wholesale on
/// each sync cycle and swapped in atomically for consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub channels: HashMap<Platform, ChannelReport>,
    pub generated_at: DateTime<Utc>,
}

impl DashboardSnapshot {
    pub fn stats_count(&self) -> usize {
        self.channels.values().filter(|r| r.is_stats()).count()
    }

    pub fn error_count(&self) -> usize {
        self.channels.values().filter(|r| r.is_error()).count()
    }

    pub fn unconfigured_count(&self) -> usize {
        self.channels
            .values()
            .filter(|r| matches!(r, ChannelReport::Unconfigured))
            .count()
    }
}

/// A named geographic region the business serves. Immutable reference data
/// supplied by the owner; the engine never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServingArea {
    pub name: String,
    #[serde(default)]
    pub zip_codes: Vec<String>,
    #[serde(default)]
    pub radius_km: Option<f64>,
}

/// Keywords and content themes discovered for one serving area.
/// Overwritten wholesale on refresh — last discovery wins, no merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordCluster {
    pub area: String,
    pub primary_keyword: String,
    #[serde(default)]
    pub related_keywords: Vec<String>,
    #[serde(default)]
    pub content_themes: Vec<String>,
    #[serde(default)]
    pub seasonality: Option<String>,
}

impl KeywordCluster {
    /// Primary keyword followed by the related ones, in order.
    pub fn all_keywords(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(1 + self.related_keywords.len());
        out.push(self.primary_keyword.clone());
        out.extend(self.related_keywords.iter().cloned());
        out
    }
}
