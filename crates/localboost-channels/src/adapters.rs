//! Platform adapter implementations.
//!
//! Each adapter wraps one social platform's REST API behind the
//! [`ChannelAdapter`] trait: publish a post, read performance stats.
//! Credentials come from the per-platform config section; an adapter with
//! missing or disabled credentials refuses both operations with an
//! `Unconfigured` error and is reported as such on the dashboard.

use async_trait::async_trait;
use chrono::Utc;
use localboost_core::config::{
    FacebookConfig, GoogleBusinessConfig, InstagramConfig, LinkedInConfig, TwitterConfig,
};
use localboost_core::error::{LocalBoostError, Result};
use localboost_core::traits::ChannelAdapter;
use localboost_core::types::{ChannelSnapshot, Platform, PostReceipt};
use serde_json::{Value, json};

const GRAPH_BASE: &str = "https://graph.facebook.com/v19.0";
const GBP_BASE: &str = "https://mybusiness.googleapis.com/v4";
const LINKEDIN_BASE: &str = "https://api.linkedin.com/v2";
const TWITTER_BASE: &str = "https://api.twitter.com/2";

/// Truncate to a char boundary at or below `max_bytes`.
fn safe_truncate(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Read a JSON body, turning non-2xx statuses into an error message tagged
/// with the platform name. Callers pick the error kind (Publish vs Fetch).
async fn read_json(
    resp: reqwest::Response,
    platform: &str,
) -> std::result::Result<Value, String> {
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(format!("{platform} API error {status}: {text}"));
    }
    resp.json()
        .await
        .map_err(|e| format!("invalid {platform} response: {e}"))
}

// ═══════════════════════════════════════════════════════
// Google Business Profile
// ═══════════════════════════════════════════════════════

pub struct GoogleBusinessAdapter {
    config: Option<GoogleBusinessConfig>,
    client: reqwest::Client,
}

impl GoogleBusinessAdapter {
    pub fn new(config: Option<GoogleBusinessConfig>) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn creds(&self) -> Result<&GoogleBusinessConfig> {
        match &self.config {
            Some(c)
                if c.enabled
                    && !c.access_token.is_empty()
                    && !c.account_id.is_empty()
                    && !c.location_id.is_empty() =>
            {
                Ok(c)
            }
            _ => Err(LocalBoostError::Unconfigured(
                "google_business channel is not configured".into(),
            )),
        }
    }

    fn location_name(config: &GoogleBusinessConfig) -> String {
        format!(
            "accounts/{}/locations/{}",
            config.account_id, config.location_id
        )
    }

    /// Sum of `totalValue.value` for one metric in a reportInsights reply.
    /// GBP encodes the value as a string ("123"), so accept both forms.
    fn metric_total(metric_values: &Value, name: &str) -> u64 {
        metric_values
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter(|m| m["metric"].as_str() == Some(name))
                    .map(|m| {
                        let v = &m["totalValue"]["value"];
                        v.as_u64()
                            .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
                            .unwrap_or(0)
                    })
                    .sum()
            })
            .unwrap_or(0)
    }
}

#[async_trait]
impl ChannelAdapter for GoogleBusinessAdapter {
    fn platform(&self) -> Platform {
        Platform::GoogleBusiness
    }

    fn is_configured(&self) -> bool {
        self.creds().is_ok()
    }

    async fn publish(&self, content: &str, media_urls: &[String]) -> Result<PostReceipt> {
        let config = self.creds()?;
        let mut body = json!({
            "languageCode": "en-US",
            "topicType": "STANDARD",
            "summary": safe_truncate(content, Platform::GoogleBusiness.max_post_len()),
        });
        if let Some(url) = media_urls.first() {
            body["media"] = json!([{ "mediaFormat": "PHOTO", "sourceUrl": url }]);
        }

        let url = format!("{}/{}/localPosts", GBP_BASE, Self::location_name(config));
        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", config.access_token))
            .json(&body)
            .send()
            .await
            .map_err(|e| LocalBoostError::Publish(format!("google_business: {e}")))?;
        let reply = read_json(resp, "google_business")
            .await
            .map_err(LocalBoostError::Publish)?;

        // The resource name doubles as the post id in GBP.
        let remote_id = reply["name"]
            .as_str()
            .ok_or_else(|| {
                LocalBoostError::Publish("google_business reply missing post name".into())
            })?
            .to_string();

        Ok(PostReceipt {
            platform: Platform::GoogleBusiness,
            remote_id,
            url: reply["searchUrl"].as_str().map(String::from),
            posted_at: Utc::now(),
        })
    }

    async fn fetch_stats(&self) -> Result<ChannelSnapshot> {
        let config = self.creds()?;
        let location = Self::location_name(config);
        let now = Utc::now();
        let body = json!({
            "locationNames": [location],
            "basicRequest": {
                "metricRequests": [{ "metric": "ALL" }],
                "timeRange": {
                    "startTime": (now - chrono::Duration::days(30)).to_rfc3339(),
                    "endTime": now.to_rfc3339(),
                },
            },
        });

        let url = format!(
            "{}/accounts/{}/locations:reportInsights",
            GBP_BASE, config.account_id
        );
        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", config.access_token))
            .json(&body)
            .send()
            .await
            .map_err(|e| LocalBoostError::Fetch(format!("google_business: {e}")))?;
        let reply = read_json(resp, "google_business")
            .await
            .map_err(LocalBoostError::Fetch)?;

        let metrics = &reply["locationMetrics"][0]["metricValues"];
        let impressions = Self::metric_total(metrics, "VIEWS_SEARCH")
            + Self::metric_total(metrics, "VIEWS_MAPS");
        let engagements = Self::metric_total(metrics, "ACTIONS_WEBSITE")
            + Self::metric_total(metrics, "ACTIONS_PHONE")
            + Self::metric_total(metrics, "ACTIONS_DRIVING_DIRECTIONS");

        // Separate call for the number of live local posts.
        let posts_url = format!("{}/{}/localPosts?pageSize=100", GBP_BASE, location);
        let posts_published = match self
            .client
            .get(&posts_url)
            .header("Authorization", format!("Bearer {}", config.access_token))
            .send()
            .await
        {
            Ok(r) => read_json(r, "google_business")
                .await
                .ok()
                .and_then(|v| v["localPosts"].as_array().map(|a| a.len() as u32))
                .unwrap_or(0),
            Err(_) => 0,
        };

        Ok(ChannelSnapshot {
            platform: Platform::GoogleBusiness,
            // Business profiles have no follower concept.
            followers: 0,
            impressions,
            engagements,
            posts_published,
            collected_at: Utc::now(),
        })
    }
}

// ═══════════════════════════════════════════════════════
// Facebook Page (Graph API)
// ═══════════════════════════════════════════════════════

pub struct FacebookAdapter {
    config: Option<FacebookConfig>,
    client: reqwest::Client,
}

impl FacebookAdapter {
    pub fn new(config: Option<FacebookConfig>) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn creds(&self) -> Result<&FacebookConfig> {
        match &self.config {
            Some(c) if c.enabled && !c.access_token.is_empty() && !c.page_id.is_empty() => Ok(c),
            _ => Err(LocalBoostError::Unconfigured(
                "facebook channel is not configured".into(),
            )),
        }
    }

    /// Latest value of a named metric in a Graph insights reply.
    fn insight_value(data: &Value, name: &str) -> u64 {
        data.as_array()
            .and_then(|arr| arr.iter().find(|m| m["name"].as_str() == Some(name)))
            .and_then(|m| m["values"].as_array())
            .and_then(|vals| vals.last())
            .and_then(|v| v["value"].as_u64())
            .unwrap_or(0)
    }
}

#[async_trait]
impl ChannelAdapter for FacebookAdapter {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    fn is_configured(&self) -> bool {
        self.creds().is_ok()
    }

    async fn publish(&self, content: &str, media_urls: &[String]) -> Result<PostReceipt> {
        let config = self.creds()?;
        let text = safe_truncate(content, Platform::Facebook.max_post_len());

        // Photo post when media is attached, plain feed post otherwise.
        let (edge, body) = match media_urls.first() {
            Some(image_url) => (
                "photos",
                json!({
                    "caption": text,
                    "url": image_url,
                    "access_token": config.access_token,
                }),
            ),
            None => (
                "feed",
                json!({
                    "message": text,
                    "access_token": config.access_token,
                }),
            ),
        };

        let url = format!("{}/{}/{}", GRAPH_BASE, config.page_id, edge);
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LocalBoostError::Publish(format!("facebook: {e}")))?;
        let reply = read_json(resp, "facebook")
            .await
            .map_err(LocalBoostError::Publish)?;

        // Photo replies carry the feed story under post_id.
        let remote_id = reply["post_id"]
            .as_str()
            .or_else(|| reply["id"].as_str())
            .ok_or_else(|| LocalBoostError::Publish("facebook reply missing post id".into()))?
            .to_string();

        Ok(PostReceipt {
            platform: Platform::Facebook,
            url: Some(format!("https://www.facebook.com/{remote_id}")),
            remote_id,
            posted_at: Utc::now(),
        })
    }

    async fn fetch_stats(&self) -> Result<ChannelSnapshot> {
        let config = self.creds()?;

        let page_url = format!("{}/{}", GRAPH_BASE, config.page_id);
        let resp = self
            .client
            .get(&page_url)
            .query(&[
                (
                    "fields",
                    "followers_count,published_posts.limit(0).summary(true)",
                ),
                ("access_token", config.access_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| LocalBoostError::Fetch(format!("facebook: {e}")))?;
        let page = read_json(resp, "facebook")
            .await
            .map_err(LocalBoostError::Fetch)?;

        let insights_url = format!("{}/{}/insights", GRAPH_BASE, config.page_id);
        let resp = self
            .client
            .get(&insights_url)
            .query(&[
                ("metric", "page_impressions,page_post_engagements"),
                ("period", "days_28"),
                ("access_token", config.access_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| LocalBoostError::Fetch(format!("facebook: {e}")))?;
        let insights = read_json(resp, "facebook")
            .await
            .map_err(LocalBoostError::Fetch)?;

        Ok(ChannelSnapshot {
            platform: Platform::Facebook,
            followers: page["followers_count"].as_u64().unwrap_or(0),
            impressions: Self::insight_value(&insights["data"], "page_impressions"),
            engagements: Self::insight_value(&insights["data"], "page_post_engagements"),
            posts_published: page["published_posts"]["summary"]["total_count"]
                .as_u64()
                .unwrap_or(0) as u32,
            collected_at: Utc::now(),
        })
    }
}

// ═══════════════════════════════════════════════════════
// Instagram Business (Graph API, two-step publish)
// ═══════════════════════════════════════════════════════

pub struct InstagramAdapter {
    config: Option<InstagramConfig>,
    client: reqwest::Client,
}

impl InstagramAdapter {
    pub fn new(config: Option<InstagramConfig>) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn creds(&self) -> Result<&InstagramConfig> {
        match &self.config {
            Some(c) if c.enabled && !c.access_token.is_empty() && !c.user_id.is_empty() => Ok(c),
            _ => Err(LocalBoostError::Unconfigured(
                "instagram channel is not configured".into(),
            )),
        }
    }

    /// `total_value.value` of a named metric (metric_type=total_value form).
    fn total_value(data: &Value, name: &str) -> u64 {
        data.as_array()
            .and_then(|arr| arr.iter().find(|m| m["name"].as_str() == Some(name)))
            .and_then(|m| m["total_value"]["value"].as_u64())
            .unwrap_or(0)
    }

    async fn fetch_permalink(&self, config: &InstagramConfig, media_id: &str) -> Option<String> {
        let url = format!("{}/{}", GRAPH_BASE, media_id);
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("fields", "permalink"),
                ("access_token", config.access_token.as_str()),
            ])
            .send()
            .await
            .ok()?;
        let reply = read_json(resp, "instagram").await.ok()?;
        reply["permalink"].as_str().map(String::from)
    }
}

#[async_trait]
impl ChannelAdapter for InstagramAdapter {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    fn is_configured(&self) -> bool {
        self.creds().is_ok()
    }

    async fn publish(&self, content: &str, media_urls: &[String]) -> Result<PostReceipt> {
        let config = self.creds()?;
        let image_url = media_urls.first().ok_or_else(|| {
            LocalBoostError::Publish("instagram requires at least one image URL".into())
        })?;
        let caption = safe_truncate(content, Platform::Instagram.max_post_len());

        // Step 1: create a media container.
        let container_url = format!("{}/{}/media", GRAPH_BASE, config.user_id);
        let resp = self
            .client
            .post(&container_url)
            .json(&json!({
                "image_url": image_url,
                "caption": caption,
                "access_token": config.access_token,
            }))
            .send()
            .await
            .map_err(|e| LocalBoostError::Publish(format!("instagram: {e}")))?;
        let container = read_json(resp, "instagram")
            .await
            .map_err(LocalBoostError::Publish)?;
        let creation_id = container["id"].as_str().ok_or_else(|| {
            LocalBoostError::Publish("instagram reply missing container id".into())
        })?;

        // Step 2: publish the container.
        let publish_url = format!("{}/{}/media_publish", GRAPH_BASE, config.user_id);
        let resp = self
            .client
            .post(&publish_url)
            .json(&json!({
                "creation_id": creation_id,
                "access_token": config.access_token,
            }))
            .send()
            .await
            .map_err(|e| LocalBoostError::Publish(format!("instagram: {e}")))?;
        let published = read_json(resp, "instagram")
            .await
            .map_err(LocalBoostError::Publish)?;
        let remote_id = published["id"]
            .as_str()
            .ok_or_else(|| LocalBoostError::Publish("instagram reply missing media id".into()))?
            .to_string();

        // Permalink is nice to have; never fail the publish over it.
        let url = self.fetch_permalink(config, &remote_id).await;

        Ok(PostReceipt {
            platform: Platform::Instagram,
            remote_id,
            url,
            posted_at: Utc::now(),
        })
    }

    async fn fetch_stats(&self) -> Result<ChannelSnapshot> {
        let config = self.creds()?;

        let account_url = format!("{}/{}", GRAPH_BASE, config.user_id);
        let resp = self
            .client
            .get(&account_url)
            .query(&[
                ("fields", "followers_count,media_count"),
                ("access_token", config.access_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| LocalBoostError::Fetch(format!("instagram: {e}")))?;
        let account = read_json(resp, "instagram")
            .await
            .map_err(LocalBoostError::Fetch)?;

        let insights_url = format!("{}/{}/insights", GRAPH_BASE, config.user_id);
        let resp = self
            .client
            .get(&insights_url)
            .query(&[
                ("metric", "impressions,accounts_engaged"),
                ("period", "day"),
                ("metric_type", "total_value"),
                ("access_token", config.access_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| LocalBoostError::Fetch(format!("instagram: {e}")))?;
        let insights = read_json(resp, "instagram")
            .await
            .map_err(LocalBoostError::Fetch)?;

        Ok(ChannelSnapshot {
            platform: Platform::Instagram,
            followers: account["followers_count"].as_u64().unwrap_or(0),
            impressions: Self::total_value(&insights["data"], "impressions"),
            engagements: Self::total_value(&insights["data"], "accounts_engaged"),
            posts_published: account["media_count"].as_u64().unwrap_or(0) as u32,
            collected_at: Utc::now(),
        })
    }
}

// ═══════════════════════════════════════════════════════
// LinkedIn organization page
// ═══════════════════════════════════════════════════════

pub struct LinkedInAdapter {
    config: Option<LinkedInConfig>,
    client: reqwest::Client,
}

impl LinkedInAdapter {
    pub fn new(config: Option<LinkedInConfig>) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn creds(&self) -> Result<&LinkedInConfig> {
        match &self.config {
            Some(c) if c.enabled && !c.access_token.is_empty() && !c.organization_id.is_empty() => {
                Ok(c)
            }
            _ => Err(LocalBoostError::Unconfigured(
                "linkedin channel is not configured".into(),
            )),
        }
    }

    fn organization_urn(config: &LinkedInConfig) -> String {
        format!("urn:li:organization:{}", config.organization_id)
    }
}

#[async_trait]
impl ChannelAdapter for LinkedInAdapter {
    fn platform(&self) -> Platform {
        Platform::LinkedIn
    }

    fn is_configured(&self) -> bool {
        self.creds().is_ok()
    }

    async fn publish(&self, content: &str, media_urls: &[String]) -> Result<PostReceipt> {
        let config = self.creds()?;
        let text = safe_truncate(content, Platform::LinkedIn.max_post_len());

        let mut share_content = json!({
            "shareCommentary": { "text": text },
            "shareMediaCategory": "NONE",
        });
        // Native image upload needs the registerUpload flow; link out instead.
        if let Some(link) = media_urls.first() {
            share_content["shareMediaCategory"] = json!("ARTICLE");
            share_content["media"] = json!([{ "status": "READY", "originalUrl": link }]);
        }

        let body = json!({
            "author": Self::organization_urn(config),
            "lifecycleState": "PUBLISHED",
            "specificContent": { "com.linkedin.ugc.ShareContent": share_content },
            "visibility": { "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC" },
        });

        let url = format!("{}/ugcPosts", LINKEDIN_BASE);
        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", config.access_token))
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(&body)
            .send()
            .await
            .map_err(|e| LocalBoostError::Publish(format!("linkedin: {e}")))?;

        // The post urn arrives in the x-restli-id header as well as the body.
        let header_id = resp
            .headers()
            .get("x-restli-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let reply = read_json(resp, "linkedin")
            .await
            .map_err(LocalBoostError::Publish)?;
        let remote_id = reply["id"]
            .as_str()
            .map(String::from)
            .or(header_id)
            .ok_or_else(|| LocalBoostError::Publish("linkedin reply missing post urn".into()))?;

        Ok(PostReceipt {
            platform: Platform::LinkedIn,
            url: Some(format!("https://www.linkedin.com/feed/update/{remote_id}/")),
            remote_id,
            posted_at: Utc::now(),
        })
    }

    async fn fetch_stats(&self) -> Result<ChannelSnapshot> {
        let config = self.creds()?;
        let urn = Self::organization_urn(config);

        let followers_url = format!("{}/networkSizes/{}", LINKEDIN_BASE, urn);
        let resp = self
            .client
            .get(&followers_url)
            .query(&[("edgeType", "CompanyFollowedByMember")])
            .header("Authorization", format!("Bearer {}", config.access_token))
            .send()
            .await
            .map_err(|e| LocalBoostError::Fetch(format!("linkedin: {e}")))?;
        let followers = read_json(resp, "linkedin")
            .await
            .map_err(LocalBoostError::Fetch)?["firstDegreeSize"]
            .as_u64()
            .unwrap_or(0);

        let stats_url = format!("{}/organizationalEntityShareStatistics", LINKEDIN_BASE);
        let resp = self
            .client
            .get(&stats_url)
            .query(&[
                ("q", "organizationalEntity"),
                ("organizationalEntity", urn.as_str()),
            ])
            .header("Authorization", format!("Bearer {}", config.access_token))
            .send()
            .await
            .map_err(|e| LocalBoostError::Fetch(format!("linkedin: {e}")))?;
        let reply = read_json(resp, "linkedin")
            .await
            .map_err(LocalBoostError::Fetch)?;

        let totals = &reply["elements"][0]["totalShareStatistics"];
        let engagements = totals["clickCount"].as_u64().unwrap_or(0)
            + totals["likeCount"].as_u64().unwrap_or(0)
            + totals["commentCount"].as_u64().unwrap_or(0)
            + totals["shareCount"].as_u64().unwrap_or(0);

        Ok(ChannelSnapshot {
            platform: Platform::LinkedIn,
            followers,
            impressions: totals["impressionCount"].as_u64().unwrap_or(0),
            engagements,
            posts_published: 0,
            collected_at: Utc::now(),
        })
    }
}

// ═══════════════════════════════════════════════════════
// X / Twitter (API v2)
// ═══════════════════════════════════════════════════════

pub struct TwitterAdapter {
    config: Option<TwitterConfig>,
    client: reqwest::Client,
}

impl TwitterAdapter {
    pub fn new(config: Option<TwitterConfig>) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn creds(&self) -> Result<&TwitterConfig> {
        match &self.config {
            Some(c) if c.enabled && !c.bearer_token.is_empty() && !c.user_id.is_empty() => Ok(c),
            _ => Err(LocalBoostError::Unconfigured(
                "twitter channel is not configured".into(),
            )),
        }
    }
}

#[async_trait]
impl ChannelAdapter for TwitterAdapter {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    fn is_configured(&self) -> bool {
        self.creds().is_ok()
    }

    async fn publish(&self, content: &str, media_urls: &[String]) -> Result<PostReceipt> {
        let config = self.creds()?;
        if !media_urls.is_empty() {
            // v2 media needs the separate v1.1 upload endpoint; text-only for now.
            tracing::debug!("🐦 Twitter adapter ignoring {} media URL(s)", media_urls.len());
        }

        let url = format!("{}/tweets", TWITTER_BASE);
        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", config.bearer_token))
            .json(&json!({
                "text": safe_truncate(content, Platform::Twitter.max_post_len()),
            }))
            .send()
            .await
            .map_err(|e| LocalBoostError::Publish(format!("twitter: {e}")))?;
        let reply = read_json(resp, "twitter")
            .await
            .map_err(LocalBoostError::Publish)?;

        let remote_id = reply["data"]["id"]
            .as_str()
            .ok_or_else(|| LocalBoostError::Publish("twitter reply missing tweet id".into()))?
            .to_string();

        Ok(PostReceipt {
            platform: Platform::Twitter,
            url: Some(format!("https://twitter.com/i/web/status/{remote_id}")),
            remote_id,
            posted_at: Utc::now(),
        })
    }

    async fn fetch_stats(&self) -> Result<ChannelSnapshot> {
        let config = self.creds()?;

        let user_url = format!("{}/users/{}", TWITTER_BASE, config.user_id);
        let resp = self
            .client
            .get(&user_url)
            .query(&[("user.fields", "public_metrics")])
            .header("Authorization", format!("Bearer {}", config.bearer_token))
            .send()
            .await
            .map_err(|e| LocalBoostError::Fetch(format!("twitter: {e}")))?;
        let user = read_json(resp, "twitter")
            .await
            .map_err(LocalBoostError::Fetch)?;
        let user_metrics = &user["data"]["public_metrics"];

        // Impressions/engagements come from the most recent tweets.
        let tweets_url = format!("{}/users/{}/tweets", TWITTER_BASE, config.user_id);
        let resp = self
            .client
            .get(&tweets_url)
            .query(&[("max_results", "10"), ("tweet.fields", "public_metrics")])
            .header("Authorization", format!("Bearer {}", config.bearer_token))
            .send()
            .await
            .map_err(|e| LocalBoostError::Fetch(format!("twitter: {e}")))?;
        let tweets = read_json(resp, "twitter")
            .await
            .map_err(LocalBoostError::Fetch)?;

        let mut impressions = 0u64;
        let mut engagements = 0u64;
        if let Some(items) = tweets["data"].as_array() {
            for tweet in items {
                let m = &tweet["public_metrics"];
                impressions += m["impression_count"].as_u64().unwrap_or(0);
                engagements += m["like_count"].as_u64().unwrap_or(0)
                    + m["retweet_count"].as_u64().unwrap_or(0)
                    + m["reply_count"].as_u64().unwrap_or(0)
                    + m["quote_count"].as_u64().unwrap_or(0);
            }
        }

        Ok(ChannelSnapshot {
            platform: Platform::Twitter,
            followers: user_metrics["followers_count"].as_u64().unwrap_or(0),
            impressions,
            engagements,
            posts_published: user_metrics["tweet_count"].as_u64().unwrap_or(0) as u32,
            collected_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_truncate_respects_char_boundaries() {
        let s = "héllo wörld";
        let cut = safe_truncate(s, 2);
        assert_eq!(cut, "h");
        assert_eq!(safe_truncate("short", 280), "short");
    }

    #[test]
    fn missing_credentials_mean_unconfigured() {
        let adapter = TwitterAdapter::new(None);
        assert!(!adapter.is_configured());

        let empty_token = TwitterAdapter::new(Some(TwitterConfig {
            bearer_token: String::new(),
            user_id: "42".into(),
            enabled: true,
        }));
        assert!(!empty_token.is_configured());
    }

    #[tokio::test]
    async fn unconfigured_adapter_refuses_to_publish() {
        let adapter = FacebookAdapter::new(None);
        let err = adapter.publish("hello", &[]).await.unwrap_err();
        assert!(matches!(err, LocalBoostError::Unconfigured(_)));
    }

    #[tokio::test]
    async fn instagram_publish_without_media_is_a_publish_error() {
        let adapter = InstagramAdapter::new(Some(InstagramConfig {
            access_token: "tok".into(),
            user_id: "17841400000000000".into(),
            enabled: true,
        }));
        let err = adapter.publish("caption", &[]).await.unwrap_err();
        assert!(matches!(err, LocalBoostError::Publish(_)));
    }

    #[test]
    fn gbp_metric_totals_accept_string_values() {
        let metrics = json!([
            { "metric": "VIEWS_SEARCH", "totalValue": { "value": "120" } },
            { "metric": "VIEWS_MAPS", "totalValue": { "value": 30 } },
        ]);
        assert_eq!(GoogleBusinessAdapter::metric_total(&metrics, "VIEWS_SEARCH"), 120);
        assert_eq!(GoogleBusinessAdapter::metric_total(&metrics, "VIEWS_MAPS"), 30);
        assert_eq!(GoogleBusinessAdapter::metric_total(&metrics, "ACTIONS_PHONE"), 0);
    }
}
