//! REST handlers for the dashboard API.
//!
//! Every handler answers with a JSON body carrying an `"ok"` flag, the way
//! the dashboard expects. Engine errors are shaped in one place:
//! unknown ids become 404, rejected templates 422, everything else 500.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use uuid::Uuid;

use localboost_core::error::LocalBoostError;
use localboost_core::types::{Frequency, KeywordCluster, PostCategory, Platform, ScheduleTemplate};

use super::server::AppState;

type Reply = (StatusCode, Json<serde_json::Value>);

/// Map an engine error onto an HTTP status plus an `{"ok": false}` body.
fn error_reply(err: LocalBoostError) -> Reply {
    let status = match &err {
        LocalBoostError::NotFound(_) => StatusCode::NOT_FOUND,
        LocalBoostError::InvalidTemplate(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(serde_json::json!({"ok": false, "error": err.to_string()})),
    )
}

/// A malformed id can never name a schedule, so it reads as 404.
fn parse_id(raw: &str) -> Result<Uuid, Reply> {
    Uuid::parse_str(raw).map_err(|_| {
        (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "ok": false,
                "error": format!("'{raw}' is not a schedule id"),
            })),
        )
    })
}

/// Platform names in request bodies; an unknown name rejects the request
/// instead of being dropped silently.
fn parse_platforms(value: &serde_json::Value) -> Result<Vec<Platform>, LocalBoostError> {
    let Some(raw) = value.as_array() else {
        return Ok(Vec::new());
    };
    raw.iter()
        .filter_map(|v| v.as_str())
        .map(|s| s.parse())
        .collect()
}

/// Category in request bodies; absent/null means "not supplied", an unknown
/// name rejects the request just like an unknown platform.
fn parse_category(value: &serde_json::Value) -> Result<Option<PostCategory>, LocalBoostError> {
    if value.is_null() {
        return Ok(None);
    }
    serde_json::from_value(value.clone())
        .map(Some)
        .map_err(|_| LocalBoostError::InvalidTemplate(format!("Unknown category {value}")))
}

/// Recurrence fields arrive flattened: `"frequency": "weekly"` plus a
/// sibling `"day_of_week"` (0 = Sunday). Absent/null means "not supplied";
/// an unknown name or a weekly with no weekday rejects the request.
fn parse_frequency(body: &serde_json::Value) -> Result<Option<Frequency>, LocalBoostError> {
    match body["frequency"].as_str() {
        None if body["frequency"].is_null() => Ok(None),
        Some("daily") => Ok(Some(Frequency::Daily)),
        Some("weekly") => {
            let day = body["day_of_week"].as_u64().ok_or_else(|| {
                LocalBoostError::InvalidTemplate(
                    "weekly schedules need a day_of_week (0 = Sunday)".into(),
                )
            })?;
            Ok(Some(Frequency::Weekly {
                day_of_week: u8::try_from(day).unwrap_or(u8::MAX),
            }))
        }
        _ => Err(LocalBoostError::InvalidTemplate(format!(
            "Unknown frequency {} (use daily or weekly)",
            body["frequency"]
        ))),
    }
}

/// Flatten a template into the dashboard wire shape.
fn schedule_json(t: &ScheduleTemplate) -> serde_json::Value {
    let (frequency, day_of_week) = match t.frequency {
        Frequency::Daily => ("daily", None),
        Frequency::Weekly { day_of_week } => ("weekly", Some(day_of_week)),
    };
    serde_json::json!({
        "id": t.id,
        "name": t.name,
        "content_template": t.content_template,
        "frequency": frequency,
        "day_of_week": day_of_week,
        "time_of_day": t.time_of_day,
        "platforms": t.platforms,
        "category": t.category,
        "active": t.active,
        "created_at": t.created_at.to_rfc3339(),
    })
}

// ---- Health & Info ----

/// Health check endpoint.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "localboost-gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Service overview for the dashboard header.
pub async fn system_info(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let schedules = state.registry.count().await;
    let channels: Vec<String> = state
        .channels
        .configured()
        .iter()
        .map(|p| p.to_string())
        .collect();
    let posts_by_status = state.history.lock().await.counts_by_status();
    Json(serde_json::json!({
        "business": state.business_name,
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "generator": state.generator_name,
        "schedules": schedules,
        "channels_configured": channels,
        "posts_by_status": posts_by_status,
    }))
}

// ---- Schedule API ----

/// List all schedule templates with their live job state.
pub async fn list_schedules(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let templates = state.registry.list().await;
    let mut schedules = Vec::with_capacity(templates.len());
    for t in &templates {
        let mut entry = schedule_json(t);
        if let Ok(job) = state.scheduler.query(t.id).await {
            entry["job"] = serde_json::json!(job);
        }
        schedules.push(entry);
    }
    Json(serde_json::json!({"ok": true, "schedules": schedules, "count": schedules.len()}))
}

/// Create a schedule template. An active template is armed immediately.
pub async fn create_schedule(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Reply {
    let platforms = match parse_platforms(&body["platforms"]) {
        Ok(p) => p,
        Err(e) => return error_reply(e),
    };
    let category = match parse_category(&body["category"]) {
        Ok(c) => c.unwrap_or(PostCategory::Promotional),
        Err(e) => return error_reply(e),
    };
    let frequency = match parse_frequency(&body) {
        Ok(f) => f.unwrap_or(Frequency::Daily),
        Err(e) => return error_reply(e),
    };

    let mut template = ScheduleTemplate::new(
        body["name"].as_str().unwrap_or(""),
        body["content_template"].as_str().unwrap_or(""),
        frequency,
        body["time_of_day"].as_str().unwrap_or("09:00"),
        platforms,
        category,
    );
    template.active = body["active"].as_bool().unwrap_or(true);

    match state.registry.create(template).await {
        Ok(created) => (
            StatusCode::OK,
            Json(serde_json::json!({"ok": true, "schedule": schedule_json(&created)})),
        ),
        Err(e) => error_reply(e),
    }
}

/// Patch a schedule template. Absent fields are left unchanged.
pub async fn update_schedule(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Reply {
    let id = match parse_id(&raw) {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    let platforms = if body["platforms"].is_null() {
        None
    } else {
        match parse_platforms(&body["platforms"]) {
            Ok(p) => Some(p),
            Err(e) => return error_reply(e),
        }
    };
    let category = match parse_category(&body["category"]) {
        Ok(c) => c,
        Err(e) => return error_reply(e),
    };
    let frequency = match parse_frequency(&body) {
        Ok(f) => f,
        Err(e) => return error_reply(e),
    };
    let patch = localboost_core::types::ScheduleUpdate {
        name: body["name"].as_str().map(String::from),
        content_template: body["content_template"].as_str().map(String::from),
        frequency,
        time_of_day: body["time_of_day"].as_str().map(String::from),
        platforms,
        category,
    };
    match state.registry.update(id, patch).await {
        Ok(updated) => (
            StatusCode::OK,
            Json(serde_json::json!({"ok": true, "schedule": schedule_json(&updated)})),
        ),
        Err(e) => error_reply(e),
    }
}

/// Remove a schedule. Idempotent: the job is cancelled first, and an
/// already-removed id answers `"removed": false` rather than an error.
pub async fn delete_schedule(State(state): State<Arc<AppState>>, Path(raw): Path<String>) -> Reply {
    let id = match parse_id(&raw) {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    match state.registry.delete(id).await {
        Ok(removed) => (
            StatusCode::OK,
            Json(serde_json::json!({"ok": true, "removed": removed})),
        ),
        Err(e) => error_reply(e),
    }
}

/// Pause or resume a schedule: `{"active": false}`.
pub async fn set_schedule_active(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Reply {
    let id = match parse_id(&raw) {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    let active = body["active"].as_bool().unwrap_or(true);
    match state.registry.set_active(id, active).await {
        Ok(updated) => (
            StatusCode::OK,
            Json(serde_json::json!({"ok": true, "schedule": schedule_json(&updated)})),
        ),
        Err(e) => error_reply(e),
    }
}

/// Run one immediate firing of a schedule, outside its recurrence.
pub async fn fire_schedule(State(state): State<Arc<AppState>>, Path(raw): Path<String>) -> Reply {
    let id = match parse_id(&raw) {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    match state.registry.fire(id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({"ok": true, "fired": id})),
        ),
        Err(e) => error_reply(e),
    }
}

// ---- Post history ----

/// Recent post history, newest first. `?limit=` caps the page (default 50),
/// `?schedule_id=` narrows to one template.
pub async fn list_posts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<serde_json::Value> {
    let limit = params
        .get("limit")
        .and_then(|s| s.parse().ok())
        .unwrap_or(50);
    let schedule_id = params
        .get("schedule_id")
        .and_then(|s| Uuid::parse_str(s).ok());
    let history = state.history.lock().await;
    let posts = match schedule_id {
        Some(id) => history.for_schedule(id, limit),
        None => history.recent(limit),
    };
    Json(serde_json::json!({"ok": true, "posts": posts, "count": posts.len()}))
}

// ---- Dashboard snapshot + sync ----

/// Latest dashboard snapshot. 404 until the first sync pass completes.
pub async fn get_snapshot(State(state): State<Arc<AppState>>) -> Reply {
    let snapshot = state.aggregator.latest();
    if snapshot.channels.is_empty() {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"ok": false, "error": "no sync pass has completed yet"})),
        );
    }
    (
        StatusCode::OK,
        Json(serde_json::json!({"ok": true, "snapshot": &*snapshot})),
    )
}

/// Run one sync pass now and return the fresh snapshot.
pub async fn run_sync(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let snapshot = state.aggregator.tick().await;
    Json(serde_json::json!({"ok": true, "snapshot": &*snapshot}))
}

// ---- Keyword clusters ----

/// Keyword clusters per serving area.
pub async fn list_keywords(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let areas: Vec<&str> = state
        .keywords
        .areas()
        .iter()
        .map(|a| a.name.as_str())
        .collect();
    let clusters = state.keywords.all_clusters();
    Json(serde_json::json!({"ok": true, "areas": areas, "clusters": clusters}))
}

/// Store a refreshed keyword cluster for one area, replacing the old one.
pub async fn refresh_keywords(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Reply {
    match serde_json::from_value::<KeywordCluster>(body) {
        Ok(cluster) => {
            let area = cluster.area.clone();
            state.keywords.refresh(cluster);
            (
                StatusCode::OK,
                Json(serde_json::json!({"ok": true, "area": area})),
            )
        }
        Err(e) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({
                "ok": false,
                "error": format!("invalid keyword cluster: {e}"),
            })),
        ),
    }
}
