//! # LocalBoost Gateway
//!
//! Axum HTTP + WebSocket API the dashboard talks to: schedule CRUD,
//! manual firing, post history, keyword clusters, and the live
//! channel-stats snapshot.
//!
//! ## Design
//! - Handlers speak `serde_json::Value` bodies with an `"ok"` flag;
//!   error kinds map onto HTTP status codes (404 unknown id, 422 bad
//!   template) in one place.
//! - All engine components live behind `AppState` and are shared with
//!   the scheduler loops; the gateway never owns a second copy.
//! - `/ws` pushes every completed sync pass to connected dashboards.

pub mod routes;
pub mod server;
pub mod ws;

pub use server::{AppState, build_router, start};
