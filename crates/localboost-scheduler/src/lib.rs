//! # LocalBoost Scheduler
//!
//! The automation heart of LocalBoost: recurring schedule templates drive a
//! single timer loop that fires the publish pipeline, and a sync loop keeps
//! the channel-stats dashboard snapshot fresh.
//!
//! ## Design
//! - One driver task owns a min-heap of upcoming deadlines for ALL templates
//!   (no per-schedule timer task); commands arrive over an mpsc mailbox.
//! - Recurrence math is pure and timezone-aware (`recurrence`), so a restart
//!   recomputes exactly the same instants.
//! - Firings run in their own spawned tasks and never block the driver;
//!   one template never has two concurrent firings.
//! - Generation and publish failures are recorded on the post row, never
//!   propagated — the next scheduled instant is the retry mechanism.

pub mod engine;
pub mod history;
pub mod pipeline;
pub mod recurrence;
pub mod registry;
pub mod store;
pub mod sync;

pub use engine::{JobState, JobView, SchedulerHandle, spawn_job_scheduler};
pub use history::PostHistory;
pub use pipeline::PublishPipeline;
pub use registry::ScheduleRegistry;
pub use store::TemplateStore;
pub use sync::SyncAggregator;
