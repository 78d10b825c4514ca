//! # LocalBoost Core
//!
//! Shared foundation for the LocalBoost engine: the error taxonomy, the
//! domain model (schedule templates, automated posts, channel snapshots),
//! the two collaborator traits (`ChannelAdapter`, `ContentGenerator`), and
//! the TOML configuration system.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{LocalBoostError, Result};
