//! # LocalBoost Keywords
//!
//! Per-area keyword clusters feeding content generation.
//!
//! ## Design
//! - One `KeywordCluster` per serving area, keyed by area name
//! - Wholesale overwrite on refresh — last discovery wins, no merging
//! - JSON file persistence — human-readable, git-friendly
//! - Discovery itself is an external collaborator; this crate only stores
//!   and serves what it produced

pub mod store;

pub use store::KeywordStore;
