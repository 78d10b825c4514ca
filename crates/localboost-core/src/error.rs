//! Error types for LocalBoost.

use thiserror::Error;

/// Convenience result alias used across all LocalBoost crates.
pub type Result<T> = std::result::Result<T, LocalBoostError>;

/// The LocalBoost error taxonomy.
///
/// `InvalidTemplate` and `NotFound` are synchronous failures returned to the
/// registry caller. `Generation`, `Publish`, and `Fetch` are recovered where
/// they occur — recorded on the `AutomatedPost` or inside the snapshot's
/// per-channel entry — and never propagate into the scheduler loop.
#[derive(Error, Debug)]
pub enum LocalBoostError {
    /// A schedule template failed validation at create/update.
    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    /// Unknown id on a targeted registry operation.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Content generation failed or returned empty output.
    /// Aborts the whole firing before any channel is called.
    #[error("Generation failed: {0}")]
    Generation(String),

    /// One channel's publish call failed. Isolated to that channel;
    /// sibling channels in the same firing are unaffected.
    #[error("Publish failed: {0}")]
    Publish(String),

    /// One channel's stats read failed during a sync tick.
    #[error("Stats fetch failed: {0}")]
    Fetch(String),

    /// The channel has no credentials. A configuration state, not a call
    /// failure — surfaced as its own entry in the dashboard snapshot.
    #[error("Channel not configured: {0}")]
    Unconfigured(String),

    /// Configuration load/parse/save failure.
    #[error("Config error: {0}")]
    Config(String),

    /// Template store or post history failure.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Programming invariant violation. Never part of steady-state
    /// operation; logged at error level when it surfaces.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_carry_reason() {
        let e = LocalBoostError::InvalidTemplate("platforms must not be empty".into());
        assert!(e.to_string().contains("platforms must not be empty"));

        let e = LocalBoostError::Unconfigured("facebook".into());
        assert_eq!(e.to_string(), "Channel not configured: facebook");
    }
}
