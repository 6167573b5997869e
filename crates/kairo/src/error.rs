//! Unified error type for Kairo.

use kairo_timer::TimerError;

/// Top-level error wrapping the sub-crate errors, so `?` works across
/// layers in host code.
#[derive(Debug, thiserror::Error)]
pub enum KairoError {
    /// Creating, loading, or saving a timer failed.
    #[error(transparent)]
    Timer(#[from] TimerError),

    /// Reading a config or save file failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A config or save file is not valid JSON for the expected shape.
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    /// The [`ServerLoop`](crate::ServerLoop) behind a handle was dropped.
    #[error("server loop is gone")]
    LoopClosed,
}
