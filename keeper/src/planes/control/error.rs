use thiserror::Error;

/// Conditions that make a whole cycle meaningless.
/// Per-key problems never end up here; they are collected in the cycle report.
#[derive(Debug, Error)]
pub enum ReclamationError {
    #[error("cycle aborted, tracked keys cannot be enumerated: {0}")]
    CycleFatal(#[source] shared::Error),

    #[error("a reclamation cycle is already running")]
    CycleInProgress,
}
