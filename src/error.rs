//! Fatal trajectory format errors.
//!
//! Only the envelope-level failures live here; per-event and per-line
//! problems are represented as data instead.

/// Errors that can occur while normalizing a trajectory.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    #[error(
        "Invalid trajectory format. Expected an array of events, an object with an 'entries' \
         array, an object with a 'history' array, or an object with 'test_result.git_patch'."
    )]
    InvalidFormat,

    #[error("Events must be an array.")]
    EventsNotArray,
}

pub type Result<T> = core::result::Result<T, NormalizeError>;
