//! Structured error types for the profiler.

use thiserror::Error;

/// Errors raised synchronously by the public profiler API.
///
/// Internal event handling never raises one of these: a malformed or
/// out-of-order event is recorded or dropped, never surfaced as an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfilerError {
    #[error("profiler is already running")]
    AlreadyRunning,

    #[error("profiler is not running")]
    NotRunning,

    #[error("cannot change measurement mode while the profiler is running")]
    BusyError,

    #[error("invalid measurement mode: {0}")]
    InvalidMode(String),

    #[error("measurement mode {0:?} is not supported on this build/target")]
    UnsupportedMode(crate::measurement::MeasurementMode),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_stable() {
        assert_eq!(ProfilerError::AlreadyRunning.to_string(), "profiler is already running");
        assert_eq!(ProfilerError::NotRunning.to_string(), "profiler is not running");
        assert_eq!(
            ProfilerError::BusyError.to_string(),
            "cannot change measurement mode while the profiler is running"
        );
    }
}
