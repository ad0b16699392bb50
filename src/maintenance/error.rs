use super::scheduler::MAX_SHIFT_COUNT;
use thiserror::Error;

/// Errors raised while parsing or scheduling maintenance windows
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MaintenanceError {
    #[error("Malformed maintenance window '{input}': {reason}")]
    MalformedWindow { input: String, reason: String },

    #[error("Invalid shift count: {0} (must be between 0 and {max})", max = MAX_SHIFT_COUNT)]
    InvalidShiftCount(i64),

    #[error("Cannot assign {windows} maintenance windows to {instances} instances")]
    CountMismatch { instances: usize, windows: usize },
}

impl MaintenanceError {
    pub(crate) fn malformed(input: &str, reason: impl Into<String>) -> Self {
        MaintenanceError::MalformedWindow {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_message_carries_input() {
        let err = MaintenanceError::malformed("Funday:25:99", "unknown day code 'Funday'");
        let message = err.to_string();
        assert!(message.contains("Funday:25:99"));
        assert!(message.contains("unknown day code"));
    }

    #[test]
    fn test_invalid_count_message() {
        let err = MaintenanceError::InvalidShiftCount(-3);
        assert_eq!(
            err.to_string(),
            "Invalid shift count: -3 (must be between 0 and 10080)"
        );
    }
}
