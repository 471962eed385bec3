//! Error Taxonomy
//! Pilot in Command: Fault Containment
//! Mission: every failure mode gets a name and a recovery policy

use thiserror::Error;

/// The seven-class error taxonomy of the engine. Configuration and
/// Integrity are the only variants that may terminate the process;
/// everything else is caught and converted into an audit entry or a
/// logged, non-fatal outcome.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration rejected: {0}")]
    Configuration(String),

    #[error("connectivity lost: {0}")]
    Connectivity(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("risk-rejected: {0}")]
    RiskRejected(String),

    #[error("fill-rejected: {0}")]
    FillRejected(String),

    #[error("reconciliation divergence: {0}")]
    Reconciliation(String),

    #[error("data staleness: {0}")]
    DataStaleness(String),

    #[error("integrity failure: {0}")]
    Integrity(String),
}

impl EngineError {
    /// Whether this error class is unrecoverable at the process level.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Configuration(_) | EngineError::Integrity(_))
    }

    /// Exit code per spec's CLI surface: 0 success, 1 unrecoverable
    /// error, 2 configuration rejected.
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::Configuration(_) => 2,
            EngineError::Integrity(_) => 1,
            _ => 0,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classes_are_configuration_and_integrity() {
        assert!(EngineError::Configuration("x".into()).is_fatal());
        assert!(EngineError::Integrity("x".into()).is_fatal());
        assert!(!EngineError::RiskRejected("x".into()).is_fatal());
        assert!(!EngineError::FillRejected("x".into()).is_fatal());
    }

    #[test]
    fn exit_codes_match_spec() {
        assert_eq!(EngineError::Configuration("x".into()).exit_code(), 2);
        assert_eq!(EngineError::Integrity("x".into()).exit_code(), 1);
        assert_eq!(EngineError::Connectivity("x".into()).exit_code(), 0);
    }
}
