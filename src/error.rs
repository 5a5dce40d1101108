use std::fmt;

use thiserror::Error;

/// Why a submitted field was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationReason {
    Missing,
    NotNumeric,
}

impl fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationReason::Missing => write!(f, "missing"),
            ValidationReason::NotNumeric => write!(f, "not_numeric"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("field `{field}` is {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: ValidationReason,
}

impl ValidationError {
    pub fn missing(field: &'static str) -> Self {
        Self {
            field,
            reason: ValidationReason::Missing,
        }
    }

    pub fn not_numeric(field: &'static str) -> Self {
        Self {
            field,
            reason: ValidationReason::NotNumeric,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassifierError {
    /// The model file could not be read or its layer shapes do not chain.
    #[error("failed to load risk model: {0}")]
    ModelLoad(String),

    /// A vector reached the model that does not fit its input contract.
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Everything that can abort a single assessment.
#[derive(Debug, Error)]
pub enum DiagnosisError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("feature encoding failed: {0}")]
    Encoding(String),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}

impl DiagnosisError {
    /// Message safe to show to whoever submitted the form.
    pub fn user_message(&self) -> String {
        match self {
            DiagnosisError::Validation(err) => err.to_string(),
            _ => "the diagnosis could not be computed; please try again later".to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, DiagnosisError::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_names_field_and_reason() {
        let err = DiagnosisError::from(ValidationError::missing("ps"));
        assert!(err.is_validation());
        assert_eq!(err.user_message(), "field `ps` is missing");

        let err = ValidationError::not_numeric("peso");
        assert_eq!(err.to_string(), "field `peso` is not_numeric");
    }

    #[test]
    fn internal_failures_hide_details() {
        let err = DiagnosisError::from(ClassifierError::Inference("width 9".into()));
        assert!(!err.is_validation());
        assert!(!err.user_message().contains("width"));

        let err = DiagnosisError::Encoding("bmi is inf".into());
        assert!(!err.user_message().contains("bmi"));
    }
}
