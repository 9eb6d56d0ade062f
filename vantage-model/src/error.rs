use std::fmt;

/// Errors raised when decoding persisted model values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// A stored enum label did not match any known variant.
    UnknownLabel {
        kind: &'static str,
        value: String,
    },
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::UnknownLabel { kind, value } => {
                write!(f, "unknown {kind} label: {value}")
            }
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;
