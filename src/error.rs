use std::fmt::Display;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The first segment of a filter path is not declared on the model.
    UnknownField { path: String },
    /// A direct field was addressed with nested segments, or a segment is empty.
    InvalidPath { path: String },
    /// The operator symbol is not part of the vocabulary.
    UnknownOperator { path: String, operator: String },
    /// The operator was given a value of the wrong shape.
    OperandMismatch {
        path: String,
        operator: String,
        reason: String,
    },
    InvalidParameter(String),
    Deserialize(String),
    Storage(String),
}

impl Error {
    /// Whether this error was caused by caller input rather than the store.
    pub fn is_validation(&self) -> bool {
        !matches!(self, Error::Storage(_))
    }

    pub(crate) fn mismatch(path: &str, operator: &str, reason: impl Into<String>) -> Self {
        Error::OperandMismatch {
            path: path.to_string(),
            operator: operator.to_string(),
            reason: reason.into(),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnknownField { path } => write!(f, "Unknown field: {}", path),
            Error::InvalidPath { path } => write!(f, "Invalid path: {}", path),
            Error::UnknownOperator { path, operator } => {
                write!(f, "Unknown operator '{}' on path '{}'", operator, path)
            }
            Error::OperandMismatch {
                path,
                operator,
                reason,
            } => write!(
                f,
                "Operand mismatch for '{}' on path '{}': {}",
                operator, path, reason
            ),
            Error::InvalidParameter(err) => write!(f, "Invalid parameter: {}", err),
            Error::Deserialize(err) => write!(f, "Deserialization error: {}", err),
            Error::Storage(err) => write!(f, "Storage error: {}", err),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors() {
        assert!(
            Error::UnknownField {
                path: "nope".to_string()
            }
            .is_validation()
        );
        assert!(Error::mismatch("age", "$in", "expected an array").is_validation());
        assert!(!Error::Storage("connection reset".to_string()).is_validation());
    }

    #[test]
    fn test_display() {
        let err = Error::UnknownOperator {
            path: "age".to_string(),
            operator: "$gte".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown operator '$gte' on path 'age'");
    }
}
