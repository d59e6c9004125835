use thiserror::Error;

/// Errors reported by network construction, performance evaluation and training.
///
/// `context` fields name the `Type::method` that detected the problem.
#[derive(Debug, Error)]
pub enum Error {
    /// A collaborator required by the operation is absent.
    #[error("{context}: {component} is not present")]
    MissingComponent {
        context: &'static str,
        component: &'static str,
    },

    /// A vector or matrix does not have the length the operation expects.
    #[error("{context}: size mismatch (expected {expected}, got {actual})")]
    SizeMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The inputs make the computation ill-defined.
    #[error("{context}: {message}")]
    Degenerate {
        context: &'static str,
        message: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{context}: {operation} is not supported")]
    Unsupported {
        context: &'static str,
        operation: String,
    },

    #[error("malformed parameter file: {0}")]
    ParameterFile(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn size_mismatch(context: &'static str, expected: usize, actual: usize) -> Self {
        Error::SizeMismatch { context, expected, actual }
    }

    pub(crate) fn missing(context: &'static str, component: &'static str) -> Self {
        Error::MissingComponent { context, component }
    }

    pub(crate) fn degenerate(context: &'static str, message: impl Into<String>) -> Self {
        Error::Degenerate { context, message: message.into() }
    }

    pub(crate) fn unsupported(context: &'static str, operation: impl Into<String>) -> Self {
        Error::Unsupported { context, operation: operation.into() }
    }
}

/// Fails with [`Error::SizeMismatch`] unless `actual == expected`.
pub(crate) fn ensure_size(context: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::size_mismatch(context, expected, actual))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_context() {
        let e = Error::size_mismatch("NeuralNetwork::set_parameters", 3, 4);
        assert_eq!(
            e.to_string(),
            "NeuralNetwork::set_parameters: size mismatch (expected 3, got 4)"
        );

        let e = Error::missing("SumSquaredError::check", "multilayer perceptron");
        assert_eq!(e.to_string(), "SumSquaredError::check: multilayer perceptron is not present");
    }

    #[test]
    fn ensure_size_accepts_equal_lengths_only() {
        assert!(ensure_size("test", 2, 2).is_ok());
        assert!(matches!(
            ensure_size("test", 2, 5),
            Err(Error::SizeMismatch { expected: 2, actual: 5, .. })
        ));
    }
}
