use thiserror::Error;

/// Main error type for the loss crate
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KgeError {
    /// Shape-related errors with detailed suggestions
    #[error("Shape error: {0}")]
    ShapeError(String),

    /// Operation errors with context
    #[error("Operation error: {operation} - {message}")]
    OperationError {
        operation: String,
        message: String,
    },

    /// Configuration errors, including unknown loss types
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Invalid input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid state errors
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// IO errors
    #[error("IO error: {0}")]
    IoError(String),
}

impl KgeError {
    /// Create a shape error with helpful suggestions
    pub fn shape_error(expected: &str, got: &str, suggestion: Option<&str>) -> Self {
        let message = if let Some(sugg) = suggestion {
            format!("Expected {}, got {}. Suggestion: {}", expected, got, sugg)
        } else {
            format!("Expected {}, got {}", expected, got)
        };
        KgeError::ShapeError(message)
    }

    /// Create an operation error with context
    pub fn operation_error(operation: &str, message: &str) -> Self {
        KgeError::OperationError {
            operation: operation.to_string(),
            message: message.to_string(),
        }
    }
}

impl From<std::io::Error> for KgeError {
    fn from(err: std::io::Error) -> Self {
        KgeError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for KgeError {
    fn from(err: serde_json::Error) -> Self {
        KgeError::SerializationError(err.to_string())
    }
}

/// Result type for loss operations
pub type KgeResult<T> = Result<T, KgeError>;

/// Error context for providing additional debugging information
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub operation: String,
    pub tensor_shapes: Vec<String>,
    pub suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            tensor_shapes: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_shape(mut self, shape: &str) -> Self {
        self.tensor_shapes.push(shape.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.suggestions.push(suggestion.to_string());
        self
    }

    pub fn to_error_message(&self) -> String {
        let mut message = format!("Operation: {}", self.operation);

        if !self.tensor_shapes.is_empty() {
            message.push_str(&format!("\nTensor shapes: {}", self.tensor_shapes.join(", ")));
        }

        if !self.suggestions.is_empty() {
            message.push_str("\nSuggestions:");
            for suggestion in &self.suggestions {
                message.push_str(&format!("\n  - {}", suggestion));
            }
        }

        message
    }
}

/// Helper trait for adding context to errors
pub trait WithContext<T> {
    fn with_context<F>(self, f: F) -> KgeResult<T>
    where
        F: FnOnce() -> ErrorContext;
}

impl<T> WithContext<T> for KgeResult<T> {
    fn with_context<F>(self, f: F) -> KgeResult<T>
    where
        F: FnOnce() -> ErrorContext,
    {
        self.map_err(|e| {
            let context = f();
            match e {
                KgeError::ShapeError(msg) => {
                    KgeError::ShapeError(format!("{}\nContext: {}", msg, context.to_error_message()))
                }
                KgeError::OperationError { operation, message } => KgeError::OperationError {
                    operation,
                    message: format!("{}\nContext: {}", message, context.to_error_message()),
                },
                KgeError::InvalidInput(msg) => {
                    KgeError::InvalidInput(format!("{}\nContext: {}", msg, context.to_error_message()))
                }
                _ => e,
            }
        })
    }
}

/// Error codes for programmatic error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ShapeMismatch,
    InvalidOperation,
    SerializationFailed,
    ConfigInvalid,
    Io,
}

impl KgeError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            KgeError::ShapeError(_) => ErrorCode::ShapeMismatch,
            KgeError::OperationError { .. } => ErrorCode::InvalidOperation,
            KgeError::ConfigurationError(_) => ErrorCode::ConfigInvalid,
            KgeError::SerializationError(_) => ErrorCode::SerializationFailed,
            KgeError::InvalidInput(_) => ErrorCode::InvalidOperation,
            KgeError::InvalidState(_) => ErrorCode::InvalidOperation,
            KgeError::IoError(_) => ErrorCode::Io,
        }
    }
}
