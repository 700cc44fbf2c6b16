use thiserror::Error;

/// Unified error type for all database client operations
///
/// Messages carry the backend's raw text so the host can show it verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    /// Server unreachable, timeout, or connection lost mid-operation
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Credentials rejected by the server
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Malformed query or total query failure
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// The backend detected a concurrent modification
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Generic write failure
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// Destructive operation denied by the server
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Database or collection not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backend has no equivalent of the operation
    #[error("Operation not supported: {0}")]
    OperationNotSupported(String),

    /// Server configuration rejected before any I/O
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A backend payload could not be decoded or encoded
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl DataError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        DataError::NotFound(msg.into())
    }

    pub fn operation_not_supported(msg: impl Into<String>) -> Self {
        DataError::OperationNotSupported(msg.into())
    }

    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        DataError::InvalidConfiguration(msg.into())
    }

    pub fn permission_denied(msg: impl Into<String>) -> Self {
        DataError::PermissionDenied(msg.into())
    }

    /// Map a non-success HTTP status from a REST backend to an error.
    ///
    /// 401, 403 and 409 have fixed meanings; anything else goes through
    /// `fallback` so each operation picks its own error kind.
    pub fn from_http_status(
        status: u16,
        body: impl Into<String>,
        fallback: fn(String) -> DataError,
    ) -> Self {
        let body = body.into();
        match status {
            401 => DataError::AuthenticationFailed(body),
            403 => DataError::PermissionDenied(body),
            409 => DataError::Conflict(body),
            502..=504 => DataError::ConnectionFailed(format!("HTTP {}: {}", status, body)),
            _ => fallback(format!("HTTP {}: {}", status, body)),
        }
    }

    /// Whether the error means the server could not be reached at all
    pub fn is_connection_error(&self) -> bool {
        matches!(self, DataError::ConnectionFailed(_))
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::SerializationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
