/// Errors that can occur during audit log operations.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx_core::Error),

    /// Invalid input data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl AuditError {
    /// Create an `InvalidInput` error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

/// Result type for audit log operations.
pub type AuditResult<T> = Result<T, AuditError>;

pub(crate) fn require_key(name: &str, value: &str) -> AuditResult<()> {
    if value.trim().is_empty() {
        return Err(AuditError::invalid_input(format!("{name} must not be empty")));
    }
    Ok(())
}
