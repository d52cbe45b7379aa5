use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReportError {
    #[error("Missing required parameters: {}", names.join(", "))]
    MissingParameters { names: Vec<String> },

    #[error("Report '{id}' not found")]
    UnknownReport { id: String },

    #[error("Error executing report: {message}")]
    Execution { message: String },
}

impl ReportError {
    pub fn execution(message: impl Into<String>) -> Self {
        ReportError::Execution {
            message: message.into(),
        }
    }

    /// Errors raised before any database call was attempted.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ReportError::MissingParameters { .. } | ReportError::UnknownReport { .. }
        )
    }
}
