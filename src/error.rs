use thiserror::Error;

/// Failure of a single request. Every variant maps to a stable wire code.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0} role required")]
    Forbidden(&'static str),

    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("{0}")]
    Conflict(String),

    #[error("cannot move recommendation from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("select a workspace first")]
    NoWorkspace,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("stored JSON is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound { .. } => "not_found",
            AppError::InvalidInput { .. } => "bad_params",
            AppError::Conflict(_) => "conflict",
            AppError::InvalidTransition { .. } => "invalid_transition",
            AppError::NoWorkspace => "no_workspace",
            AppError::Database(_) | AppError::Malformed(_) => "db_failed",
        }
    }

    /// Storage failures are logged with their cause but never shown to the caller.
    pub fn is_internal(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::Malformed(_))
    }

    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        AppError::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}

/// Check if a rusqlite error is a UNIQUE constraint violation
pub fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(err, _)
        if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
}

pub type AppResult<T> = Result<T, AppError>;
