use thiserror::Error;

/// Failures raised by the scheduling engine. All of them are caller logic
/// errors; none are transient.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("note is not reviewable")]
    NotReviewable,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("you are not the creator of this note")]
    Forbidden,

    #[error("note {0} was modified concurrently, reload and retry")]
    Conflict(i64),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("no user selected, pass --user or set NORITORI_USER")]
    NoUser,
}

impl Error {
    /// True when the failure is the caller's fault and should be reported as
    /// a rejection rather than a crash.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Error::Database(_) | Error::Json(_) | Error::Io(_) | Error::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
