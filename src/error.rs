use thiserror::Error;

/// Unified error type for minidb and its task runner
#[derive(Error, Debug)]
pub enum Error {
    #[error("Data validation failed for collection `{collection}`:\n{}", .errors.join("\n"))]
    DataValidation {
        collection: String,
        errors: Vec<String>,
    },

    #[error("The driver `{0}` is not supported")]
    DriverNotSupported(String),

    #[error("Driver is already connected")]
    AlreadyConnected,

    #[error("Invalid connection state. Expected: {expected}; actual: {actual}")]
    InvalidConnectionState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("A transaction is already open on this connection")]
    AlreadyInTransaction,

    #[error("Not in transaction")]
    NotInTransaction,

    #[error("Statement affected 0 rows")]
    UnaffectedRows,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Version error: {0}")]
    Version(String),

    #[error("Tag error: {0}")]
    Tag(String),

    #[error("Command `{command}` exited with status {code}")]
    CommandFailed { command: String, code: i32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results in minidb
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid-argument error with context
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Create a schema error with context
    pub fn schema(msg: impl Into<String>) -> Self {
        Error::Schema(msg.into())
    }

    /// Create a configuration error with context
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a version error with context
    pub fn version(msg: impl Into<String>) -> Self {
        Error::Version(msg.into())
    }

    /// Create a tag error with context
    pub fn tag(msg: impl Into<String>) -> Self {
        Error::Tag(msg.into())
    }

    /// Exit status a process should report for this error.
    ///
    /// A failed child command propagates its own status; everything else is 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::CommandFailed { code, .. } => *code,
            _ => 1,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}
