/*!
 * Error types for the LedgerFlow engine crate.
 */
use thiserror::Error;

/// Error type for LedgerFlow engine operations
#[derive(Error, Debug)]
pub enum Error {
    /// Rule error
    #[error("Rule error: {0}")]
    Rule(String),

    /// Condition error
    #[error("Condition error: {0}")]
    Condition(String),

    /// Action error
    #[error("Action error: {0}")]
    Action(String),

    /// Repository error
    #[error("Repository error: {0}")]
    Repository(String),

    /// Engine error
    #[error("Engine error: {0}")]
    Engine(String),

    /// Service capability error
    #[error("Service error: {0}")]
    Service(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found error
    #[error("Not found: {0}")]
    NotFound(String),

    /// Already exists error
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Core error
    #[error("Core error: {0}")]
    Core(#[from] ledgerflow_core::error::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Other error
    #[error("Other error: {0}")]
    Other(String),
}

/// Result type for LedgerFlow engine operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new rule error
    pub fn rule<S: AsRef<str>>(msg: S) -> Self {
        Error::Rule(msg.as_ref().to_string())
    }

    /// Create a new condition error
    pub fn condition<S: AsRef<str>>(msg: S) -> Self {
        Error::Condition(msg.as_ref().to_string())
    }

    /// Create a new action error
    pub fn action<S: AsRef<str>>(msg: S) -> Self {
        Error::Action(msg.as_ref().to_string())
    }

    /// Create a new repository error
    pub fn repository<S: AsRef<str>>(msg: S) -> Self {
        Error::Repository(msg.as_ref().to_string())
    }

    /// Create a new engine error
    pub fn engine<S: AsRef<str>>(msg: S) -> Self {
        Error::Engine(msg.as_ref().to_string())
    }

    /// Create a new service error
    pub fn service<S: AsRef<str>>(msg: S) -> Self {
        Error::Service(msg.as_ref().to_string())
    }

    /// Create a new validation error
    pub fn validation<S: AsRef<str>>(msg: S) -> Self {
        Error::Validation(msg.as_ref().to_string())
    }

    /// Create a new not found error
    pub fn not_found<S: AsRef<str>>(msg: S) -> Self {
        Error::NotFound(msg.as_ref().to_string())
    }

    /// Create a new already exists error
    pub fn already_exists<S: AsRef<str>>(msg: S) -> Self {
        Error::AlreadyExists(msg.as_ref().to_string())
    }

    /// Create a new other error
    pub fn other<S: AsRef<str>>(msg: S) -> Self {
        Error::Other(msg.as_ref().to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}
