//! Error types for the clan console core.

/// Failures of the console core.
///
/// Nothing here is fatal: every variant resolves to an absent session, an
/// absent profile, or a visible inline error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// The identity provider rejected a sign-in, sign-out or session query.
    #[error("Identity provider error: {0}")]
    Provider(String),

    /// A data store read or write failed.
    #[error("Query failed: {0}")]
    Query(String),

    /// The single-row profile select matched nothing.
    #[error("Profile not found")]
    NotFound,

    /// A privileged procedure refused the caller. Shown as a query failure.
    #[error("Query failed: {0}")]
    Privilege(String),

    /// Rejected locally before any request was issued.
    #[error("{0}")]
    Forbidden(String),

    /// Manual refresh attempted while the advisory cooldown is active.
    #[error("Try again in {0}")]
    CoolingDown(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Client-local preference storage failed.
    #[error("Preference storage error: {0}")]
    Storage(String),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
