//! Error types shared across the query front end and the table engine.

/// Errors raised while parsing or executing a statement.
///
/// Every variant carries a stable, human-readable message; callers (and the
/// test suite) match on the exact text. Nothing is retried or downgraded
/// internally: the layer that detects a violation surfaces it to its
/// immediate caller unchanged.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A user/query error: unknown column, wrong value type, missing or
    /// illegal key restriction, counter misuse, unbound parameters.
    #[error("{0}")]
    Invalid(String),
    /// Creating a keyspace or table that already exists without
    /// `IF NOT EXISTS`.
    #[error("{0}")]
    AlreadyExists(String),
    /// A table schema that cannot be constructed, such as mixing counter
    /// and non-counter fields.
    #[error("{0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::Invalid(msg.into())
    }
}
