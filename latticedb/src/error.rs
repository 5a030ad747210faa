use std::fmt;

/// The crate-wide error type. Every fallible operation in the engine,
/// from tokenizing a statement to closing a row version, returns a
/// `CResult<T>` built on this enum. None of these ever cross the
/// [`crate::engine::Database::execute`] boundary as a Rust panic — they are
/// always converted into a [`crate::engine::StatementResult`] with
/// `ok = false`.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Unrecognized statement, malformed literal, missing clause, unclosed
    /// parenthesis.
    Parse(String),
    /// Unknown table, unknown column, duplicate table, missing primary key.
    Schema(String),
    /// Vector dimension mismatch, bad primary key type, DP_COUNT combined
    /// with other select items. A scalar coercion that finds no
    /// applicable rule yields `NULL` per the coercion table rather than
    /// raising this.
    Type(String),
    /// BEGIN while active, COMMIT/ROLLBACK while idle.
    Transaction(String),
    /// Snapshot file absent, unreadable, or structurally invalid.
    Io(String),
    /// Invariant violation that should never happen in a correct engine.
    Internal(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parse(msg) => write!(f, "parse error: {msg}"),
            Error::Schema(msg) => write!(f, "schema error: {msg}"),
            Error::Type(msg) => write!(f, "type error: {msg}"),
            Error::Transaction(msg) => write!(f, "transaction error: {msg}"),
            Error::Io(msg) => write!(f, "i/o error: {msg}"),
            Error::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

/// The result alias used throughout the crate.
pub type CResult<T> = std::result::Result<T, Error>;
