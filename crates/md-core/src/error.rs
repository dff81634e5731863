//! Error types for the Markdown language service engine.
//!
//! All public operations in this crate return [`Result<T>`], an alias over
//! [`Error`]. Parsing and resolution failures are generally absorbed
//! (spec §7: "parsing is best-effort") and never reach this type; `Error`
//! is reserved for the cases a caller must actually react to: cancellation,
//! I/O failure, and malformed configuration.

use thiserror::Error;

/// The error type returned by fallible `md-core` operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A filesystem or other I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A document or token stream could not be parsed.
    ///
    /// Malformed Markdown itself never produces this variant (the block
    /// parser and extractors are best-effort); this is reserved for
    /// failures in the parsing machinery itself (e.g. the grammar failing
    /// to load).
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration was invalid (e.g. an empty extension list).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A requested document, directory, or URI does not exist.
    ///
    /// Most internal lookups prefer `Option` for this (spec §7: "Not
    /// found ... silently treated as absence"); this variant exists for
    /// entry points, like the CLI, that must surface it as a failure.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The operation's cancellation token was tripped before completion.
    #[error("Operation cancelled")]
    Cancelled,

    /// A URI string could not be parsed.
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    /// Uncategorized failure, or a wrapped third-party error with no
    /// dedicated variant.
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<globset::Error> for Error {
    fn from(err: globset::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl Error {
    /// Whether retrying the operation might succeed.
    ///
    /// Cancellation and not-found are recoverable (a later retry, or a
    /// retry after the resource appears, is meaningful); parse,
    /// configuration, and URI errors are not.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Cancelled | Self::NotFound(_) | Self::Io(_))
    }
}

/// Convenience alias used throughout `md-core`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_classification() {
        assert!(Error::Cancelled.is_recoverable());
        assert!(Error::NotFound("x".into()).is_recoverable());
        assert!(!Error::Parse("x".into()).is_recoverable());
        assert!(!Error::Config("x".into()).is_recoverable());
        assert!(!Error::InvalidUri("x".into()).is_recoverable());
    }
}
