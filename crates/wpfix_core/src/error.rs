//! Error types for wpfix_core operations.

use std::path::PathBuf;
use thiserror::Error;

/// Error reported by the system under test at an external-call boundary.
///
/// Each variant maps to a stable [`kind`](SiteError::kind) code so callers can
/// assert on the category of failure without matching message text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SiteError {
    /// The login exists but the secret does not match.
    #[error("the password you entered for {login} is incorrect")]
    IncorrectSecret {
        /// Login that was presented
        login: String,
    },

    /// No principal is registered under the login.
    #[error("unknown username: {0}")]
    UnknownPrincipal(String),

    /// Login field was empty.
    #[error("cannot create a user with an empty login name")]
    EmptyLogin,

    /// Another principal already uses this login.
    #[error("sorry, that username already exists: {0}")]
    ExistingLogin(String),

    /// Another principal already uses this email address.
    #[error("sorry, that email address is already used: {0}")]
    ExistingEmail(String),

    /// Email address is malformed.
    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    /// Title and body were both empty.
    #[error("content and title are empty")]
    EmptyContent,

    /// Referenced principal does not exist.
    #[error("invalid user id: {0}")]
    InvalidPrincipal(u64),

    /// Content was requested with no principal to author it.
    #[error("no acting or baseline principal to author content")]
    MissingAuthor,

    /// Referenced content item does not exist.
    #[error("invalid post id: {0}")]
    InvalidContent(u64),

    /// Any other failure inside the external system.
    #[error("backend error: {0}")]
    Backend(String),
}

impl SiteError {
    /// Stable machine-readable code for the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::IncorrectSecret { .. } => "incorrect_secret",
            Self::UnknownPrincipal(_) => "unknown_principal",
            Self::EmptyLogin => "empty_login",
            Self::ExistingLogin(_) => "existing_login",
            Self::ExistingEmail(_) => "existing_email",
            Self::InvalidEmail(_) => "invalid_email",
            Self::EmptyContent => "empty_content",
            Self::InvalidPrincipal(_) => "invalid_principal",
            Self::MissingAuthor => "missing_author",
            Self::InvalidContent(_) => "invalid_content",
            Self::Backend(_) => "backend",
        }
    }
}

/// Result of a call against the system under test.
pub type SiteResult<T> = std::result::Result<T, SiteError>;

/// Core error type for harness operations.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// Configuration error (loading, parsing, invalid values).
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Configuration file could not be read or written.
    #[error("config file {}: {}", path.display(), reason)]
    ConfigFile {
        /// Path to the config file
        path: PathBuf,
        /// Underlying failure
        reason: String,
    },

    /// Invalid fixture lifecycle transition.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Source state
        from: String,
        /// Target state
        to: String,
    },

    /// The system under test reported an error outside fixture setup.
    #[error(transparent)]
    Site(#[from] SiteError),

    /// No conformance case matched the requested filter.
    #[error("no cases match filter '{0}'")]
    NoMatchingCases(String),
}

impl HarnessError {
    /// Returns a user-friendly recovery suggestion for the error, if available.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::ConfigError(_) => {
                Some("Check wpfix.toml, or run 'wpfix init --force' to write a fresh default.")
            }
            Self::ConfigFile { .. } => {
                Some("Make sure the config path exists and is readable, or omit --config to use defaults.")
            }
            Self::NoMatchingCases(_) => Some("Run 'wpfix list' to see available case names."),
            Self::Site(SiteError::Backend(_)) => {
                Some("The site under test reported an internal failure. Re-run with RUST_LOG=debug for details.")
            }
            _ => None,
        }
    }
}

/// Convenience Result type for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;
