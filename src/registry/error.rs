use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

use super::challenge::ChallengeError;

/// Broad classification of a resolution failure.
///
/// Every kind is fatal for the run; the caller uses it to word the
/// diagnostic and pick an exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Something the operator has to fix in the environment.
    Configuration,
    /// The registry does not speak the expected dialect.
    Protocol,
    /// The request never produced a usable HTTP response.
    Transport,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Transport => "transport",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("The environment variable \"{0}\" is not set.")]
    MissingCredentials(String),

    #[error("Unexpected error fetching manifest: [{status}] {reason}")]
    UnexpectedStatus { status: u16, reason: String },

    #[error("Registry requires authentication, but doesn't tell which mechanism.")]
    MissingChallenge,

    #[error("Invalid WWW-Authenticate header: {0}")]
    Challenge(#[from] ChallengeError),

    #[error("Registry redirected without a Location header.")]
    MissingLocation,

    #[error("The digest is not in the Red Hat registry redirect URL: {0}")]
    RedirectWithoutDigest(String),

    #[error("Token endpoint {url} returned no usable token: {message}")]
    InvalidToken { url: String, message: String },

    #[error("Failed to decode manifest: {0}")]
    ManifestDecode(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl ResolveError {
    pub(crate) fn unexpected_status(status: StatusCode) -> Self {
        Self::UnexpectedStatus {
            status: status.as_u16(),
            reason: reason(status).to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingCredentials(_) => ErrorKind::Configuration,
            Self::Http(_) => ErrorKind::Transport,
            _ => ErrorKind::Protocol,
        }
    }
}

pub(crate) fn reason(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("")
}
