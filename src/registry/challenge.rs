//! Bearer challenges from `WWW-Authenticate` headers.
//!
//! Tokenizing follows RFC 7235 via `http_auth`; this module only picks the
//! bearer challenge and checks that `realm` and `scope` are present.

use http_auth::{parser::ChallengeParser, ChallengeRef};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChallengeError {
    #[error("unsupported authentication scheme in `{0}`, expected Bearer")]
    UnsupportedScheme(String),

    #[error("{0}")]
    Malformed(String),

    #[error("missing required parameter `{0}`")]
    MissingParameter(&'static str),
}

/// A parsed bearer challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub realm: String,
    pub scope: String,
    /// Service as advertised by the registry. The token request always uses
    /// the registry host instead.
    pub service: Option<String>,
}

impl AuthChallenge {
    /// Parse the first bearer challenge in `header`.
    pub fn parse(header: &str) -> Result<Self, ChallengeError> {
        for challenge in ChallengeParser::new(header) {
            let challenge = challenge.map_err(|e| ChallengeError::Malformed(e.to_string()))?;
            if challenge.scheme.eq_ignore_ascii_case("Bearer") {
                return Self::try_from(&challenge);
            }
        }
        Err(ChallengeError::UnsupportedScheme(header.trim().to_string()))
    }
}

impl TryFrom<&ChallengeRef<'_>> for AuthChallenge {
    type Error = ChallengeError;

    fn try_from(value: &ChallengeRef<'_>) -> Result<Self, Self::Error> {
        let param = |name: &str| {
            value
                .params
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.to_unescaped())
        };
        let required = |name: &'static str| {
            param(name)
                .filter(|v| !v.is_empty())
                .ok_or(ChallengeError::MissingParameter(name))
        };

        Ok(Self {
            realm: required("realm")?,
            scope: required("scope")?,
            service: param("service"),
        })
    }
}
