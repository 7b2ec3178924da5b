//! Digest resolution against Docker/OCI Distribution v2 registries.
//!
//! A resolution is at most three round trips: an anonymous manifest request,
//! a token request when the registry answers with a bearer challenge, and
//! the manifest request again with that token. The digest is read from the
//! `Docker-Content-Digest` header, the manifest's `config.digest`, or for the
//! Red Hat registries from the path of the 302 redirect target.

pub mod challenge;
pub mod credentials;
pub mod error;
pub mod reference;

pub use challenge::{AuthChallenge, ChallengeError};
pub use credentials::{Credentials, CredentialsProvider, EnvCredentials};
pub use error::{ErrorKind, ResolveError};
pub use reference::{ImageRef, ResolvedReference};

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::{ACCEPT, AUTHORIZATION, LOCATION, WWW_AUTHENTICATE};
use reqwest::redirect::Policy;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

/// Media type requested for manifests
pub const MANIFEST_V2_MEDIA_TYPE: &str = "application/vnd.docker.distribution.manifest.v2+json";

/// Registries that put the digest into the redirect target instead of a header
pub const REDHAT_REGISTRIES: &[&str] = &["registry.redhat.io", "registry.access.redhat.com"];

const DIGEST_HEADER: &str = "Docker-Content-Digest";
const DIGEST_PREFIX: &str = "sha256:";

/// Scheme used to talk to registries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    #[default]
    Https,
    /// Plain HTTP, for local test registries
    Http,
}

impl Protocol {
    fn scheme(self) -> &'static str {
        match self {
            Protocol::Https => "https",
            Protocol::Http => "http",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub protocol: Protocol,
    /// Hosts whose redirects are inspected rather than followed
    pub redhat_registries: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            protocol: Protocol::default(),
            redhat_registries: REDHAT_REGISTRIES.iter().map(|r| r.to_string()).collect(),
        }
    }
}

/// Body of a token endpoint response. Registries use either field name.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

/// The only part of a manifest that is read
#[derive(Debug, Deserialize)]
struct ManifestConfig {
    config: Option<Descriptor>,
}

#[derive(Debug, Deserialize)]
struct Descriptor {
    digest: Option<String>,
}

pub struct Resolver {
    config: ResolverConfig,
    /// Follows redirects
    client: Client,
    /// Leaves redirects to the caller, used for the Red Hat registries
    redirect_client: Client,
    credentials: Arc<dyn CredentialsProvider>,
}

impl Resolver {
    pub fn new(
        config: ResolverConfig,
        credentials: Arc<dyn CredentialsProvider>,
    ) -> Result<Self, ResolveError> {
        Ok(Self {
            config,
            client: Client::builder().build()?,
            redirect_client: Client::builder().redirect(Policy::none()).build()?,
            credentials,
        })
    }

    /// Resolve `image` to a digest-pinned reference.
    ///
    /// Falls back to the tag-qualified reference only when the registry
    /// answered with a manifest but exposed no digest; every other failure is
    /// returned as an error.
    pub async fn resolve(&self, image: &ImageRef) -> Result<ResolvedReference, ResolveError> {
        let digest = self.fetch_digest(image).await?;
        if digest.is_none() {
            debug!("No digest available for {}:{}", image.repository(), image.tag);
        }
        Ok(image.resolved(digest))
    }

    fn is_redhat(&self, registry: &str) -> bool {
        self.config.redhat_registries.iter().any(|r| r == registry)
    }

    fn manifest_url(&self, image: &ImageRef) -> String {
        format!(
            "{}://{}/v2/{}/{}/manifests/{}",
            self.config.protocol.scheme(),
            image.registry,
            image.namespace,
            image.name,
            image.tag
        )
    }

    async fn fetch_digest(&self, image: &ImageRef) -> Result<Option<String>, ResolveError> {
        let url = self.manifest_url(image);
        let redhat = self.is_redhat(&image.registry);

        let response = self.get_manifest(&url, redhat, None).await?;
        let status = response.status();
        if status == StatusCode::OK {
            return extract_digest(response).await;
        }
        if redhat && status == StatusCode::FOUND {
            return digest_from_redirect(&response).map(Some);
        }
        if status != StatusCode::UNAUTHORIZED {
            return Err(ResolveError::unexpected_status(status));
        }

        let token = self.fetch_token(image, &response).await?;

        let response = self.get_manifest(&url, redhat, Some(&token)).await?;
        let status = response.status();
        if status == StatusCode::OK {
            return extract_digest(response).await;
        }
        if redhat || status == StatusCode::FOUND {
            return digest_from_redirect(&response).map(Some);
        }
        Err(ResolveError::unexpected_status(status))
    }

    async fn get_manifest(
        &self,
        url: &str,
        redhat: bool,
        token: Option<&str>,
    ) -> Result<Response, ResolveError> {
        let client = if redhat {
            &self.redirect_client
        } else {
            &self.client
        };

        let mut request = client.get(url).header(ACCEPT, MANIFEST_V2_MEDIA_TYPE);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        debug!("GET {} (authenticated: {})", url, token.is_some());
        let response = request.send().await?;
        debug!("Manifest response: {}", response.status());
        Ok(response)
    }

    /// Answer the bearer challenge carried by `unauthorized`.
    async fn fetch_token(
        &self,
        image: &ImageRef,
        unauthorized: &Response,
    ) -> Result<String, ResolveError> {
        let header = unauthorized
            .headers()
            .get(WWW_AUTHENTICATE)
            .ok_or(ResolveError::MissingChallenge)?
            .to_str()
            .map_err(|e| ChallengeError::Malformed(format!("header is not visible ASCII: {}", e)))?;
        let challenge = AuthChallenge::parse(header)?;

        // Built verbatim: scope values keep their `:` and `/` unescaped.
        let token_url = format!(
            "{}?scope={}&service={}",
            challenge.realm, challenge.scope, image.registry
        );
        info!("Registry requires a token: {}", token_url);
        debug!(
            "Challenge advertises service {:?}, requesting for {}",
            challenge.service, image.registry
        );

        let credentials = self.credentials.get_credentials(&image.registry)?;

        let mut request = self.client.get(&token_url);
        if !credentials.is_anonymous() {
            request = request.header(AUTHORIZATION, basic_auth_header(&credentials));
        }

        let response = request.send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            warn!(
                "Unexpected HTTP error: [{}] {}",
                status.as_u16(),
                error::reason(status)
            );
        }

        let body = response.bytes().await?;
        let parsed: TokenResponse =
            serde_json::from_slice(&body).map_err(|e| ResolveError::InvalidToken {
                url: token_url.clone(),
                message: e.to_string(),
            })?;

        parsed
            .token
            .or(parsed.access_token)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ResolveError::InvalidToken {
                url: token_url,
                message: "response has no `token` field".to_string(),
            })
    }
}

fn basic_auth_header(credentials: &Credentials) -> String {
    let encoded = STANDARD.encode(format!("{}:{}", credentials.username, credentials.password));
    format!("Basic {}", encoded)
}

async fn extract_digest(response: Response) -> Result<Option<String>, ResolveError> {
    if let Some(value) = response.headers().get(DIGEST_HEADER) {
        let digest = value.to_str().map_err(|e| {
            ResolveError::ManifestDecode(format!("invalid {} header: {}", DIGEST_HEADER, e))
        })?;
        return Ok(Some(digest.to_string()));
    }

    let body = response.bytes().await?;
    digest_from_manifest(&body)
}

fn digest_from_manifest(body: &[u8]) -> Result<Option<String>, ResolveError> {
    let manifest: ManifestConfig =
        serde_json::from_slice(body).map_err(|e| ResolveError::ManifestDecode(e.to_string()))?;
    Ok(manifest.config.and_then(|config| config.digest))
}

fn digest_from_redirect(response: &Response) -> Result<String, ResolveError> {
    let location = response
        .headers()
        .get(LOCATION)
        .ok_or(ResolveError::MissingLocation)?
        .to_str()
        .map_err(|_| ResolveError::MissingLocation)?;
    digest_from_location(location)
}

/// The basename of the redirect target's path, which must be a digest.
fn digest_from_location(location: &str) -> Result<String, ResolveError> {
    let path = match Url::parse(location) {
        Ok(url) => url.path().to_string(),
        Err(url::ParseError::RelativeUrlWithoutBase) => location
            .split(|c: char| c == '?' || c == '#')
            .next()
            .unwrap_or_default()
            .to_string(),
        Err(_) => return Err(ResolveError::RedirectWithoutDigest(location.to_string())),
    };

    let basename = path.rsplit('/').next().unwrap_or_default();
    if basename.starts_with(DIGEST_PREFIX) {
        Ok(basename.to_string())
    } else {
        Err(ResolveError::RedirectWithoutDigest(location.to_string()))
    }
}
