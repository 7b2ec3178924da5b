use std::collections::HashMap;

use super::error::ResolveError;

/// Basic-auth credentials for a registry's token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Both fields empty means the token request is sent anonymously.
    pub fn is_anonymous(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }
}

/// Provider for registry authentication credentials
///
/// Only consulted when a registry answers a manifest request with a bearer
/// challenge, so registries that allow anonymous pulls need no entry.
pub trait CredentialsProvider: Send + Sync {
    /// Get credentials for a specific registry host
    ///
    /// Returns `ResolveError::MissingCredentials` naming the first variable
    /// that is not set.
    fn get_credentials(&self, registry_host: &str) -> Result<Credentials, ResolveError>;
}

/// Credentials read from `{HOST}_USERNAME` / `{HOST}_PASSWORD` variables.
///
/// The variables are captured once when the provider is built, so later
/// changes to the process environment are not observed.
#[derive(Debug, Clone, Default)]
pub struct EnvCredentials {
    vars: HashMap<String, String>,
}

impl EnvCredentials {
    /// Snapshot the current process environment.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, _)| k.ends_with("_USERNAME") || k.ends_with("_PASSWORD"))
            .collect();
        Self { vars }
    }

    fn lookup(&self, name: String) -> Result<String, ResolveError> {
        self.vars
            .get(&name)
            .cloned()
            .ok_or(ResolveError::MissingCredentials(name))
    }
}

impl CredentialsProvider for EnvCredentials {
    fn get_credentials(&self, registry_host: &str) -> Result<Credentials, ResolveError> {
        let prefix = env_prefix(registry_host);
        Ok(Credentials {
            username: self.lookup(format!("{}_USERNAME", prefix))?,
            password: self.lookup(format!("{}_PASSWORD", prefix))?,
        })
    }
}

/// `registry.example.com` -> `REGISTRY_EXAMPLE_COM`
pub fn env_prefix(registry_host: &str) -> String {
    registry_host.replace('.', "_").to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_prefix() {
        assert_eq!(env_prefix("registry.redhat.io"), "REGISTRY_REDHAT_IO");
        assert_eq!(env_prefix("quay.io"), "QUAY_IO");
    }

    #[test]
    fn test_credentials_lookup() {
        let provider = EnvCredentials::from_vars([
            ("QUAY_IO_USERNAME", "robot"),
            ("QUAY_IO_PASSWORD", "secret"),
            ("PATH", "/usr/bin"),
        ]);

        let creds = provider.get_credentials("quay.io").unwrap();
        assert_eq!(creds.username, "robot");
        assert_eq!(creds.password, "secret");
        assert!(!creds.is_anonymous());
    }

    #[test]
    fn test_empty_credentials_are_anonymous() {
        let provider = EnvCredentials::from_vars([
            ("GHCR_IO_USERNAME", ""),
            ("GHCR_IO_PASSWORD", ""),
        ]);
        assert!(provider.get_credentials("ghcr.io").unwrap().is_anonymous());
    }

    #[test]
    fn test_missing_password_names_variable() {
        let provider = EnvCredentials::from_vars([("REGISTRY_EXAMPLE_USERNAME", "user")]);

        match provider.get_credentials("registry.example") {
            Err(ResolveError::MissingCredentials(var)) => {
                assert_eq!(var, "REGISTRY_EXAMPLE_PASSWORD")
            }
            other => panic!("expected missing credentials, got {:?}", other),
        }
    }
}
