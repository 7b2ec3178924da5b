#![allow(dead_code)]

use std::sync::Arc;

use digest_pin::registry::credentials::env_prefix;
use digest_pin::registry::{EnvCredentials, Protocol, Resolver, ResolverConfig};
use wiremock::MockServer;

/// Host string of the mock registry, e.g. `127.0.0.1:41234`
pub fn registry_host(server: &MockServer) -> String {
    server.address().to_string()
}

/// Credential variables for the mock registry
pub fn credential_vars(server: &MockServer, username: &str, password: &str) -> Vec<(String, String)> {
    let prefix = env_prefix(&registry_host(server));
    vec![
        (format!("{}_USERNAME", prefix), username.to_string()),
        (format!("{}_PASSWORD", prefix), password.to_string()),
    ]
}

/// Resolver speaking plain HTTP to the mock registry. With `redhat` set the
/// mock host is treated like the Red Hat registries.
pub fn resolver(server: &MockServer, redhat: bool, vars: Vec<(String, String)>) -> Resolver {
    let redhat_registries = if redhat {
        vec![registry_host(server)]
    } else {
        vec![]
    };
    let config = ResolverConfig {
        protocol: Protocol::Http,
        redhat_registries,
    };
    Resolver::new(config, Arc::new(EnvCredentials::from_vars(vars))).unwrap()
}
