use std::fmt;

use serde::Deserialize;

/// An image to resolve, identified by tag.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageRef {
    pub registry: String,
    pub namespace: String,
    pub name: String,
    pub tag: String,
}

impl ImageRef {
    pub fn new(
        registry: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            registry: registry.into(),
            namespace: namespace.into(),
            name: name.into(),
            tag: tag.into(),
        }
    }

    /// `registry/namespace/name`, without tag or digest
    pub fn repository(&self) -> String {
        format!("{}/{}/{}", self.registry, self.namespace, self.name)
    }

    /// Pin this image to `digest`, or fall back to its tag when no digest
    /// could be determined.
    pub fn resolved(&self, digest: Option<String>) -> ResolvedReference {
        match digest {
            Some(digest) => ResolvedReference::Digest {
                repository: self.repository(),
                digest,
            },
            None => ResolvedReference::Tag {
                repository: self.repository(),
                tag: self.tag.clone(),
            },
        }
    }
}

/// Outcome of resolving one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedReference {
    /// `registry/namespace/name@digest`
    Digest { repository: String, digest: String },
    /// `registry/namespace/name:tag`, used when the registry exposes no digest
    Tag { repository: String, tag: String },
}

impl ResolvedReference {
    pub fn digest(&self) -> Option<&str> {
        match self {
            Self::Digest { digest, .. } => Some(digest),
            Self::Tag { .. } => None,
        }
    }
}

impl fmt::Display for ResolvedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Digest { repository, digest } => write!(f, "{}@{}", repository, digest),
            Self::Tag { repository, tag } => write!(f, "{}:{}", repository, tag),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_reference_format() {
        let image = ImageRef::new("quay.io", "org", "app", "v1.0");
        let resolved = image.resolved(Some("sha256:abcdef".to_string()));
        assert_eq!(resolved.to_string(), "quay.io/org/app@sha256:abcdef");
        assert_eq!(resolved.digest(), Some("sha256:abcdef"));
    }

    #[test]
    fn test_tag_reference_format() {
        let image = ImageRef::new("registry.redhat.io", "ubi9", "ubi-minimal", "latest");
        let resolved = image.resolved(None);
        assert_eq!(resolved.to_string(), "registry.redhat.io/ubi9/ubi-minimal:latest");
        assert_eq!(resolved.digest(), None);
    }
}
