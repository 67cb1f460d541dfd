//! Repository identity.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::errors::ValidationError;

const DIGEST_BYTES: usize = 4;
const DNS_LABEL_MAX: usize = 63;

/// Unique repository key, `owner.name.branch` lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepositoryKey(String);

impl RepositoryKey {
    /// Builds the key for an `(owner, name, branch)` identity.
    #[must_use]
    pub fn new(owner: &str, name: &str, branch: &str) -> Self {
        Self(format!("{owner}.{name}.{branch}").to_lowercase())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Container engine name for this repository.
    ///
    /// Characters not valid in container names become `-`; the key digest
    /// suffix keeps branches such as `feature/login` and `feature-login` apart.
    #[must_use]
    pub fn container_name(&self) -> String {
        let slug: String = self
            .0
            .chars()
            .map(|c| if matches!(c, 'a'..='z' | '0'..='9' | '.' | '_' | '-') { c } else { '-' })
            .collect();
        format!("{slug}-{}", self.digest())
    }

    /// Single DNS label for this repository, at most 63 characters.
    #[must_use]
    pub fn dns_label(&self) -> String {
        let digest = self.digest();
        let slug: String = self
            .0
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .take(DNS_LABEL_MAX - digest.len() - 1)
            .collect();
        format!("{}-{digest}", slug.trim_end_matches('-'))
    }

    /// First bytes of the SHA-256 of the key, hex encoded.
    fn digest(&self) -> String {
        let hash = Sha256::digest(self.0.as_bytes());
        hex::encode(&hash[..DIGEST_BYTES])
    }

    /// Image tag used for builds of this repository.
    #[must_use]
    pub fn image_tag(&self) -> String {
        format!("{}:latest", self.container_name())
    }
}

impl fmt::Display for RepositoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RepositoryKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        if key.split('.').filter(|part| !part.is_empty()).count() < 3 {
            return Err(ValidationError::new(
                "repository_key",
                format!("'{s}' is not of the form owner.name.branch"),
            ));
        }
        Ok(Self(key))
    }
}

impl AsRef<str> for RepositoryKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_lowercased() {
        let key = RepositoryKey::new("Acme", "Widgets", "Main");
        assert_eq!(key.as_str(), "acme.widgets.main");
        assert_eq!(key.to_string(), "acme.widgets.main");
    }

    #[test]
    fn test_key_parse() {
        let key: RepositoryKey = "ACME.widgets.main".parse().unwrap();
        assert_eq!(key, RepositoryKey::new("acme", "widgets", "main"));
        assert!("acme.widgets".parse::<RepositoryKey>().is_err());
        assert!("".parse::<RepositoryKey>().is_err());
    }

    #[test]
    fn test_container_name_replaces_branch_separators() {
        let key = RepositoryKey::new("acme", "widgets", "feature/login");
        let name = key.container_name();
        assert!(name.starts_with("acme.widgets.feature-login-"), "{name}");
        assert_eq!(name.len(), "acme.widgets.feature-login-".len() + 8);
        assert_eq!(key.image_tag(), format!("{name}:latest"));
        assert_eq!(name, RepositoryKey::new("ACME", "widgets", "feature/login").container_name());
    }

    #[test]
    fn test_derived_names_distinguish_similar_branches() {
        let slashed = RepositoryKey::new("acme", "widgets", "feature/login");
        let dashed = RepositoryKey::new("acme", "widgets", "feature-login");
        assert_ne!(slashed, dashed);
        assert_ne!(slashed.container_name(), dashed.container_name());
        assert_ne!(slashed.image_tag(), dashed.image_tag());
        assert_ne!(slashed.dns_label(), dashed.dns_label());

        let dotted = RepositoryKey::new("acme", "widgets", "release.1");
        let hyphen = RepositoryKey::new("acme", "widgets", "release-1");
        assert_ne!(dotted.dns_label(), hyphen.dns_label());
    }

    #[test]
    fn test_dns_label_is_bounded() {
        let key = RepositoryKey::new("acme", &"w".repeat(80), "main");
        let label = key.dns_label();
        assert!(label.len() <= 63, "{label}");
        assert!(label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
        assert!(!label.starts_with('-'));
        assert_ne!(label, RepositoryKey::new("acme", &"w".repeat(81), "main").dns_label());
    }
}
