//! Declared repository configuration and its validation rules.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use super::RepositoryKey;
use crate::credentials::CredentialRef;
use crate::errors::ValidationError;

static IDENTIFIER_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").ok());

static BRANCH_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._/-]*$").ok());

/// Whether the source repository needs a credential to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Anonymous fetch.
    #[default]
    Public,
    /// Fetch requires the configured credential.
    Private,
}

/// Host and container port of the published service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortPair {
    /// Port bound on the host.
    pub host: u16,
    /// Port the container listens on.
    pub container: u16,
}

impl PortPair {
    /// Creates a port pair.
    #[must_use]
    pub const fn new(host: u16, container: u16) -> Self {
        Self { host, container }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.host == 0 {
            return Err(ValidationError::new("ports.host", "must be between 1 and 65535"));
        }
        if self.container == 0 {
            return Err(ValidationError::new("ports.container", "must be between 1 and 65535"));
        }
        Ok(())
    }
}

impl fmt::Display for PortPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.host, self.container)
    }
}

impl FromStr for PortPair {
    type Err = ValidationError;

    /// Parses `host/container` (or `host:container`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, container) = s
            .split_once(['/', ':'])
            .ok_or_else(|| ValidationError::new("ports", format!("'{s}' is not host/container")))?;

        let parse = |field: &str, raw: &str| -> Result<u16, ValidationError> {
            raw.trim()
                .parse::<u32>()
                .ok()
                .filter(|p| (1..=65535).contains(p))
                .and_then(|p| u16::try_from(p).ok())
                .ok_or_else(|| ValidationError::new(field, "must be between 1 and 65535"))
        };

        Ok(Self {
            host: parse("ports.host", host)?,
            container: parse("ports.container", container)?,
        })
    }
}

fn default_build_dir() -> String {
    ".".to_string()
}

fn default_build_command() -> String {
    "docker build --no-cache -t {image} .".to_string()
}

/// Declared configuration of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub name: String,
    /// Branch to deploy.
    pub branch: String,
    /// Clone URL. Must not embed credentials.
    pub source_url: String,
    /// Account reference used to resolve the fetch credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<CredentialRef>,
    /// Build directory relative to the checkout root.
    #[serde(default = "default_build_dir")]
    pub build_dir: String,
    /// Shell command producing the image. `{image}` expands to the image tag.
    #[serde(default = "default_build_command")]
    pub build_command: String,
    /// Shell command starting the container. Empty selects the default run.
    #[serde(default)]
    pub run_command: String,
    /// Published ports.
    pub ports: PortPair,
    /// Source visibility.
    #[serde(default)]
    pub visibility: Visibility,
}

impl RepositoryConfig {
    /// Creates a public configuration cloning from GitHub, publishing 8080/80.
    #[must_use]
    pub fn new(owner: impl Into<String>, name: impl Into<String>, branch: impl Into<String>) -> Self {
        let owner = owner.into();
        let name = name.into();
        Self {
            source_url: format!("https://github.com/{owner}/{name}.git"),
            owner,
            name,
            branch: branch.into(),
            credential: None,
            build_dir: default_build_dir(),
            build_command: default_build_command(),
            run_command: String::new(),
            ports: PortPair::new(8080, 80),
            visibility: Visibility::Public,
        }
    }

    /// Sets the clone URL.
    #[must_use]
    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = url.into();
        self
    }

    /// Sets the build directory.
    #[must_use]
    pub fn with_build_dir(mut self, dir: impl Into<String>) -> Self {
        self.build_dir = dir.into();
        self
    }

    /// Sets the build command.
    #[must_use]
    pub fn with_build_command(mut self, command: impl Into<String>) -> Self {
        self.build_command = command.into();
        self
    }

    /// Sets the run command.
    #[must_use]
    pub fn with_run_command(mut self, command: impl Into<String>) -> Self {
        self.run_command = command.into();
        self
    }

    /// Sets the published ports.
    #[must_use]
    pub fn with_ports(mut self, host: u16, container: u16) -> Self {
        self.ports = PortPair::new(host, container);
        self
    }

    /// Marks the repository private, fetched with the given account's credential.
    #[must_use]
    pub fn private(mut self, credential: impl Into<CredentialRef>) -> Self {
        self.visibility = Visibility::Private;
        self.credential = Some(credential.into());
        self
    }

    /// Returns the repository key.
    #[must_use]
    pub fn key(&self) -> RepositoryKey {
        RepositoryKey::new(&self.owner, &self.name, &self.branch)
    }

    /// Whether both configurations name the same `(owner, name, branch)`,
    /// ignoring case.
    #[must_use]
    pub fn same_identity(&self, other: &Self) -> bool {
        self.owner.eq_ignore_ascii_case(&other.owner)
            && self.name.eq_ignore_ascii_case(&other.name)
            && self.branch.eq_ignore_ascii_case(&other.branch)
    }

    /// Checks every field, returning the first violation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_identifier("owner", &self.owner, &IDENTIFIER_PATTERN)?;
        validate_identifier("name", &self.name, &IDENTIFIER_PATTERN)?;
        validate_identifier("branch", &self.branch, &BRANCH_PATTERN)?;
        if self.branch.contains("..") || self.branch.ends_with('/') {
            return Err(ValidationError::new("branch", "is not a valid branch name"));
        }

        if self.source_url.trim().is_empty() {
            return Err(ValidationError::new("source_url", "must not be empty"));
        }
        if let Some((_, rest)) = self.source_url.split_once("://") {
            let authority = rest.split('/').next().unwrap_or_default();
            if authority.contains('@') {
                return Err(ValidationError::new("source_url", "must not embed credentials"));
            }
        }

        if self.build_command.trim().is_empty() {
            return Err(ValidationError::new("build_command", "must not be empty"));
        }

        self.ports.validate()?;
        sandboxed_relative(&self.build_dir)?;

        match (self.visibility, &self.credential) {
            (Visibility::Private, None) => Err(ValidationError::new(
                "credential",
                "private repositories require a credential reference",
            )),
            (Visibility::Private, Some(credential)) if credential.is_blank() => Err(
                ValidationError::new("credential", "credential reference must not be empty"),
            ),
            (Visibility::Public, Some(_)) => Err(ValidationError::new(
                "credential",
                "public repositories must not carry a credential reference",
            )),
            _ => Ok(()),
        }
    }

    /// Resolves the build directory inside `checkout`, refusing paths that escape it.
    pub fn build_path(&self, checkout: &Path) -> Result<PathBuf, ValidationError> {
        Ok(checkout.join(sandboxed_relative(&self.build_dir)?))
    }
}

fn validate_identifier(
    field: &str,
    value: &str,
    pattern: &LazyLock<Option<Regex>>,
) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    let matches = pattern.as_ref().map_or(false, |re| re.is_match(value));
    if !matches {
        return Err(ValidationError::new(
            field,
            format!("'{value}' contains unsupported characters"),
        ));
    }
    Ok(())
}

/// Normalises `dir` lexically, rejecting absolute paths and `..` escapes.
fn sandboxed_relative(dir: &str) -> Result<PathBuf, ValidationError> {
    let mut normalized = PathBuf::new();
    for component in Path::new(dir).components() {
        match component {
            Component::CurDir => {}
            Component::Normal(part) => normalized.push(part),
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(ValidationError::new(
                        "build_dir",
                        format!("'{dir}' escapes the checkout root"),
                    ));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(ValidationError::new(
                    "build_dir",
                    format!("'{dir}' must be relative to the checkout root"),
                ));
            }
        }
    }
    Ok(normalized)
}
