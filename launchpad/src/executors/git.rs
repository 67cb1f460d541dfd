//! `FetchSource` backed by the git CLI.

use async_trait::async_trait;
use base64::Engine as _;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use super::process::{run_command, CommandOutput, CommandResult};
use super::{ExecutorError, StepContext, StepExecutor, StepOutcome};
use crate::core::Stage;
use crate::credentials::{CredentialResolver, ResolveError};
use crate::repository::{RepositoryKey, StateDelta, Visibility};

static AUTH_FAILURE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)authentication failed|could not read username|invalid username or password|permission denied|repository not found|access denied|returned error: 40[13]",
    )
    .ok()
});

static NETWORK_FAILURE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)could not resolve host|connection (timed out|refused|reset)|operation timed out|network is unreachable|early eof|remote end hung up|temporary failure|returned error: 5\d\d|gnutls|ssl",
    )
    .ok()
});

fn default_git_binary() -> String {
    "git".to_string()
}

fn default_checkout_root() -> PathBuf {
    PathBuf::from("checkouts")
}

/// Settings of the git fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitConfig {
    /// The git executable.
    #[serde(default = "default_git_binary")]
    pub binary: String,
    /// Directory holding one checkout per repository key.
    #[serde(default = "default_checkout_root")]
    pub checkout_root: PathBuf,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            binary: default_git_binary(),
            checkout_root: default_checkout_root(),
        }
    }
}

/// Clones or updates a repository checkout and reports its head commit.
pub struct GitFetcher {
    config: GitConfig,
    credentials: Option<Arc<dyn CredentialResolver>>,
}

impl GitFetcher {
    /// Creates a fetcher for public repositories.
    #[must_use]
    pub fn new(config: GitConfig) -> Self {
        Self {
            config,
            credentials: None,
        }
    }

    /// Sets the resolver used for private repositories.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialResolver>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Checkout directory of a repository.
    #[must_use]
    pub fn checkout_dir(&self, key: &RepositoryKey) -> PathBuf {
        self.config.checkout_root.join(key.container_name())
    }

    fn git(&self, auth: &[String]) -> Command {
        let mut cmd = Command::new(&self.config.binary);
        cmd.env("GIT_TERMINAL_PROMPT", "0").args(auth);
        cmd
    }

    /// `-c http.extraHeader=...` arguments for private repositories.
    async fn auth_args(&self, ctx: &StepContext<'_>) -> Result<Vec<String>, StepOutcome> {
        if ctx.config.visibility == Visibility::Public {
            return Ok(Vec::new());
        }
        let Some(credential) = ctx.config.credential.as_ref() else {
            return Err(StepOutcome::Fatal(ExecutorError::auth(
                "private repository has no credential reference",
            )));
        };
        let Some(resolver) = self.credentials.as_ref() else {
            return Err(StepOutcome::Fatal(ExecutorError::auth(
                "no credential resolver configured for private repository",
            )));
        };

        let token = match resolver.resolve_credential(credential).await {
            Ok(token) => token,
            Err(ResolveError::NotFound(_)) => {
                return Err(StepOutcome::Fatal(ExecutorError::auth(format!(
                    "credential {credential} not found"
                ))));
            }
            Err(ResolveError::Unauthorized(msg)) => {
                return Err(StepOutcome::Fatal(ExecutorError::auth(msg)));
            }
            Err(ResolveError::Upstream(msg)) => {
                return Err(StepOutcome::Retryable(ExecutorError::network(format!(
                    "credential lookup failed: {msg}"
                ))));
            }
        };

        debug!(credential = %credential, "Resolved fetch credential");
        let basic = base64::engine::general_purpose::STANDARD
            .encode(format!("x-access-token:{}", token.expose()));
        Ok(vec![
            "-c".to_string(),
            format!("http.extraHeader=Authorization: Basic {basic}"),
        ])
    }

    async fn run_git(&self, cmd: Command, ctx: &StepContext<'_>, action: &str) -> Result<CommandOutput, StepOutcome> {
        match run_command(cmd, ctx.cancel).await {
            Ok(CommandResult::Finished(output)) if output.success() => Ok(output),
            Ok(CommandResult::Finished(output)) => Err(classify_git_failure(action, &output)),
            Ok(CommandResult::Cancelled) => Err(StepOutcome::Fatal(ExecutorError::cancelled())),
            Err(err) => Err(StepOutcome::Fatal(err.into())),
        }
    }

    async fn fetch(&self, ctx: &StepContext<'_>) -> Result<String, StepOutcome> {
        let auth = self.auth_args(ctx).await?;
        let dir = self.checkout_dir(ctx.key);
        let has_checkout = tokio::fs::try_exists(dir.join(".git")).await.unwrap_or(false);
        let branch = &ctx.config.branch;

        if has_checkout {
            ctx.info(format!("updating checkout to origin/{branch}"));
            let mut fetch = self.git(&auth);
            fetch.arg("-C").arg(&dir).args(["fetch", "--depth", "1", "origin", branch]);
            self.run_git(fetch, ctx, "fetch").await?;

            let mut reset = self.git(&[]);
            reset.arg("-C").arg(&dir).args(["reset", "--hard", "FETCH_HEAD"]);
            self.run_git(reset, ctx, "reset").await?;
        } else {
            // A directory without .git is a clone interrupted mid-way.
            if let Err(err) = tokio::fs::remove_dir_all(&dir).await {
                if err.kind() != std::io::ErrorKind::NotFound {
                    return Err(StepOutcome::Fatal(ExecutorError::internal(format!(
                        "cannot clear partial checkout {}: {err}",
                        dir.display()
                    ))));
                }
            }
            if let Err(err) = tokio::fs::create_dir_all(&self.config.checkout_root).await {
                return Err(StepOutcome::Fatal(ExecutorError::internal(format!(
                    "cannot create checkout root: {err}"
                ))));
            }

            ctx.info(format!("cloning branch {branch}"));
            let mut clone = self.git(&auth);
            clone
                .args(["clone", "--depth", "1", "--branch", branch, "--single-branch", "--"])
                .arg(&ctx.config.source_url)
                .arg(&dir);
            self.run_git(clone, ctx, "clone").await?;
        }

        let mut rev_parse = self.git(&[]);
        rev_parse.arg("-C").arg(&dir).args(["rev-parse", "HEAD"]);
        let output = self.run_git(rev_parse, ctx, "rev-parse").await?;
        let hash = output.stdout.trim().to_string();
        if hash.is_empty() {
            return Err(StepOutcome::Fatal(ExecutorError::internal("git rev-parse returned no commit")));
        }
        Ok(hash)
    }
}

impl std::fmt::Debug for GitFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitFetcher")
            .field("config", &self.config)
            .field("has_credentials", &self.credentials.is_some())
            .finish()
    }
}

#[async_trait]
impl StepExecutor for GitFetcher {
    fn stage(&self) -> Stage {
        Stage::Fetch
    }

    #[instrument(skip(self, ctx), fields(repository = %ctx.key, attempt = ctx.attempt))]
    async fn execute(&self, ctx: &StepContext<'_>) -> StepOutcome {
        match self.fetch(ctx).await {
            Ok(hash) => {
                info!(commit = %hash, "Checkout updated");
                StepOutcome::Success(StateDelta::fetched(hash))
            }
            Err(outcome) => {
                if let StepOutcome::Retryable(err) | StepOutcome::Fatal(err) = &outcome {
                    warn!(error = %err, kind = %err.kind, "Fetch failed");
                }
                outcome
            }
        }
    }
}

/// Maps a failed git invocation to a fatal or retryable outcome.
fn classify_git_failure(action: &str, output: &CommandOutput) -> StepOutcome {
    let detail = output.stderr_tail(3);
    let matches = |pattern: &LazyLock<Option<Regex>>| {
        pattern.as_ref().is_some_and(|re| re.is_match(&output.stderr))
    };

    if matches(&AUTH_FAILURE) {
        StepOutcome::Fatal(ExecutorError::auth(format!("git {action} rejected credentials: {detail}")))
    } else if matches(&NETWORK_FAILURE) {
        StepOutcome::Retryable(ExecutorError::network(format!("git {action} network failure: {detail}")))
    } else {
        StepOutcome::Fatal(ExecutorError::command(format!(
            "git {action} failed (exit {}): {detail}",
            output.code.map_or_else(|| "signal".to_string(), |c| c.to_string())
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationToken;
    use crate::credentials::StaticCredentials;
    use crate::executors::ExecutorErrorKind;
    use crate::repository::{RepositoryConfig, RepositoryState};

    fn failed(stderr: &str) -> CommandOutput {
        CommandOutput {
            code: Some(128),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn test_classify_auth_failure() {
        let outcome = classify_git_failure(
            "clone",
            &failed("fatal: Authentication failed for 'https://github.com/acme/widgets.git/'"),
        );
        let StepOutcome::Fatal(err) = outcome else {
            panic!("expected fatal");
        };
        assert_eq!(err.kind, ExecutorErrorKind::Auth);
    }

    #[test]
    fn test_classify_network_failure() {
        let outcome = classify_git_failure(
            "fetch",
            &failed("fatal: unable to access 'https://github.com/': Could not resolve host: github.com"),
        );
        assert!(matches!(outcome, StepOutcome::Retryable(ref e) if e.kind == ExecutorErrorKind::Network));
    }

    #[test]
    fn test_classify_other_failure() {
        let outcome = classify_git_failure("clone", &failed("fatal: Remote branch nope not found"));
        let StepOutcome::Fatal(err) = outcome else {
            panic!("expected fatal");
        };
        assert_eq!(err.kind, ExecutorErrorKind::Command);
        assert!(err.message.contains("exit 128"));
    }

    #[cfg(unix)]
    mod with_fake_git {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::path::Path;

        fn fake_git(dir: &Path, body: &str) -> String {
            let path = dir.join("fake-git");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.to_string_lossy().into_owned()
        }

        fn script(log: &Path) -> String {
            format!(
                r#"echo "$*" >> "{log}"
for a in "$@"; do last="$a"; done
case " $* " in
  *" clone "*) mkdir -p "$last/.git" ;;
  *" rev-parse "*) echo abc123 ;;
esac
exit 0"#,
                log = log.display()
            )
        }

        async fn run(fetcher: &GitFetcher, config: &RepositoryConfig) -> StepOutcome {
            let key = config.key();
            let state = RepositoryState::new();
            let cancel = CancellationToken::new();
            let ctx = StepContext::new(Stage::Fetch, &key, config, &state, &cancel);
            fetcher.execute(&ctx).await
        }

        #[tokio::test]
        async fn test_clone_then_update() {
            let tmp = tempfile::tempdir().unwrap();
            let log = tmp.path().join("git.log");
            let fetcher = GitFetcher::new(GitConfig {
                binary: fake_git(tmp.path(), &script(&log)),
                checkout_root: tmp.path().join("checkouts"),
            });
            let config = RepositoryConfig::new("acme", "widgets", "main");

            let outcome = run(&fetcher, &config).await;
            assert_eq!(outcome, StepOutcome::Success(StateDelta::fetched("abc123")));
            assert!(fetcher.checkout_dir(&config.key()).join(".git").exists());

            let outcome = run(&fetcher, &config).await;
            assert!(outcome.is_success());

            let calls = std::fs::read_to_string(&log).unwrap();
            assert!(calls.contains("clone --depth 1 --branch main --single-branch"));
            assert!(calls.contains("fetch --depth 1 origin main"));
            assert!(calls.contains("reset --hard FETCH_HEAD"));
        }

        #[tokio::test]
        async fn test_private_repo_sends_basic_auth_header() {
            let tmp = tempfile::tempdir().unwrap();
            let log = tmp.path().join("git.log");
            let fetcher = GitFetcher::new(GitConfig {
                binary: fake_git(tmp.path(), &script(&log)),
                checkout_root: tmp.path().join("checkouts"),
            })
            .with_credentials(Arc::new(StaticCredentials::new().with_account("acme-bot", "ghp_secret")));
            let config = RepositoryConfig::new("acme", "widgets", "main").private("acme-bot");

            assert!(run(&fetcher, &config).await.is_success());

            let calls = std::fs::read_to_string(&log).unwrap();
            assert!(calls.contains("http.extraHeader=Authorization: Basic "));
            assert!(!calls.contains("ghp_secret"));
        }

        #[tokio::test]
        async fn test_private_repo_missing_credential_is_fatal() {
            let tmp = tempfile::tempdir().unwrap();
            let log = tmp.path().join("git.log");
            let fetcher = GitFetcher::new(GitConfig {
                binary: fake_git(tmp.path(), &script(&log)),
                checkout_root: tmp.path().join("checkouts"),
            })
            .with_credentials(Arc::new(StaticCredentials::new()));
            let config = RepositoryConfig::new("acme", "widgets", "main").private("acme-bot");

            let outcome = run(&fetcher, &config).await;
            assert!(matches!(outcome, StepOutcome::Fatal(ref e) if e.kind == ExecutorErrorKind::Auth));
            assert!(!log.exists());
        }

        #[tokio::test]
        async fn test_network_failure_is_retryable() {
            let tmp = tempfile::tempdir().unwrap();
            let fetcher = GitFetcher::new(GitConfig {
                binary: fake_git(
                    tmp.path(),
                    "echo \"fatal: unable to access: Could not resolve host: github.com\" >&2\nexit 128",
                ),
                checkout_root: tmp.path().join("checkouts"),
            });
            let config = RepositoryConfig::new("acme", "widgets", "main");

            let outcome = run(&fetcher, &config).await;
            assert!(matches!(outcome, StepOutcome::Retryable(ref e) if e.kind == ExecutorErrorKind::Network));
        }
    }
}
