//! `BuildImage` and `RunContainer` backed by the docker CLI.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use super::process::{run_command, CommandOutput, CommandResult};
use super::{ContainerControl, ExecutorError, ExecutorErrorKind, StepContext, StepExecutor, StepOutcome};
use crate::cancellation::CancellationToken;
use crate::core::{ContainerStatus, Stage};
use crate::repository::{RepositoryConfig, RepositoryKey, StateDelta};

const DEFAULT_RUN_COMMAND: &str = "docker run -d --name {name} -p {host_port}:{container_port} {image}";

fn default_docker_binary() -> String {
    "docker".to_string()
}

fn default_shell() -> String {
    "sh".to_string()
}

fn default_checkout_root() -> PathBuf {
    PathBuf::from("checkouts")
}

/// Settings shared by the docker executors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerConfig {
    /// The docker executable.
    #[serde(default = "default_docker_binary")]
    pub binary: String,
    /// Directory holding one checkout per repository key.
    #[serde(default = "default_checkout_root")]
    pub checkout_root: PathBuf,
    /// Shell interpreting build and run commands.
    #[serde(default = "default_shell")]
    pub shell: String,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            binary: default_docker_binary(),
            checkout_root: default_checkout_root(),
            shell: default_shell(),
        }
    }
}

impl DockerConfig {
    fn docker(&self) -> Command {
        Command::new(&self.binary)
    }

    fn shell(&self, script: &str) -> Command {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c").arg(script);
        cmd
    }

    async fn run(&self, cmd: Command, cancel: &CancellationToken) -> Result<CommandOutput, StepOutcome> {
        match run_command(cmd, cancel).await {
            Ok(CommandResult::Finished(output)) => Ok(output),
            Ok(CommandResult::Cancelled) => Err(StepOutcome::Fatal(ExecutorError::cancelled())),
            Err(err) => Err(StepOutcome::Fatal(err.into())),
        }
    }

    async fn inspect_status(&self, name: &str, cancel: &CancellationToken) -> Result<ContainerStatus, StepOutcome> {
        let mut cmd = self.docker();
        cmd.args(["inspect", "--format", "{{.State.Status}}", name]);
        let output = self.run(cmd, cancel).await?;
        if output.success() {
            Ok(ContainerStatus::from_engine_state(&output.stdout))
        } else if is_missing_container(&output) {
            Ok(ContainerStatus::Offline)
        } else {
            Err(StepOutcome::Fatal(ExecutorError::command(format!(
                "docker inspect failed: {}",
                output.stderr_tail(3)
            ))))
        }
    }

    async fn remove_container(&self, name: &str, cancel: &CancellationToken) -> Result<(), StepOutcome> {
        let mut cmd = self.docker();
        cmd.args(["rm", "-f", name]);
        let output = self.run(cmd, cancel).await?;
        if output.success() || is_missing_container(&output) {
            Ok(())
        } else {
            Err(StepOutcome::Fatal(ExecutorError::command(format!(
                "docker rm failed: {}",
                output.stderr_tail(3)
            ))))
        }
    }
}

fn is_missing_container(output: &CommandOutput) -> bool {
    output.stderr.contains("No such container") || output.stderr.contains("No such object")
}

fn exit_detail(output: &CommandOutput) -> String {
    let code = output.code.map_or_else(|| "signal".to_string(), |c| c.to_string());
    let tail = output.stderr_tail(5);
    if tail.is_empty() {
        format!("exit code {code}")
    } else {
        format!("exit code {code}: {tail}")
    }
}

/// Builds the image from the repository's checkout.
#[derive(Debug, Clone, Default)]
pub struct DockerBuilder {
    config: DockerConfig,
}

impl DockerBuilder {
    /// Creates a builder.
    #[must_use]
    pub fn new(config: DockerConfig) -> Self {
        Self { config }
    }

    async fn build(&self, ctx: &StepContext<'_>) -> Result<String, StepOutcome> {
        let checkout = self.config.checkout_root.join(ctx.key.container_name());
        let build_path = ctx
            .config
            .build_path(&checkout)
            .map_err(|err| StepOutcome::Fatal(ExecutorError::internal(err.to_string())))?;
        if !tokio::fs::try_exists(&build_path).await.unwrap_or(false) {
            return Err(StepOutcome::Fatal(ExecutorError::command(format!(
                "build directory {} does not exist",
                ctx.config.build_dir
            ))));
        }

        let image = ctx.key.image_tag();
        ctx.info(format!("building image {image}"));
        let mut cmd = self.config.shell(&ctx.config.build_command.replace("{image}", &image));
        cmd.current_dir(&build_path).env("IMAGE_TAG", &image);
        let output = self.config.run(cmd, ctx.cancel).await?;
        if !output.success() {
            return Err(StepOutcome::Fatal(ExecutorError::command(format!(
                "build command failed: {}",
                exit_detail(&output)
            ))));
        }

        // Only an image the engine can see counts as built.
        let mut inspect = self.config.docker();
        inspect.args(["image", "inspect", "--format", "{{.Id}}", &image]);
        let output = self.config.run(inspect, ctx.cancel).await?;
        let image_id = output.stdout.trim();
        if !output.success() || image_id.is_empty() {
            return Err(StepOutcome::Fatal(ExecutorError::command(format!(
                "build finished but image {image} was not found"
            ))));
        }
        Ok(image_id.to_string())
    }
}

#[async_trait]
impl StepExecutor for DockerBuilder {
    fn stage(&self) -> Stage {
        Stage::Build
    }

    #[instrument(skip(self, ctx), fields(repository = %ctx.key, attempt = ctx.attempt))]
    async fn execute(&self, ctx: &StepContext<'_>) -> StepOutcome {
        match self.build(ctx).await {
            Ok(image_id) => {
                info!(image_id = %image_id, "Image built");
                StepOutcome::Success(StateDelta::built(image_id))
            }
            Err(outcome) => {
                warn!(outcome = ?outcome, "Build failed");
                outcome
            }
        }
    }
}

/// Starts the repository's container and inspects it.
#[derive(Debug, Clone, Default)]
pub struct DockerRunner {
    config: DockerConfig,
}

impl DockerRunner {
    /// Creates a runner.
    #[must_use]
    pub fn new(config: DockerConfig) -> Self {
        Self { config }
    }

    /// Containers currently publishing `host_port`.
    async fn port_owners(&self, host_port: u16, cancel: &CancellationToken) -> Result<Vec<String>, StepOutcome> {
        let mut cmd = self.config.docker();
        cmd.args(["ps", "--filter", &format!("publish={host_port}"), "--format", "{{.Names}}"]);
        let output = self.config.run(cmd, cancel).await?;
        if !output.success() {
            return Err(StepOutcome::Retryable(ExecutorError::command(format!(
                "docker ps failed: {}",
                output.stderr_tail(3)
            ))));
        }
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToString::to_string)
            .collect())
    }

    async fn start(&self, ctx: &StepContext<'_>) -> Result<ContainerStatus, StepOutcome> {
        let name = ctx.key.container_name();
        let host_port = ctx.config.ports.host;

        let owners = self.port_owners(host_port, ctx.cancel).await?;
        if let Some(other) = owners.iter().find(|owner| **owner != name) {
            return Err(StepOutcome::Fatal(ExecutorError::new(
                ExecutorErrorKind::PortConflict,
                format!("host port {host_port} is already published by container {other}"),
            )));
        }

        self.config.remove_container(&name, ctx.cancel).await?;

        let image = ctx.state.image_id.clone().unwrap_or_else(|| ctx.key.image_tag());
        let script = run_script(ctx.config, &name, &image);
        debug!(script = %script, "Starting container");
        ctx.info(format!("starting container {name}"));
        let output = self.config.run(self.config.shell(&script), ctx.cancel).await?;
        if !output.success() {
            return Err(StepOutcome::Fatal(ExecutorError::command(format!(
                "run command failed: {}",
                exit_detail(&output)
            ))));
        }

        self.config.inspect_status(&name, ctx.cancel).await
    }
}

/// Expands the run command placeholders, falling back to a plain `docker run`.
fn run_script(config: &RepositoryConfig, name: &str, image: &str) -> String {
    let template = if config.run_command.trim().is_empty() {
        DEFAULT_RUN_COMMAND
    } else {
        config.run_command.as_str()
    };
    template
        .replace("{name}", name)
        .replace("{image}", image)
        .replace("{host_port}", &config.ports.host.to_string())
        .replace("{container_port}", &config.ports.container.to_string())
}

#[async_trait]
impl StepExecutor for DockerRunner {
    fn stage(&self) -> Stage {
        Stage::Run
    }

    #[instrument(skip(self, ctx), fields(repository = %ctx.key, attempt = ctx.attempt))]
    async fn execute(&self, ctx: &StepContext<'_>) -> StepOutcome {
        match self.start(ctx).await {
            Ok(status) => {
                info!(status = %status, "Container started");
                StepOutcome::Success(StateDelta::started(status))
            }
            Err(outcome) => {
                warn!(outcome = ?outcome, "Run failed");
                outcome
            }
        }
    }
}

#[async_trait]
impl ContainerControl for DockerRunner {
    async fn status(&self, key: &RepositoryKey) -> Result<ContainerStatus, ExecutorError> {
        let cancel = CancellationToken::new();
        self.config
            .inspect_status(&key.container_name(), &cancel)
            .await
            .map_err(outcome_error)
    }

    async fn stop(&self, key: &RepositoryKey) -> Result<(), ExecutorError> {
        let cancel = CancellationToken::new();
        self.config
            .remove_container(&key.container_name(), &cancel)
            .await
            .map_err(outcome_error)
    }
}

fn outcome_error(outcome: StepOutcome) -> ExecutorError {
    match outcome {
        StepOutcome::Retryable(err) | StepOutcome::Fatal(err) => err,
        StepOutcome::Success(_) => ExecutorError::internal("unexpected success"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::RepositoryState;

    #[test]
    fn test_default_run_script() {
        let config = RepositoryConfig::new("acme", "widgets", "main").with_ports(8081, 3000);
        assert_eq!(
            run_script(&config, "acme.widgets.main", "sha256:abc"),
            "docker run -d --name acme.widgets.main -p 8081:3000 sha256:abc"
        );
    }

    #[test]
    fn test_custom_run_script_placeholders() {
        let config = RepositoryConfig::new("acme", "widgets", "main")
            .with_run_command("docker run -d --name {name} -e PORT={container_port} -p {host_port}:{container_port} {image}");
        assert_eq!(
            run_script(&config, "w", "img"),
            "docker run -d --name w -e PORT=80 -p 8080:80 img"
        );
    }

    #[test]
    fn test_exit_detail() {
        let output = CommandOutput {
            code: Some(1),
            stdout: String::new(),
            stderr: String::new(),
        };
        assert_eq!(exit_detail(&output), "exit code 1");
    }

    #[cfg(unix)]
    mod with_fake_docker {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::path::Path;

        fn fake_docker(dir: &Path, body: &str) -> String {
            let path = dir.join("fake-docker");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.to_string_lossy().into_owned()
        }

        fn setup(body: &str) -> (tempfile::TempDir, DockerConfig, RepositoryConfig) {
            let tmp = tempfile::tempdir().unwrap();
            let repo = RepositoryConfig::new("acme", "widgets", "main");
            std::fs::create_dir_all(tmp.path().join("checkouts").join(repo.key().container_name())).unwrap();
            let config = DockerConfig {
                binary: fake_docker(tmp.path(), body),
                checkout_root: tmp.path().join("checkouts"),
                shell: "sh".to_string(),
            };
            (tmp, config, repo)
        }

        async fn execute(executor: &dyn StepExecutor, repo: &RepositoryConfig, state: &RepositoryState) -> StepOutcome {
            let key = repo.key();
            let cancel = CancellationToken::new();
            let ctx = StepContext::new(executor.stage(), &key, repo, state, &cancel);
            executor.execute(&ctx).await
        }

        #[tokio::test]
        async fn test_build_reports_inspected_image_id() {
            let (_tmp, config, repo) = setup("echo sha256:feed");
            let repo = repo.with_build_command("test \"$IMAGE_TAG\" = {image}");

            let outcome = execute(&DockerBuilder::new(config), &repo, &RepositoryState::new()).await;
            assert_eq!(outcome, StepOutcome::Success(StateDelta::built("sha256:feed")));
        }

        #[tokio::test]
        async fn test_failing_build_command_is_fatal() {
            let (_tmp, config, repo) = setup("echo sha256:feed");
            let repo = repo.with_build_command("echo boom >&2; exit 1");

            let outcome = execute(&DockerBuilder::new(config), &repo, &RepositoryState::new()).await;
            let StepOutcome::Fatal(err) = outcome else {
                panic!("expected fatal");
            };
            assert_eq!(err.kind, ExecutorErrorKind::Command);
            assert_eq!(err.message, "build command failed: exit code 1: boom");
        }

        #[tokio::test]
        async fn test_missing_build_dir_is_fatal() {
            let (_tmp, config, repo) = setup("echo sha256:feed");
            let repo = repo.with_build_dir("services/api");

            let outcome = execute(&DockerBuilder::new(config), &repo, &RepositoryState::new()).await;
            assert!(matches!(outcome, StepOutcome::Fatal(ref e) if e.message.contains("services/api")));
        }

        #[tokio::test]
        async fn test_run_detects_port_owned_by_other_container() {
            let (_tmp, config, repo) =
                setup("case \"$1\" in ps) echo acme.gadgets.main ;; esac\nexit 0");
            let repo = repo.with_run_command("true");

            let outcome = execute(&DockerRunner::new(config), &repo, &RepositoryState::new()).await;
            assert!(matches!(outcome, StepOutcome::Fatal(ref e) if e.kind == ExecutorErrorKind::PortConflict));
        }

        #[tokio::test]
        async fn test_run_inspects_started_container() {
            let (_tmp, config, repo) = setup("case \"$1\" in inspect) echo running ;; esac\nexit 0");
            let repo = repo.with_run_command("true");

            let outcome = execute(&DockerRunner::new(config), &repo, &RepositoryState::new()).await;
            assert_eq!(outcome, StepOutcome::Success(StateDelta::started(ContainerStatus::Running)));
        }

        #[tokio::test]
        async fn test_control_treats_missing_container_as_offline() {
            let (_tmp, config, repo) = setup("echo 'Error: No such container: x' >&2\nexit 1");
            let runner = DockerRunner::new(config);

            assert_eq!(runner.status(&repo.key()).await.unwrap(), ContainerStatus::Offline);
            runner.stop(&repo.key()).await.unwrap();
        }
    }
}
