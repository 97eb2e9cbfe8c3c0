// ABOUTME: Sandbox runtime abstraction and its Docker implementation via bollard
// ABOUTME: Boots the single instance container, spawns exec shells, exposes in-sandbox file I/O

use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use bollard::{
    container::{Config, CreateContainerOptions, ListContainersOptions, RemoveContainerOptions,
        StartContainerOptions},
    errors::Error as BollardError,
    exec::{CreateExecOptions, ResizeExecOptions, StartExecOptions, StartExecResults},
    models::{HostConfig, RestartPolicy, RestartPolicyNameEnum},
    Docker,
};
use bytes::Bytes;
use futures_util::stream::{Stream, StreamExt};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info};

use atelier_config::SandboxConfig;

use crate::error::{Result, SandboxError};
use crate::types::TerminalSize;

/// Labels applied to the instance container for discovery
const ATELIER_LABEL: &str = "atelier.managed";
const ATELIER_PROJECT_LABEL: &str = "atelier.project_id";

/// Single-consumer output stream of a spawned process
pub type ProcessOutput = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Write half of a spawned process's input
pub type ProcessInput = Pin<Box<dyn AsyncWrite + Send>>;

/// A live interactive process inside a sandbox instance
pub struct SpawnedProcess {
    /// Runtime identifier (exec id) used for resize
    pub process_id: String,
    pub input: ProcessInput,
    pub output: ProcessOutput,
}

/// What the runtime knows about a live instance
#[derive(Debug, Clone)]
pub struct RuntimeInstance {
    /// Container id
    pub runtime_id: String,
    /// Project the instance was created for, when recorded
    pub project_id: Option<String>,
}

/// The sandboxed execution environment runtime.
///
/// The runtime permits exactly one live instance process-wide and offers no
/// force-stop primitive; `boot` surfaces `InstanceActive` when an instance
/// already exists, and `find_active` lets the registry adopt one it did not
/// create.
#[async_trait]
pub trait SandboxRuntime: Send + Sync {
    async fn boot(&self, project_id: &str) -> Result<RuntimeInstance>;
    async fn find_active(&self) -> Result<Option<RuntimeInstance>>;
    async fn spawn_shell(&self, runtime_id: &str, size: TerminalSize) -> Result<SpawnedProcess>;
    async fn resize_process(&self, process_id: &str, cols: u16, rows: u16) -> Result<()>;
    async fn read_file(&self, runtime_id: &str, path: &str) -> Result<Vec<u8>>;
    async fn write_file(&self, runtime_id: &str, path: &str, content: &[u8]) -> Result<()>;
    async fn remove_path(&self, runtime_id: &str, path: &str) -> Result<()>;
}

/// Docker-backed sandbox runtime
pub struct DockerRuntime {
    docker: Docker,
    config: SandboxConfig,
}

impl DockerRuntime {
    /// Connect to the Docker daemon and verify it responds
    pub async fn connect(config: SandboxConfig) -> Result<Self> {
        #[cfg(unix)]
        let docker = Docker::connect_with_socket_defaults()?;

        #[cfg(windows)]
        let docker = Docker::connect_with_named_pipe_defaults()?;

        docker.ping().await.map_err(|e| {
            error!("Failed to connect to Docker daemon: {}", e);
            SandboxError::Docker(e)
        })?;

        info!("Successfully connected to Docker daemon");
        Ok(Self { docker, config })
    }

    /// Ensure the sandbox image exists locally
    async fn ensure_image(&self) -> Result<()> {
        match self.docker.inspect_image(&self.config.image).await {
            Ok(_) => Ok(()),
            Err(_) => Err(SandboxError::ImageError(format!(
                "Image {} not found locally. Pull it first with: docker pull {}",
                self.config.image, self.config.image
            ))),
        }
    }

    fn instance_labels(&self, project_id: &str) -> HashMap<String, String> {
        let mut labels = HashMap::new();
        labels.insert(ATELIER_LABEL.to_string(), "true".to_string());
        labels.insert(ATELIER_PROJECT_LABEL.to_string(), project_id.to_string());
        labels
    }

    /// Run a one-shot exec inside the instance, feeding stdin when given,
    /// returning collected stdout/stderr
    async fn run_exec(
        &self,
        runtime_id: &str,
        cmd: Vec<String>,
        stdin: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        let exec = self
            .docker
            .create_exec(
                runtime_id,
                CreateExecOptions {
                    attach_stdin: Some(stdin.is_some()),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    cmd: Some(cmd),
                    ..Default::default()
                },
            )
            .await?;

        let started = self
            .docker
            .start_exec(&exec.id, Some(StartExecOptions { detach: false, ..Default::default() }))
            .await?;

        let mut collected = Vec::new();
        match started {
            StartExecResults::Attached { mut output, mut input } => {
                if let Some(data) = stdin {
                    input.write_all(data).await?;
                    input.flush().await?;
                }
                // Close stdin so commands like `cat > file` terminate
                input.shutdown().await.ok();

                while let Some(chunk) = output.next().await {
                    collected.extend_from_slice(&chunk?.into_bytes());
                }
            }
            StartExecResults::Detached => {
                return Err(SandboxError::Stream("exec unexpectedly detached".to_string()));
            }
        }

        let inspect = self.docker.inspect_exec(&exec.id).await?;
        match inspect.exit_code {
            Some(0) | None => Ok(collected),
            Some(code) => Err(SandboxError::Io(std::io::Error::other(format!(
                "exec exited with status {}: {}",
                code,
                String::from_utf8_lossy(&collected)
            )))),
        }
    }
}

#[async_trait]
impl SandboxRuntime for DockerRuntime {
    /// Boot the single instance container.
    ///
    /// The container name is fixed, so a concurrent boot anywhere in the
    /// process collides on Docker's side and comes back as `InstanceActive`.
    async fn boot(&self, project_id: &str) -> Result<RuntimeInstance> {
        debug!("Booting sandbox instance for project {}", project_id);
        self.ensure_image().await?;

        let host_config = HostConfig {
            network_mode: Some("bridge".to_string()),
            restart_policy: Some(RestartPolicy {
                name: Some(RestartPolicyNameEnum::NO),
                maximum_retry_count: Some(0),
            }),
            cap_drop: Some(vec!["ALL".to_string()]),
            privileged: Some(false),
            ..Default::default()
        };

        let config = Config {
            image: Some(self.config.image.clone()),
            // Keep the instance alive; all work happens through execs
            cmd: Some(vec!["sleep".to_string(), "infinity".to_string()]),
            tty: Some(false),
            labels: Some(self.instance_labels(project_id)),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: self.config.container_name.clone(),
            platform: None,
        };

        let response = match self.docker.create_container(Some(options), config).await {
            Ok(response) => response,
            Err(BollardError::DockerResponseServerError { status_code: 409, .. }) => {
                debug!("Instance container already exists; signalling conflict");
                return Err(SandboxError::InstanceActive);
            }
            Err(e) => {
                error!("Failed to create instance container: {}", e);
                return Err(SandboxError::BootFailed(e.to_string()));
            }
        };

        if let Err(e) = self
            .docker
            .start_container(&response.id, None::<StartContainerOptions<String>>)
            .await
        {
            // Leave no half-created container behind a failed start
            let _ = self
                .docker
                .remove_container(
                    &response.id,
                    Some(RemoveContainerOptions { force: true, ..Default::default() }),
                )
                .await;
            return Err(SandboxError::BootFailed(e.to_string()));
        }

        info!("Booted sandbox instance {} for project {}", response.id, project_id);
        Ok(RuntimeInstance {
            runtime_id: response.id,
            project_id: Some(project_id.to_string()),
        })
    }

    /// Look for a live instance, including one created outside the registry
    async fn find_active(&self) -> Result<Option<RuntimeInstance>> {
        let mut filters = HashMap::new();
        filters.insert("label".to_string(), vec![format!("{}=true", ATELIER_LABEL)]);

        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions {
                all: false,
                filters,
                ..Default::default()
            }))
            .await?;

        Ok(containers.into_iter().next().map(|c| RuntimeInstance {
            runtime_id: c.id.unwrap_or_default(),
            project_id: c
                .labels
                .and_then(|labels| labels.get(ATELIER_PROJECT_LABEL).cloned()),
        }))
    }

    /// Spawn an interactive shell as a TTY exec
    async fn spawn_shell(&self, runtime_id: &str, size: TerminalSize) -> Result<SpawnedProcess> {
        let exec = self
            .docker
            .create_exec(
                runtime_id,
                CreateExecOptions {
                    attach_stdin: Some(true),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    tty: Some(true),
                    cmd: Some(vec!["/bin/sh".to_string()]),
                    env: Some(vec!["TERM=xterm-256color".to_string()]),
                    ..Default::default()
                },
            )
            .await?;

        let started = self
            .docker
            .start_exec(&exec.id, Some(StartExecOptions { detach: false, ..Default::default() }))
            .await?;

        let (input, output) = match started {
            StartExecResults::Attached { output, input } => (input, output),
            StartExecResults::Detached => {
                return Err(SandboxError::Stream("shell exec unexpectedly detached".to_string()))
            }
        };

        self.docker
            .resize_exec(&exec.id, ResizeExecOptions { height: size.rows, width: size.cols })
            .await
            .ok();

        let mapped: ProcessOutput = Box::pin(output.map(|item| {
            item.map(|log| log.into_bytes()).map_err(SandboxError::Docker)
        }));

        debug!("Spawned shell exec {} in instance {}", exec.id, runtime_id);
        Ok(SpawnedProcess {
            process_id: exec.id,
            input,
            output: mapped,
        })
    }

    async fn resize_process(&self, process_id: &str, cols: u16, rows: u16) -> Result<()> {
        self.docker
            .resize_exec(process_id, ResizeExecOptions { height: rows, width: cols })
            .await?;
        Ok(())
    }

    async fn read_file(&self, runtime_id: &str, path: &str) -> Result<Vec<u8>> {
        self.run_exec(runtime_id, vec!["cat".to_string(), path.to_string()], None)
            .await
    }

    async fn write_file(&self, runtime_id: &str, path: &str, content: &[u8]) -> Result<()> {
        let quoted = shell_quote(path);
        let script = format!("mkdir -p \"$(dirname {})\" && cat > {}", quoted, quoted);
        self.run_exec(
            runtime_id,
            vec!["/bin/sh".to_string(), "-c".to_string(), script],
            Some(content),
        )
        .await?;
        Ok(())
    }

    async fn remove_path(&self, runtime_id: &str, path: &str) -> Result<()> {
        self.run_exec(
            runtime_id,
            vec!["rm".to_string(), "-rf".to_string(), "--".to_string(), path.to_string()],
            None,
        )
        .await?;
        Ok(())
    }
}

/// Single-quote a path for embedding in a shell script
fn shell_quote(path: &str) -> String {
    format!("'{}'", path.replace('\'', "'\\''"))
}
