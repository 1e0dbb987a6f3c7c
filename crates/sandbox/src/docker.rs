//! Docker backend.
//!
//! One throwaway container per request, created from the image for the
//! request's channel with every capability dropped, no network and tight
//! memory/pid limits. The container is always removed afterwards.

use async_trait::async_trait;
use bollard::container::{
    AttachContainerOptions, AttachContainerResults, Config, CreateContainerOptions,
    KillContainerOptions, LogOutput, RemoveContainerOptions, StartContainerOptions,
    WaitContainerOptions,
};
use bollard::models::HostConfig;
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use playpen_core::config::SandboxConfig;
use playpen_core::traits::Sandbox;
use playpen_core::types::{ExecutionRequest, ExecutionResult};
use playpen_core::{Error, Result};

use crate::capture::Capture;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Docker-based sandbox using the `bollard` crate.
pub struct DockerSandbox {
    docker: bollard::Docker,
    image_prefix: String,
    memory_limit: i64,
    pids_limit: i64,
    timeout: Duration,
    max_capture_bytes: usize,
}

impl DockerSandbox {
    /// Connect to the local Docker daemon.
    pub fn new(config: &SandboxConfig) -> Result<Self> {
        let docker = bollard::Docker::connect_with_local_defaults().map_err(|e| {
            Error::sandbox(format!(
                "Failed to connect to Docker daemon: {}. Is Docker running?",
                e
            ))
        })?;
        Ok(Self::from_client(docker, config))
    }

    /// Create from an existing bollard Docker client.
    pub fn from_client(docker: bollard::Docker, config: &SandboxConfig) -> Self {
        Self {
            docker,
            image_prefix: config.image_prefix.clone(),
            memory_limit: (config.memory_limit_mb as i64).saturating_mul(1024 * 1024),
            pids_limit: config.pids_limit,
            timeout: Duration::from_millis(config.timeout_ms),
            max_capture_bytes: config.max_capture_bytes,
        }
    }

    /// Image used for `request`.
    pub fn image_for(&self, request: &ExecutionRequest) -> String {
        format!("{}{}", self.image_prefix, request.channel())
    }

    /// Check if the Docker daemon answers.
    pub async fn is_available(&self) -> bool {
        self.docker.ping().await.is_ok()
    }

    fn container_config(&self, request: &ExecutionRequest) -> Config<String> {
        let mut cmd = vec![request.command().to_string()];
        cmd.extend(request.args().iter().cloned());

        let host_config = HostConfig {
            memory: Some(self.memory_limit),
            network_mode: Some("none".to_string()),
            cap_drop: Some(vec!["ALL".to_string()]),
            security_opt: Some(vec!["no-new-privileges".to_string()]),
            pids_limit: Some(self.pids_limit),
            ..Default::default()
        };

        Config {
            image: Some(self.image_for(request)),
            cmd: Some(cmd),
            env: Some(
                request
                    .env()
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect(),
            ),
            attach_stdin: Some(true),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            open_stdin: Some(true),
            stdin_once: Some(true),
            network_disabled: Some(true),
            host_config: Some(host_config),
            ..Default::default()
        }
    }

    async fn run(&self, id: &str, request: &ExecutionRequest) -> Result<ExecutionResult> {
        let AttachContainerResults { mut output, mut input } = self
            .docker
            .attach_container(
                id,
                Some(AttachContainerOptions::<String> {
                    stdin: Some(true),
                    stdout: Some(true),
                    stderr: Some(true),
                    stream: Some(true),
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| Error::sandbox(format!("Failed to attach to container: {}", e)))?;

        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| Error::sandbox(format!("Failed to start container: {}", e)))?;

        let started = Instant::now();

        let source = request.input().as_bytes().to_vec();
        tokio::spawn(async move {
            if let Err(e) = input.write_all(&source).await {
                tracing::debug!(error = %e, "Failed to write container stdin");
            }
            let _ = input.shutdown().await;
        });

        let sink = Arc::new(Mutex::new(Capture::new(self.max_capture_bytes)));
        let collected = sink.clone();
        let mut reader = tokio::spawn(async move {
            while let Some(msg) = output.next().await {
                match msg {
                    Ok(LogOutput::StdOut { message })
                    | Ok(LogOutput::StdErr { message })
                    | Ok(LogOutput::Console { message }) => {
                        collected.lock().await.push(&message);
                    }
                    Ok(LogOutput::StdIn { .. }) => {}
                    Err(e) => {
                        tracing::debug!(error = %e, "Container output stream failed");
                        break;
                    }
                }
            }
        });

        let mut wait = self
            .docker
            .wait_container(id, None::<WaitContainerOptions<String>>);
        let (exit_code, timed_out) = match tokio::time::timeout(self.timeout, wait.next()).await {
            Ok(Some(Ok(response))) => (Some(response.status_code as i32), false),
            // Non-zero exits surface as an error carrying the status code.
            Ok(Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. }))) => {
                (Some(code as i32), false)
            }
            Ok(Some(Err(e))) => {
                return Err(Error::sandbox(format!("Failed to wait for container: {}", e)))
            }
            Ok(None) => (None, false),
            Err(_) => {
                tracing::warn!(container = %id, "Container timed out, killing");
                if let Err(e) = self
                    .docker
                    .kill_container(id, None::<KillContainerOptions<String>>)
                    .await
                {
                    tracing::warn!(container = %id, error = %e, "Failed to kill container");
                }
                (None, true)
            }
        };

        if tokio::time::timeout(DRAIN_TIMEOUT, &mut reader).await.is_err() {
            reader.abort();
        }
        let (output, dropped) = {
            let mut capture = sink.lock().await;
            (capture.take(), capture.dropped())
        };
        if dropped > 0 {
            tracing::warn!(container = %id, kept = output.len(), dropped, "Output exceeded capture limit");
        }

        Ok(ExecutionResult {
            output,
            exit_code,
            timed_out,
            elapsed: started.elapsed(),
        })
    }
}

#[async_trait]
impl Sandbox for DockerSandbox {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        let name = format!("playpen-{}", uuid::Uuid::new_v4());
        let options = CreateContainerOptions {
            name: name.as_str(),
            platform: None,
        };

        let container = self
            .docker
            .create_container(Some(options), self.container_config(request))
            .await
            .map_err(|e| Error::sandbox(format!("Failed to create container: {}", e)))?;

        tracing::debug!(
            container = %container.id,
            image = %self.image_for(request),
            command = %request.command(),
            "Container created"
        );

        let result = self.run(&container.id, request).await;

        if let Err(e) = self
            .docker
            .remove_container(
                &container.id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
        {
            tracing::warn!(container = %container.id, error = %e, "Failed to remove container");
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playpen_core::types::ReleaseChannel;

    fn sandbox() -> Option<DockerSandbox> {
        // Building the client does not contact the daemon.
        bollard::Docker::connect_with_local_defaults()
            .ok()
            .map(|docker| DockerSandbox::from_client(docker, &SandboxConfig::default()))
    }

    #[tokio::test]
    async fn test_container_config_locks_down() {
        let Some(sandbox) = sandbox() else { return };
        let request = ExecutionRequest::builder(ReleaseChannel::Beta, "rustc")
            .arg("-V")
            .env("PLAYPEN_ENV", "web")
            .build()
            .unwrap();

        let config = sandbox.container_config(&request);
        assert_eq!(config.image.as_deref(), Some("rust-beta"));
        assert_eq!(config.cmd, Some(vec!["rustc".to_string(), "-V".to_string()]));
        assert_eq!(config.env, Some(vec!["PLAYPEN_ENV=web".to_string()]));

        let host = config.host_config.unwrap();
        assert_eq!(host.cap_drop, Some(vec!["ALL".to_string()]));
        assert_eq!(host.network_mode.as_deref(), Some("none"));
        assert_eq!(host.memory, Some(128 * 1024 * 1024));
        assert_eq!(host.pids_limit, Some(5));
    }
}
