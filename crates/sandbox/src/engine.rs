//! Sandbox execution engine.
//!
//! `ProcessSandbox` drives an external jailing tool (or, with an empty
//! prefix, the command itself) as a child process. The supervisor enforces
//! its own deadline on top of whatever timeout the jail applies, so a wedged
//! backend can never hang a request.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use playpen_core::config::{InputTransport, SandboxConfig};
use playpen_core::traits::Sandbox;
use playpen_core::types::{ExecutionRequest, ExecutionResult};
use playpen_core::{Error, Result};

use crate::capture::Capture;

/// How long pipe readers may keep draining after the child is gone.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

// =============================================================================
// Process Sandbox
// =============================================================================

/// Runs each request as `prefix... command args... [input]`.
///
/// Stdout and stderr are merged into one buffer in arrival order; bytes are
/// never decoded or altered here. Only the first `max_capture_bytes` are kept.
pub struct ProcessSandbox {
    prefix: Vec<String>,
    transport: InputTransport,
    timeout: Duration,
    kill_grace: Duration,
    memory_limit_mb: u64,
    max_capture_bytes: usize,
}

impl ProcessSandbox {
    /// Build from the `[sandbox]` configuration section.
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            prefix: config.prefix.clone(),
            transport: config.input_transport,
            timeout: Duration::from_millis(config.timeout_ms),
            kill_grace: Duration::from_millis(config.kill_grace_ms),
            memory_limit_mb: config.memory_limit_mb,
            max_capture_bytes: config.max_capture_bytes,
        }
    }

    /// Run commands directly, without a jailing prefix.
    pub fn unconfined(timeout: Duration) -> Self {
        Self {
            prefix: Vec::new(),
            transport: InputTransport::Stdin,
            timeout,
            kill_grace: Duration::ZERO,
            memory_limit_mb: 0,
            max_capture_bytes: SandboxConfig::default().max_capture_bytes,
        }
    }

    pub fn with_capture_limit(mut self, max_capture_bytes: usize) -> Self {
        self.max_capture_bytes = max_capture_bytes;
        self
    }

    pub fn with_transport(mut self, transport: InputTransport) -> Self {
        self.transport = transport;
        self
    }

    /// Program and argument vector for `request`, placeholders substituted.
    pub fn invocation(&self, request: &ExecutionRequest) -> (String, Vec<String>) {
        let timeout_secs = self.timeout.as_millis().div_ceil(1000).max(1).to_string();
        let memory_mb = self.memory_limit_mb.to_string();

        let mut argv: Vec<String> = self
            .prefix
            .iter()
            .map(|part| {
                part.replace("{channel}", request.channel().as_str())
                    .replace("{timeout_secs}", &timeout_secs)
                    .replace("{memory_mb}", &memory_mb)
            })
            .collect();
        argv.push(request.command().to_string());
        argv.extend(request.args().iter().cloned());
        if self.transport == InputTransport::TrailingArgument {
            argv.push(request.input().to_string());
        }

        let program = argv.remove(0);
        (program, argv)
    }
}

#[async_trait]
impl Sandbox for ProcessSandbox {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        let (program, args) = self.invocation(request);

        let mut command = Command::new(&program);
        command
            .args(&args)
            .envs(request.env().iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(match self.transport {
                InputTransport::Stdin => Stdio::piped(),
                InputTransport::TrailingArgument => Stdio::null(),
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(
            channel = %request.channel(),
            program = %program,
            args = ?args,
            "Spawning sandboxed process"
        );

        let started = Instant::now();
        let mut child = command
            .spawn()
            .map_err(|e| Error::sandbox(format!("Failed to launch {}: {}", program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            let input = request.input().as_bytes().to_vec();
            tokio::spawn(async move {
                // A program that exits without reading its input is not an error.
                if let Err(e) = stdin.write_all(&input).await {
                    if e.kind() != std::io::ErrorKind::BrokenPipe {
                        tracing::debug!(error = %e, "Failed to write sandbox stdin");
                    }
                }
            });
        }

        let sink = Arc::new(Mutex::new(Capture::new(self.max_capture_bytes)));
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(append(sink.clone(), stdout)));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(append(sink.clone(), stderr)));
        }

        let deadline = self.timeout + self.kill_grace;
        let (exit_code, timed_out) = match tokio::time::timeout(deadline, child.wait()).await {
            Ok(status) => {
                let status = status
                    .map_err(|e| Error::sandbox(format!("Failed to wait for {}: {}", program, e)))?;
                (status.code(), false)
            }
            Err(_) => {
                tracing::warn!(
                    channel = %request.channel(),
                    deadline_ms = deadline.as_millis() as u64,
                    "Sandboxed process timed out, killing"
                );
                if let Err(e) = child.start_kill() {
                    tracing::warn!(error = %e, "Failed to kill sandboxed process");
                }
                let _ = child.wait().await;
                (None, true)
            }
        };

        drain(readers).await;
        let (output, dropped) = {
            let mut capture = sink.lock().await;
            (capture.take(), capture.dropped())
        };
        let elapsed = started.elapsed();

        if dropped > 0 {
            tracing::warn!(
                channel = %request.channel(),
                kept = output.len(),
                dropped,
                "Output exceeded capture limit"
            );
        }

        tracing::debug!(
            exit_code = ?exit_code,
            timed_out,
            bytes = output.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Sandboxed process finished"
        );

        Ok(ExecutionResult {
            output,
            exit_code,
            timed_out,
            elapsed,
        })
    }
}

async fn append<R: AsyncRead + Unpin>(into: Arc<Mutex<Capture>>, mut from: R) {
    let mut buf = [0u8; 8192];
    loop {
        match from.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => into.lock().await.push(&buf[..n]),
        }
    }
}

/// Wait for readers to hit EOF. A grandchild that inherited the pipes can
/// keep them open indefinitely, so give up after a short grace.
async fn drain(readers: Vec<JoinHandle<()>>) {
    for mut reader in readers {
        if tokio::time::timeout(DRAIN_TIMEOUT, &mut reader).await.is_err() {
            tracing::debug!("Output pipe still open after exit, abandoning reader");
            reader.abort();
        }
    }
}

// =============================================================================
// Mock Sandbox (for testing without a jail)
// =============================================================================

type Handler = Box<dyn Fn(&ExecutionRequest) -> Result<ExecutionResult> + Send + Sync>;

/// In-memory sandbox for unit testing. Records every request it receives.
pub struct MockSandbox {
    handler: Handler,
    requests: std::sync::Mutex<Vec<ExecutionRequest>>,
}

impl MockSandbox {
    /// Answer with `responses` in order, then with empty successes.
    pub fn new(responses: Vec<ExecutionResult>) -> Self {
        let queue = std::sync::Mutex::new(VecDeque::from(responses));
        Self::from_fn(move |_| {
            Ok(queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| ExecutionResult::completed(Vec::new(), 0)))
        })
    }

    /// Answer every request with `output` and exit code 0.
    pub fn always(output: impl Into<Vec<u8>>) -> Self {
        let output = output.into();
        Self::from_fn(move |_| Ok(ExecutionResult::completed(output.clone(), 0)))
    }

    /// A backend that never manages to launch.
    pub fn failing(message: &str) -> Self {
        let message = message.to_string();
        Self::from_fn(move |_| Err(Error::sandbox(message.clone())))
    }

    pub fn from_fn<F>(handler: F) -> Self
    where
        F: Fn(&ExecutionRequest) -> Result<ExecutionResult> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            requests: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ExecutionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sandbox for MockSandbox {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        self.requests.lock().unwrap().push(request.clone());
        (self.handler)(request)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use playpen_core::types::ReleaseChannel;

    fn request(channel: ReleaseChannel) -> ExecutionRequest {
        ExecutionRequest::builder(channel, "/usr/local/bin/evaluate.sh")
            .args(["-C", "opt-level=2"])
            .input("fn main() {}")
            .build()
            .unwrap()
    }

    #[test]
    fn test_invocation_substitutes_prefix() {
        let sandbox = ProcessSandbox::new(&SandboxConfig::default());
        let (program, args) = sandbox.invocation(&request(ReleaseChannel::Nightly));

        assert_eq!(program, "playpen");
        assert_eq!(args[0], "root-nightly");
        assert!(args.contains(&"--timeout=5".to_string()));
        assert!(args.contains(&"--memory-limit=128".to_string()));
        let tail: Vec<&str> = args.iter().rev().take(4).rev().map(String::as_str).collect();
        assert_eq!(tail, ["--", "/usr/local/bin/evaluate.sh", "-C", "opt-level=2"]);
    }

    #[test]
    fn test_trailing_argument_transport() {
        let sandbox = ProcessSandbox::unconfined(Duration::from_secs(1))
            .with_transport(InputTransport::TrailingArgument);
        let (program, args) = sandbox.invocation(&request(ReleaseChannel::Stable));

        assert_eq!(program, "/usr/local/bin/evaluate.sh");
        assert_eq!(args.last().map(String::as_str), Some("fn main() {}"));
    }

    #[test]
    fn test_timeout_secs_rounds_up() {
        let config = SandboxConfig {
            timeout_ms: 1_500,
            ..SandboxConfig::default()
        };
        let (_, args) = ProcessSandbox::new(&config).invocation(&request(ReleaseChannel::Stable));
        assert!(args.contains(&"--timeout=2".to_string()));
    }

    #[tokio::test]
    async fn test_mock_sandbox_scripted_then_default() {
        let mock = MockSandbox::new(vec![ExecutionResult::completed(b"first".to_vec(), 1)]);

        let first = mock.execute(&request(ReleaseChannel::Stable)).await.unwrap();
        let second = mock.execute(&request(ReleaseChannel::Beta)).await.unwrap();

        assert_eq!(first.output, b"first");
        assert!(!first.success());
        assert!(second.success());
        assert_eq!(mock.call_count(), 2);
        assert_eq!(mock.requests()[1].channel(), ReleaseChannel::Beta);
    }

    #[tokio::test]
    async fn test_mock_sandbox_failing() {
        let mock = MockSandbox::failing("no jail");
        let err = mock.execute(&request(ReleaseChannel::Stable)).await.unwrap_err();
        assert!(err.to_string().contains("no jail"));
    }
}
