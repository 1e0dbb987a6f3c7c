use config::{Config, ConfigError, Environment, File};
use secrecy::Secret;
use serde::Deserialize;

use crate::types::ReleaseChannel;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub sandbox: SandboxConfig,
    pub tools: ToolsConfig,
    pub output: OutputConfig,
    pub paste: PasteConfig,
    pub store: StoreConfig,
    pub bot: BotConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
    pub enable_tracing: bool,
    pub enable_metrics: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".into(),
            port: 8080,
            enable_cors: true,
            enable_tracing: true,
            enable_metrics: false,
        }
    }
}

/// Which isolation backend runs the commands.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SandboxBackend {
    /// An external jailing tool invoked as a command prefix.
    Process,
    /// One throwaway docker container per execution.
    Docker,
}

/// How the source reaches the sandboxed command.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InputTransport {
    Stdin,
    TrailingArgument,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SandboxConfig {
    pub backend: SandboxBackend,
    /// Command prefix for the process backend. `{channel}`, `{timeout_secs}`
    /// and `{memory_mb}` are substituted before spawning.
    pub prefix: Vec<String>,
    pub input_transport: InputTransport,
    /// Wall-clock limit handed to the backend.
    pub timeout_ms: u64,
    /// Extra time the supervisor waits before killing the backend itself.
    pub kill_grace_ms: u64,
    pub memory_limit_mb: u64,
    /// Image name prefix for the docker backend; the channel is appended.
    pub image_prefix: String,
    pub pids_limit: i64,
    /// Capacity of the in-process memo cache. Zero disables it.
    pub memo_capacity: usize,
    /// Output kept per execution; the rest is read and discarded. Must be
    /// larger than every `output.*.max_bytes` so the bailout still fires.
    pub max_capture_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            backend: SandboxBackend::Process,
            prefix: [
                "playpen",
                "root-{channel}",
                "--mount-proc",
                "--user=rust",
                "--timeout={timeout_secs}",
                "--syscalls-file=whitelist",
                "--devices=/dev/urandom:r,/dev/null:rw",
                "--memory-limit={memory_mb}",
                "--",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            input_transport: InputTransport::Stdin,
            timeout_ms: 5_000,
            kill_grace_ms: 1_000,
            memory_limit_mb: 128,
            image_prefix: "rust-".into(),
            pids_limit: 5,
            memo_capacity: 256,
            max_capture_bytes: 64 * 1024,
        }
    }
}

/// Commands run inside the sandbox for each HTTP route.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ToolsConfig {
    pub evaluate: String,
    pub compile: String,
    pub format: String,
    pub rustc: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            evaluate: "/usr/local/bin/evaluate.sh".into(),
            compile: "/usr/local/bin/compile.sh".into(),
            format: "rustfmt".into(),
            rustc: "rustc".into(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub chat: OutputLimits,
    pub http: OutputLimits,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            chat: OutputLimits::default(),
            http: OutputLimits::bytes_only(5000),
        }
    }
}

/// Inline output limits for one presentation mode.
///
/// A section that names only `max_bytes` has no line limits.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct OutputLimits {
    /// Raw outputs longer than this are replaced by the bailout message.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
    /// A longer line sends the whole output to the paste fallback.
    #[serde(default)]
    pub max_line_chars: Option<usize>,
    /// More lines than this are shortened to `max_lines - 1` plus a link.
    #[serde(default)]
    pub max_lines: Option<usize>,
}

fn default_max_bytes() -> usize {
    5000
}

impl OutputLimits {
    /// Byte ceiling only; no line-based truncation.
    pub fn bytes_only(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            max_line_chars: None,
            max_lines: None,
        }
    }
}

impl Default for OutputLimits {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            max_line_chars: Some(150),
            max_lines: Some(3),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PasteConfig {
    /// Online playground that the shortened deep link points at.
    pub playground_url: String,
    pub shortener_url: String,
    pub shortener_token: Option<Secret<String>>,
    pub gist_url: String,
    pub gist_token: Option<Secret<String>>,
    pub gist_filename: String,
    pub timeout_ms: u64,
}

impl Default for PasteConfig {
    fn default() -> Self {
        Self {
            playground_url: "https://play.rust-lang.org/".into(),
            shortener_url: "https://api-ssl.bitly.com/v3/shorten".into(),
            shortener_token: None,
            gist_url: "https://api.github.com/gists".into(),
            gist_token: None,
            gist_filename: "playbot.rs".into(),
            timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory of the persistent result store.
    pub root: String,
    /// Width of each directory level carved out of the fingerprint.
    pub segment_width: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: "cache".into(),
            segment_width: 4,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BotConfig {
    pub enabled: bool,
    /// Read private messages from stdin and print notices to stdout.
    pub console: bool,
    /// Used for direct messages that match no trigger.
    pub default_channel: ReleaseChannel,
    pub default_render: bool,
    pub triggers: Vec<TriggerConfig>,
}

impl Default for BotConfig {
    fn default() -> Self {
        let trigger = |pattern: &str, channel, render| TriggerConfig {
            pattern: pattern.into(),
            channel,
            render,
            template: None,
        };
        Self {
            enabled: false,
            console: true,
            default_channel: ReleaseChannel::Stable,
            default_render: true,
            triggers: vec![
                trigger(r"^playbot[:,]\s+(?P<code>.+)$", ReleaseChannel::Stable, true),
                trigger(r"^playbot-mini[:,]\s+(?P<code>.+)$", ReleaseChannel::Stable, false),
                trigger(r"^playbot-beta[:,]\s+(?P<code>.+)$", ReleaseChannel::Beta, true),
                trigger(r"^playbot-nightly[:,]\s+(?P<code>.+)$", ReleaseChannel::Nightly, true),
            ],
        }
    }
}

/// One chat trigger as written in configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct TriggerConfig {
    /// Regex with a `code` named group or a first capture group.
    pub pattern: String,
    #[serde(default)]
    pub channel: ReleaseChannel,
    /// Wrap the snippet in the default scaffold.
    #[serde(default)]
    pub render: bool,
    /// Custom scaffold; implies rendering.
    #[serde(default)]
    pub template: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Used when `RUST_LOG` is unset.
    pub log_filter: String,
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: "info,playpen=debug".into(),
            json_logs: false,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("PLAYPEN_ENV").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            // Map PLAYPEN__SERVER__PORT=3000 to server.port
            .add_source(Environment::with_prefix("PLAYPEN").separator("__"))
            .build()?;

        let config: Self = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Cross-section checks that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let widest = self.output.chat.max_bytes.max(self.output.http.max_bytes);
        if self.sandbox.max_capture_bytes <= widest {
            return Err(ConfigError::Message(format!(
                "sandbox.max_capture_bytes ({}) must exceed output max_bytes ({})",
                self.sandbox.max_capture_bytes, widest
            )));
        }
        Ok(())
    }
}
