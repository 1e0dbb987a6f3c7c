//! Request options and the argument-building policy.
//!
//! Every option is an enumerated value parsed from the JSON body; anything
//! outside the allow-list fails with `invalid value for <field>` before a
//! request is ever built.

use serde_json::{Map, Value};
use std::str::FromStr;

use playpen_core::config::ToolsConfig;
use playpen_core::types::{
    AsmFlavor, Backtrace, CompileOutput, ExecutionRequest, ExecutionRequestBuilder, OptLevel,
    ReleaseChannel,
};
use playpen_core::{Error, Result};

/// Environment variable telling the sandboxed scripts who is calling.
pub const SURFACE_ENV: &str = "PLAYPEN_ENV";

/// Which front end a request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Web,
    Irc,
}

impl Surface {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Irc => "irc",
        }
    }
}

// =============================================================================
// Field parsing
// =============================================================================

/// Parse an optional string field through `FromStr`.
fn parse_field<T: FromStr>(fields: &Map<String, Value>, name: &str) -> Result<Option<T>> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => s.parse().map(Some).map_err(|_| Error::invalid_value(name)),
        Some(_) => Err(Error::invalid_value(name)),
    }
}

/// Parse an optional boolean field; absent means `false`.
fn parse_flag(fields: &Map<String, Value>, name: &str) -> Result<bool> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(Error::invalid_value(name)),
    }
}

/// `version` is the historical name; `channel` is accepted as an alias.
/// Both are validated, and naming two different channels is an error.
fn parse_channel(fields: &Map<String, Value>) -> Result<ReleaseChannel> {
    let version = parse_field::<ReleaseChannel>(fields, "version")?;
    let channel = parse_field::<ReleaseChannel>(fields, "channel")?;
    match (version, channel) {
        (Some(version), Some(channel)) if version != channel => Err(Error::invalid_value("channel")),
        (version, channel) => Ok(version.or(channel).unwrap_or_default()),
    }
}

/// Extract the mandatory `code` field.
pub fn parse_code(fields: &Map<String, Value>) -> Result<&str> {
    match fields.get("code") {
        Some(Value::String(code)) => Ok(code),
        _ => Err(Error::invalid_value("code")),
    }
}

fn with_backtrace(builder: ExecutionRequestBuilder, requested: bool) -> ExecutionRequestBuilder {
    if requested {
        builder.env("RUST_BACKTRACE", "1")
    } else {
        builder
    }
}

// =============================================================================
// evaluate.json
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluateOptions {
    pub channel: ReleaseChannel,
    pub opt_level: OptLevel,
    pub backtrace: Backtrace,
    pub color: bool,
    pub test: bool,
    pub json_format: bool,
    pub separate_output: bool,
}

impl EvaluateOptions {
    pub fn from_fields(fields: &Map<String, Value>) -> Result<Self> {
        Ok(Self {
            channel: parse_channel(fields)?,
            opt_level: parse_field(fields, "optimize")?.unwrap_or_default(),
            backtrace: parse_field(fields, "backtrace")?.unwrap_or_default(),
            color: parse_flag(fields, "color")?,
            test: parse_flag(fields, "test")?,
            json_format: parse_flag(fields, "json_format")?,
            separate_output: parse_flag(fields, "separate_output")?,
        })
    }

    pub fn to_request(&self, tools: &ToolsConfig, code: &str) -> Result<ExecutionRequest> {
        let mut builder = ExecutionRequest::builder(self.channel, &tools.evaluate)
            .arg("-C")
            .arg(format!("opt-level={}", self.opt_level.as_u8()));
        if self.opt_level.is_debug() {
            builder = builder.arg("-g");
        }
        if self.json_format {
            builder = builder.arg("--error-format=json");
        }
        if self.color {
            builder = builder.arg("--color=always");
        }
        if self.test {
            builder = builder.arg("--test");
        }

        builder = builder.env(SURFACE_ENV, Surface::Web.as_str());
        with_backtrace(builder, self.backtrace.is_requested(self.opt_level.is_debug()))
            .input(code)
            .build()
    }
}

// =============================================================================
// compile.json
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOptions {
    pub channel: ReleaseChannel,
    pub opt_level: OptLevel,
    pub backtrace: Backtrace,
    pub color: bool,
    pub emit: CompileOutput,
    pub syntax: AsmFlavor,
}

impl CompileOptions {
    pub fn from_fields(fields: &Map<String, Value>) -> Result<Self> {
        Ok(Self {
            channel: parse_channel(fields)?,
            opt_level: parse_field(fields, "optimize")?.unwrap_or_default(),
            backtrace: parse_field(fields, "backtrace")?.unwrap_or_default(),
            color: parse_flag(fields, "color")?,
            emit: parse_field(fields, "emit")?.unwrap_or_default(),
            syntax: parse_field(fields, "syntax")?.unwrap_or_default(),
        })
    }

    pub fn to_request(&self, tools: &ToolsConfig, code: &str) -> Result<ExecutionRequest> {
        let mut builder = ExecutionRequest::builder(self.channel, &tools.compile)
            .arg("-C")
            .arg(format!("opt-level={}", self.opt_level.as_u8()))
            .arg("-C")
            .arg(format!("llvm-args=-x86-asm-syntax={}", self.syntax.as_str()))
            .args(self.emit.as_opts().iter().copied());
        if self.opt_level.is_debug() {
            builder = builder.arg("-g");
        }
        if self.color {
            builder = builder.arg("--color=always");
        }

        builder = builder.env(SURFACE_ENV, Surface::Web.as_str());
        with_backtrace(builder, self.backtrace.is_requested(self.opt_level.is_debug()))
            .input(code)
            .build()
    }
}

// =============================================================================
// format.json
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatOptions {
    pub channel: ReleaseChannel,
    pub backtrace: Backtrace,
}

impl FormatOptions {
    pub fn from_fields(fields: &Map<String, Value>) -> Result<Self> {
        Ok(Self {
            channel: parse_channel(fields)?,
            backtrace: parse_field(fields, "backtrace")?.unwrap_or_default(),
        })
    }

    /// The formatter has no debug build, so only an explicit `always` asks
    /// for a backtrace.
    pub fn to_request(&self, tools: &ToolsConfig, code: &str) -> Result<ExecutionRequest> {
        let builder = ExecutionRequest::builder(self.channel, &tools.format)
            .env(SURFACE_ENV, Surface::Web.as_str());
        with_backtrace(builder, self.backtrace == Backtrace::Always)
            .input(code)
            .build()
    }
}

// =============================================================================
// Chat
// =============================================================================

/// Request for a chat snippet: fixed `-C opt-level=2`, no other knobs.
pub fn chat_request(
    tools: &ToolsConfig,
    channel: ReleaseChannel,
    source: &str,
) -> Result<ExecutionRequest> {
    ExecutionRequest::builder(channel, &tools.evaluate)
        .args(["-C", "opt-level=2"])
        .env(SURFACE_ENV, Surface::Irc.as_str())
        .input(source)
        .build()
}

/// Request for the compiler version banner of `channel`.
pub fn version_request(tools: &ToolsConfig, channel: ReleaseChannel) -> Result<ExecutionRequest> {
    ExecutionRequest::builder(channel, &tools.rustc).arg("-V").build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_evaluate_defaults() {
        let options = EvaluateOptions::from_fields(&fields(json!({"code": "x"}))).unwrap();
        assert_eq!(options, EvaluateOptions::default());

        let request = options.to_request(&ToolsConfig::default(), "x").unwrap();
        assert_eq!(request.command(), "/usr/local/bin/evaluate.sh");
        assert_eq!(request.args(), &["-C".to_string(), "opt-level=2".to_string()]);
        assert_eq!(
            request.env(),
            &[(SURFACE_ENV.to_string(), "web".to_string())]
        );
    }

    #[test]
    fn test_evaluate_debug_build_flags() {
        let options = EvaluateOptions::from_fields(&fields(json!({
            "version": "nightly",
            "optimize": "0",
            "color": true,
            "test": true,
            "json_format": true,
        })))
        .unwrap();
        let request = options.to_request(&ToolsConfig::default(), "x").unwrap();

        assert_eq!(request.channel(), ReleaseChannel::Nightly);
        assert_eq!(
            request.args(),
            &["-C", "opt-level=0", "-g", "--error-format=json", "--color=always", "--test"]
                .map(String::from)
        );
        // Auto backtrace follows the debug build.
        assert!(request
            .env()
            .contains(&("RUST_BACKTRACE".to_string(), "1".to_string())));
    }

    #[test]
    fn test_invalid_values_name_the_field() {
        let cases = [
            (json!({"optimize": "5"}), "optimize"),
            (json!({"optimize": 2}), "optimize"),
            (json!({"version": "master"}), "version"),
            (json!({"channel": "nightly-2015"}), "channel"),
            (json!({"version": "stable", "channel": "bogus"}), "channel"),
            (json!({"version": "bogus", "channel": "stable"}), "version"),
            (json!({"version": "stable", "channel": "nightly"}), "channel"),
            (json!({"backtrace": "sometimes"}), "backtrace"),
            (json!({"test": "yes"}), "test"),
        ];
        for (body, field) in cases {
            let err = EvaluateOptions::from_fields(&fields(body)).unwrap_err();
            assert!(err.is_validation());
            assert_eq!(err.to_string(), format!("invalid value for {}", field));
        }
    }

    #[test]
    fn test_version_and_channel_may_agree() {
        let options =
            EvaluateOptions::from_fields(&fields(json!({"version": "beta", "channel": "beta"}))).unwrap();
        assert_eq!(options.channel, ReleaseChannel::Beta);
    }

    #[test]
    fn test_compile_arguments() {
        let options = CompileOptions::from_fields(&fields(json!({
            "emit": "llvm-ir",
            "syntax": "intel",
            "optimize": "3",
        })))
        .unwrap();
        let request = options.to_request(&ToolsConfig::default(), "x").unwrap();

        assert_eq!(
            request.args(),
            &["-C", "opt-level=3", "-C", "llvm-args=-x86-asm-syntax=intel", "--emit=llvm-ir"]
                .map(String::from)
        );
        assert!(CompileOptions::from_fields(&fields(json!({"emit": "ir"}))).is_err());
    }

    #[test]
    fn test_format_backtrace_only_when_always() {
        let tools = ToolsConfig::default();
        let auto = FormatOptions::from_fields(&fields(json!({}))).unwrap();
        assert_eq!(auto.to_request(&tools, "x").unwrap().env().len(), 1);

        let always = FormatOptions::from_fields(&fields(json!({"backtrace": "always"}))).unwrap();
        let request = always.to_request(&tools, "x").unwrap();
        assert_eq!(request.command(), "rustfmt");
        assert_eq!(request.env().len(), 2);
    }

    #[test]
    fn test_chat_request() {
        let request =
            chat_request(&ToolsConfig::default(), ReleaseChannel::Beta, "fn main() {}").unwrap();
        assert_eq!(request.args(), &["-C".to_string(), "opt-level=2".to_string()]);
        assert_eq!(request.env()[0].1, "irc");
        assert_eq!(request.input(), "fn main() {}");
    }

    #[test]
    fn test_code_is_required() {
        assert!(parse_code(&fields(json!({}))).is_err());
        assert!(parse_code(&fields(json!({"code": 1}))).is_err());
        assert_eq!(parse_code(&fields(json!({"code": "x"}))).unwrap(), "x");
    }
}
