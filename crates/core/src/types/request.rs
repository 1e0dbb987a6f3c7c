use serde::Serialize;

use super::channel::ReleaseChannel;
use crate::error::{Error, Result};

// =============================================================================
// Execution Request
// =============================================================================

/// A validated request to run one command inside the sandbox.
///
/// Fields are private; the only way to obtain a request is through
/// [`ExecutionRequestBuilder::build`], which enforces the allow-lists. Two
/// requests comparing equal are interchangeable, which is what the memo
/// cache relies on.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize)]
pub struct ExecutionRequest {
    channel: ReleaseChannel,
    command: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    input: String,
}

impl ExecutionRequest {
    /// Start building a request for `command` on `channel`.
    pub fn builder(channel: ReleaseChannel, command: impl Into<String>) -> ExecutionRequestBuilder {
        ExecutionRequestBuilder {
            channel,
            command: command.into(),
            args: Vec::new(),
            env: Vec::new(),
            input: String::new(),
        }
    }

    pub fn channel(&self) -> ReleaseChannel {
        self.channel
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn env(&self) -> &[(String, String)] {
        &self.env
    }

    /// Source text (or other data) handed to the command.
    pub fn input(&self) -> &str {
        &self.input
    }
}

/// Builder for [`ExecutionRequest`].
#[derive(Debug, Clone)]
pub struct ExecutionRequestBuilder {
    channel: ReleaseChannel,
    command: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    input: String,
}

impl ExecutionRequestBuilder {
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((name.into(), value.into()));
        self
    }

    pub fn input(mut self, input: impl Into<String>) -> Self {
        self.input = input.into();
        self
    }

    /// Validate everything and freeze the request.
    pub fn build(self) -> Result<ExecutionRequest> {
        if !is_safe_token(&self.command) {
            return Err(Error::validation(format!(
                "command {:?} is not allowed",
                self.command
            )));
        }
        for arg in &self.args {
            if !is_safe_token(arg) {
                return Err(Error::validation(format!("argument {:?} is not allowed", arg)));
            }
        }
        for (name, value) in &self.env {
            if !is_env_name(name) {
                return Err(Error::validation(format!(
                    "environment variable name {:?} is not allowed",
                    name
                )));
            }
            if value.contains('\0') {
                return Err(Error::validation(format!(
                    "environment variable {} contains a NUL byte",
                    name
                )));
            }
        }
        if self.input.contains('\0') {
            return Err(Error::validation("input contains a NUL byte"));
        }

        Ok(ExecutionRequest {
            channel: self.channel,
            command: self.command,
            args: self.args,
            env: self.env,
            input: self.input,
        })
    }
}

/// Commands and arguments are generated from enumerated options, so anything
/// outside this character set indicates a bug or an injection attempt.
fn is_safe_token(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '=' | '.' | ',' | ':' | '/' | '+'))
}

fn is_env_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
