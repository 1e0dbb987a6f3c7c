use serde::{Deserialize, Serialize};
use std::time::Duration;

// =============================================================================
// Execution Result
// =============================================================================

/// Raw outcome of one sandboxed execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Combined stdout/stderr, byte for byte (including any 0xFF separator).
    pub output: Vec<u8>,
    /// Exit code, `None` when the process was killed by a signal or timed out.
    pub exit_code: Option<i32>,
    /// Whether the supervision timeout fired.
    pub timed_out: bool,
    /// Wall-clock time spent waiting on the child.
    pub elapsed: Duration,
}

impl ExecutionResult {
    /// A completed run with the given output and exit code.
    pub fn completed(output: impl Into<Vec<u8>>, exit_code: i32) -> Self {
        Self {
            output: output.into(),
            exit_code: Some(exit_code),
            timed_out: false,
            elapsed: Duration::ZERO,
        }
    }

    /// A run killed by the supervision timeout.
    pub fn timed_out(output: impl Into<Vec<u8>>, elapsed: Duration) -> Self {
        Self {
            output: output.into(),
            exit_code: None,
            timed_out: true,
            elapsed,
        }
    }

    /// Whether the execution was successful (exit code 0, no timeout).
    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out
    }
}

// =============================================================================
// Processed Output
// =============================================================================

/// Presentation of the decoded output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputBody {
    /// Diagnostics and program output merged into one text.
    Text(String),
    /// Diagnostics and program output kept apart. `program` is `None` when
    /// compilation never got as far as running the program.
    Split {
        rustc: String,
        program: Option<String>,
    },
}

/// What crosses the system boundary after post-processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedOutput {
    pub body: OutputBody,
    /// Output was replaced or shortened (bailout or paste fallback).
    pub truncated: bool,
    /// Link to the full source when the paste fallback was used.
    pub fallback_url: Option<String>,
    /// The underlying execution exited successfully.
    pub success: bool,
    pub timed_out: bool,
}

impl ProcessedOutput {
    /// Flatten the body into a single text.
    pub fn text(&self) -> String {
        match &self.body {
            OutputBody::Text(text) => text.clone(),
            OutputBody::Split { rustc, program } => {
                let mut text = rustc.clone();
                if let Some(program) = program {
                    text.push_str(program);
                }
                text
            }
        }
    }
}
