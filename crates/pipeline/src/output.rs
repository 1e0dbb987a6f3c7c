//! Output post-processing.
//!
//! The sandboxed scripts print compiler diagnostics, then a single 0xFF
//! byte, then whatever the program printed. Only the first separator counts;
//! later 0xFF bytes belong to the program.

use playpen_core::config::OutputLimits;

/// Marks the end of compiler diagnostics in raw sandbox output.
pub const SEPARATOR: u8 = 0xFF;

/// Reported instead of an empty response, which chat users could not tell
/// apart from a lost one.
pub const NO_OUTPUT: &str = "success, no output";

/// Appended when the supervisor killed the run.
pub const TIMEOUT_NOTICE: &str = "error: execution timed out";

/// Split raw output at the first separator into `(diagnostics, program)`.
/// The separator itself belongs to neither side.
pub fn split_streams(raw: &[u8]) -> (&[u8], Option<&[u8]>) {
    match raw.iter().position(|&b| b == SEPARATOR) {
        Some(at) => (&raw[..at], Some(&raw[at + 1..])),
        None => (raw, None),
    }
}

pub fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Both sections decoded and concatenated, separator dropped.
pub fn merge_streams(raw: &[u8]) -> String {
    let (rustc, program) = split_streams(raw);
    let mut text = decode(rustc);
    if let Some(program) = program {
        text.push_str(&decode(program));
    }
    text
}

/// Whether raw output is too large to show at all.
pub fn exceeds_limit(raw: &[u8], limits: &OutputLimits) -> bool {
    raw.len() > limits.max_bytes
}

pub fn bailout_message(limits: &OutputLimits) -> String {
    format!("more than {} bytes of output; bailing out", limits.max_bytes)
}

/// Add the timeout notice on its own line.
pub fn with_timeout_notice(mut text: String) -> String {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(TIMEOUT_NOTICE);
    text
}

/// How decoded text fits the inline limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout<'a> {
    /// Nothing but whitespace.
    Empty,
    /// Fits as is.
    Verbatim,
    /// Some line is too long to show; only the fallback link is sent.
    LinkOnly,
    /// Too many lines; keep these and add the fallback link as the last line.
    Truncated(Vec<&'a str>),
}

/// Classify `text` against the line limits. Byte limits are checked
/// separately, on the raw output, before decoding.
pub fn layout<'a>(text: &'a str, limits: &OutputLimits) -> Layout<'a> {
    if text.trim().is_empty() {
        return Layout::Empty;
    }

    let lines: Vec<&str> = text.lines().collect();

    if let Some(max_chars) = limits.max_line_chars {
        if lines.iter().any(|line| line.chars().count() > max_chars) {
            return Layout::LinkOnly;
        }
    }

    match limits.max_lines {
        Some(max_lines) if lines.len() > max_lines => {
            let keep = max_lines.saturating_sub(1);
            Layout::Truncated(lines.into_iter().take(keep).collect())
        }
        _ => Layout::Verbatim,
    }
}
