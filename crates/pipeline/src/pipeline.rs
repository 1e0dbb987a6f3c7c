//! The execution pipeline shared by both front ends.
//!
//! ```text
//! snippet ─▶ TemplateRenderer ─▶ ExecutionRequest ─▶ Sandbox
//!                                                      │
//!   ProcessedOutput ◀─ paste fallback ◀─ post-process ◀┘
//! ```

use dashmap::DashMap;
use std::sync::Arc;

use playpen_core::config::{OutputConfig, ToolsConfig};
use playpen_core::traits::{PasteService, Sandbox};
use playpen_core::types::{
    ExecutionRequest, ExecutionResult, OutputBody, ProcessedOutput, ReleaseChannel,
};
use playpen_core::Result;
use playpen_telemetry::track_execution;

use crate::options::{chat_request, version_request, CompileOptions, EvaluateOptions, FormatOptions};
use crate::output::{
    bailout_message, decode, exceeds_limit, layout, merge_streams, split_streams,
    with_timeout_notice, Layout, NO_OUTPUT,
};
use crate::paste::publish_or_apologize;
use crate::template::{RenderMode, TemplateRenderer};

/// Used in the scaffold when the compiler cannot tell us its version.
pub const UNKNOWN_VERSION: &str = "unknown";

pub struct Pipeline {
    sandbox: Arc<dyn Sandbox>,
    paste: Arc<dyn PasteService>,
    renderer: TemplateRenderer,
    tools: ToolsConfig,
    output: OutputConfig,
    versions: DashMap<ReleaseChannel, String>,
}

impl Pipeline {
    pub fn new(
        sandbox: Arc<dyn Sandbox>,
        paste: Arc<dyn PasteService>,
        renderer: TemplateRenderer,
        tools: ToolsConfig,
        output: OutputConfig,
    ) -> Self {
        Self {
            sandbox,
            paste,
            renderer,
            tools,
            output,
            versions: DashMap::new(),
        }
    }

    pub fn renderer(&self) -> &TemplateRenderer {
        &self.renderer
    }

    /// Run one request, recording metrics. Launch errors pass through.
    pub async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        let channel = request.channel();
        let started = std::time::Instant::now();
        let result = self.sandbox.execute(request).await;

        let outcome = match &result {
            Ok(r) if r.timed_out => "timeout",
            Ok(r) if r.success() => "ok",
            Ok(_) => "failed",
            Err(e) => {
                tracing::error!(channel = %channel, command = %request.command(), error = %e, "Sandbox launch failed");
                "error"
            }
        };
        track_execution(channel.as_str(), outcome, started.elapsed().as_secs_f64());
        result
    }

    /// First line of `rustc -V` for `channel`, looked up once per process.
    pub async fn version(&self, channel: ReleaseChannel) -> String {
        if let Some(version) = self.versions.get(&channel) {
            return version.clone();
        }

        let banner = match version_request(&self.tools, channel) {
            Ok(request) => match self.execute(&request).await {
                Ok(result) if result.success() => merge_streams(&result.output)
                    .lines()
                    .next()
                    .map(|line| line.trim().to_string())
                    .filter(|line| !line.is_empty()),
                Ok(result) => {
                    tracing::warn!(channel = %channel, exit_code = ?result.exit_code, "Version query failed");
                    None
                }
                Err(_) => None,
            },
            Err(e) => {
                tracing::warn!(channel = %channel, error = %e, "Version query rejected");
                None
            }
        };

        match banner {
            Some(banner) => {
                tracing::debug!(channel = %channel, version = %banner, "Got compiler version");
                self.versions.insert(channel, banner.clone());
                banner
            }
            None => UNKNOWN_VERSION.to_string(),
        }
    }

    // =========================================================================
    // Chat
    // =========================================================================

    /// Render, run and shape a chat snippet for line-by-line delivery.
    pub async fn evaluate_snippet(
        &self,
        code: &str,
        channel: ReleaseChannel,
        mode: &RenderMode,
    ) -> Result<ProcessedOutput> {
        let version = if mode.wraps() {
            self.version(channel).await
        } else {
            String::new()
        };
        let source = self.renderer.render(mode, code, &version)?;
        let request = chat_request(&self.tools, channel, &source)?;
        let result = self.execute(&request).await?;

        let limits = &self.output.chat;
        if exceeds_limit(&result.output, limits) {
            return Ok(ProcessedOutput {
                body: OutputBody::Text(bailout_message(limits)),
                truncated: true,
                fallback_url: None,
                success: result.success(),
                timed_out: result.timed_out,
            });
        }

        let mut text = merge_streams(&result.output);
        if result.timed_out {
            text = with_timeout_notice(text);
        }

        let (body, truncated, fallback_url) = match layout(&text, limits) {
            Layout::Empty => (NO_OUTPUT.to_string(), false, None),
            Layout::Verbatim => (text.clone(), false, None),
            Layout::LinkOnly => {
                let link = publish_or_apologize(self.paste.as_ref(), &source, channel).await;
                (link_line(&link), true, link.ok())
            }
            Layout::Truncated(kept) => {
                let link = publish_or_apologize(self.paste.as_ref(), &source, channel).await;
                let mut lines: Vec<String> = kept.iter().map(|line| line.to_string()).collect();
                lines.push(link_line(&link));
                (lines.join("\n"), true, link.ok())
            }
        };

        Ok(ProcessedOutput {
            body: OutputBody::Text(body),
            truncated,
            fallback_url,
            success: result.success(),
            timed_out: result.timed_out,
        })
    }

    // =========================================================================
    // HTTP
    // =========================================================================

    /// `evaluate.json`: run the program, optionally keeping diagnostics and
    /// program output apart.
    pub async fn evaluate(&self, options: &EvaluateOptions, code: &str) -> Result<ProcessedOutput> {
        let request = options.to_request(&self.tools, code)?;
        let result = self.execute(&request).await?;
        if let Some(bailout) = self.http_bailout(&result) {
            return Ok(bailout);
        }

        let body = if options.separate_output {
            let (rustc, program) = split_streams(&result.output);
            let mut rustc = decode(rustc);
            if result.timed_out {
                rustc = with_timeout_notice(rustc);
            }
            OutputBody::Split {
                rustc,
                program: program.map(decode),
            }
        } else {
            let mut text = merge_streams(&result.output);
            if result.timed_out {
                text = with_timeout_notice(text);
            }
            OutputBody::Text(text)
        };

        Ok(ProcessedOutput {
            body,
            truncated: false,
            fallback_url: None,
            success: result.success(),
            timed_out: result.timed_out,
        })
    }

    /// `compile.json`: success means the compiler got as far as emitting
    /// output. Otherwise the body holds the diagnostics.
    pub async fn compile(&self, options: &CompileOptions, code: &str) -> Result<ProcessedOutput> {
        let request = options.to_request(&self.tools, code)?;
        let result = self.execute(&request).await?;
        if let Some(bailout) = self.http_bailout(&result) {
            return Ok(bailout);
        }

        let (rustc, program) = split_streams(&result.output);
        let (text, success) = match program {
            Some(program) if !result.timed_out => (decode(program), true),
            _ if result.timed_out => (with_timeout_notice(decode(rustc)), false),
            _ => (decode(rustc), false),
        };

        Ok(ProcessedOutput {
            body: OutputBody::Text(text),
            truncated: false,
            fallback_url: None,
            success,
            timed_out: result.timed_out,
        })
    }

    /// `format.json`: the formatter's output, successful or not.
    pub async fn format(&self, options: &FormatOptions, code: &str) -> Result<ProcessedOutput> {
        let request = options.to_request(&self.tools, code)?;
        let result = self.execute(&request).await?;
        if let Some(bailout) = self.http_bailout(&result) {
            return Ok(bailout);
        }

        let mut text = decode(&result.output);
        if result.timed_out {
            text = with_timeout_notice(text);
        }

        Ok(ProcessedOutput {
            body: OutputBody::Text(text),
            truncated: false,
            fallback_url: None,
            success: result.success(),
            timed_out: result.timed_out,
        })
    }

    fn http_bailout(&self, result: &ExecutionResult) -> Option<ProcessedOutput> {
        let limits = &self.output.http;
        exceeds_limit(&result.output, limits).then(|| ProcessedOutput {
            body: OutputBody::Text(bailout_message(limits)),
            truncated: true,
            fallback_url: None,
            success: false,
            timed_out: result.timed_out,
        })
    }
}

fn link_line(link: &std::result::Result<String, &'static str>) -> String {
    match link {
        Ok(url) => url.clone(),
        Err(apology) => apology.to_string(),
    }
}
