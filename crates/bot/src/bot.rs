//! The chat front end: route a message, run it, send the lines back.

use std::sync::Arc;
use std::time::Instant;

use playpen_core::traits::ChatTransport;
use playpen_core::types::ReleaseChannel;
use playpen_core::Result;
use playpen_pipeline::{Pipeline, RenderMode};

use crate::trigger::TriggerRouter;

/// A message as seen by the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incoming {
    /// Nickname of the sender.
    pub sender: String,
    /// Channel the message was said in, `None` for a private message.
    pub channel: Option<String>,
    pub text: String,
}

impl Incoming {
    pub fn public(channel: &str, sender: &str, text: &str) -> Self {
        Self {
            sender: sender.to_string(),
            channel: Some(channel.to_string()),
            text: text.to_string(),
        }
    }

    pub fn direct(sender: &str, text: &str) -> Self {
        Self {
            sender: sender.to_string(),
            channel: None,
            text: text.to_string(),
        }
    }

    pub fn is_direct(&self) -> bool {
        self.channel.is_none()
    }

    /// Replies go back to the channel, or to the sender for private messages.
    pub fn reply_target(&self) -> &str {
        self.channel.as_deref().unwrap_or(&self.sender)
    }
}

pub struct ChatBot {
    pipeline: Arc<Pipeline>,
    transport: Arc<dyn ChatTransport>,
    router: TriggerRouter,
}

impl ChatBot {
    pub fn new(pipeline: Arc<Pipeline>, transport: Arc<dyn ChatTransport>, router: TriggerRouter) -> Self {
        Self {
            pipeline,
            transport,
            router,
        }
    }

    /// Handle one incoming message. Returns whether it triggered a run.
    pub async fn handle(&self, message: &Incoming) -> Result<bool> {
        let Some(matched) = self.router.route(&message.text, message.is_direct()) else {
            return Ok(false);
        };

        tracing::info!(
            sender = %message.sender,
            reply_to = %message.reply_target(),
            channel = %matched.channel,
            code_len = matched.code.len(),
            "Running chat snippet"
        );
        self.respond(message.reply_target(), matched.code, matched.channel, matched.mode)
            .await?;
        Ok(true)
    }

    /// Run `code` and send the result to `target`, one notice per line.
    pub async fn respond(
        &self,
        target: &str,
        code: &str,
        channel: ReleaseChannel,
        mode: &RenderMode,
    ) -> Result<()> {
        let started = Instant::now();
        let output = match self.pipeline.evaluate_snippet(code, channel, mode).await {
            Ok(output) => output,
            Err(e) => {
                tracing::error!(reply_to = %target, channel = %channel, error = %e, "Chat snippet failed");
                return Err(e);
            }
        };

        let text = output.text();
        for line in text.lines().filter(|line| !line.trim().is_empty()) {
            if let Err(e) = self.transport.notice(target, line).await {
                tracing::warn!(reply_to = %target, error = %e, "Failed to send notice");
            }
        }

        tracing::debug!(
            reply_to = %target,
            truncated = output.truncated,
            latency_ms = started.elapsed().as_millis() as u64,
            "Chat snippet answered"
        );
        Ok(())
    }
}
