//! Console chat transport: stdin lines become private messages, notices go
//! to stdout.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use playpen_core::traits::ChatTransport;
use playpen_core::{Error, Result};

use crate::bot::{ChatBot, Incoming};

/// Nickname used for messages typed on the console.
pub const CONSOLE_SENDER: &str = "console";

pub struct ConsoleTransport {
    stdout: Mutex<tokio::io::Stdout>,
}

impl ConsoleTransport {
    pub fn new() -> Self {
        Self {
            stdout: Mutex::new(tokio::io::stdout()),
        }
    }
}

impl Default for ConsoleTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatTransport for ConsoleTransport {
    async fn notice(&self, target: &str, line: &str) -> Result<()> {
        let mut stdout = self.stdout.lock().await;
        stdout
            .write_all(format!("-{}- {}\n", target, line).as_bytes())
            .await
            .map_err(|e| Error::chat(format!("Failed to write notice: {}", e)))?;
        stdout
            .flush()
            .await
            .map_err(|e| Error::chat(format!("Failed to flush stdout: {}", e)))
    }
}

/// Feed stdin to `bot` until EOF.
///
/// Messages are handled one at a time, so a slow snippet holds up the lines
/// after it. A network transport should spawn a task per message instead.
pub async fn run_console(bot: &ChatBot) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    tracing::info!("Console chat ready, reading messages from stdin");
    while let Some(line) = lines.next_line().await? {
        let message = Incoming::direct(CONSOLE_SENDER, &line);
        // Failures are already logged; keep reading.
        let _ = bot.handle(&message).await;
    }
    tracing::info!("Console input closed");
    Ok(())
}
