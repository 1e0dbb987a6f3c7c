#![deny(unused)]
//! Playpen - sandboxed Rust snippet evaluation
//!
//! Runs untrusted snippets in an isolation backend and serves the results
//! over a JSON HTTP API and a chat bot.

use std::sync::Arc;

use playpen_bot::{run_console, ChatBot, ConsoleTransport, TriggerRouter};
use playpen_core::config::{AppConfig, SandboxBackend};
use playpen_core::traits::{ResultStore, Sandbox};
use playpen_gateway::GatewayServer;
use playpen_pipeline::{ChannelPaste, Pipeline, TemplateRenderer};
use playpen_sandbox::{DockerSandbox, MemoizedSandbox, ProcessSandbox};
use playpen_store::FileResultStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    playpen_telemetry::configure_tracing(&config.telemetry)?;

    tracing::info!("Starting Playpen v{}", env!("CARGO_PKG_VERSION"));

    // =========================================================================
    // Isolation backend
    // =========================================================================
    let backend: Arc<dyn Sandbox> = match config.sandbox.backend {
        SandboxBackend::Process => {
            tracing::info!(prefix = ?config.sandbox.prefix, "Using process sandbox");
            Arc::new(ProcessSandbox::new(&config.sandbox))
        }
        SandboxBackend::Docker => {
            let docker = DockerSandbox::new(&config.sandbox)?;
            if !docker.is_available().await {
                anyhow::bail!("Docker backend selected but the daemon is not reachable");
            }
            tracing::info!(image_prefix = %config.sandbox.image_prefix, "Using docker sandbox");
            Arc::new(docker)
        }
    };
    let sandbox = MemoizedSandbox::wrap(backend, config.sandbox.memo_capacity);

    // =========================================================================
    // Pipeline
    // =========================================================================
    let mut renderer = TemplateRenderer::new()?;
    let router = TriggerRouter::from_config(&config.bot, &mut renderer)?;
    let paste = Arc::new(ChannelPaste::from_config(&config.paste)?);

    let pipeline = Arc::new(Pipeline::new(
        sandbox,
        paste,
        renderer,
        config.tools.clone(),
        config.output.clone(),
    ));

    // =========================================================================
    // Front ends
    // =========================================================================
    let server = if config.server.enabled {
        let store: Arc<dyn ResultStore> = Arc::new(FileResultStore::from_config(&config.store));
        tracing::info!(root = %config.store.root, "Result store initialized");

        let mut server = GatewayServer::new(config.server.clone(), pipeline.clone(), store);
        if config.server.enable_metrics {
            server = server.with_metrics(playpen_telemetry::setup_metrics_recorder()?);
        }
        Some(server)
    } else {
        None
    };

    let bot = if config.bot.enabled && config.bot.console {
        tracing::info!(triggers = router.len(), "Chat bot enabled on the console");
        Some(ChatBot::new(pipeline, Arc::new(ConsoleTransport::new()), router))
    } else {
        if config.bot.enabled {
            tracing::warn!("Chat bot enabled without a transport; only the console is supported");
        }
        None
    };

    match (server, bot) {
        (Some(server), Some(bot)) => {
            tokio::try_join!(server.run(), run_console(&bot))?;
        }
        (Some(server), None) => server.run().await?,
        (None, Some(bot)) => run_console(&bot).await?,
        (None, None) => tracing::warn!("Neither the HTTP server nor the chat bot is enabled"),
    }

    Ok(())
}
