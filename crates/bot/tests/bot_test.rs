use std::sync::Arc;

use playpen_bot::{ChatBot, Incoming, TriggerRouter};
use playpen_core::config::{BotConfig, OutputConfig, ToolsConfig};
use playpen_core::mocks::{MockPasteService, RecordingTransport};
use playpen_core::types::ReleaseChannel;
use playpen_pipeline::{Pipeline, TemplateRenderer, PASTE_FAILED};
use playpen_sandbox::MockSandbox;

struct Fixture {
    bot: ChatBot,
    sandbox: Arc<MockSandbox>,
    transport: Arc<RecordingTransport>,
}

fn fixture(sandbox: MockSandbox, paste: MockPasteService) -> Fixture {
    let sandbox = Arc::new(sandbox);
    let transport = Arc::new(RecordingTransport::new());
    let mut renderer = TemplateRenderer::new().unwrap();
    let router = TriggerRouter::from_config(&BotConfig::default(), &mut renderer).unwrap();
    let pipeline = Pipeline::new(
        sandbox.clone(),
        Arc::new(paste),
        renderer,
        ToolsConfig::default(),
        OutputConfig::default(),
    );

    Fixture {
        bot: ChatBot::new(Arc::new(pipeline), transport.clone(), router),
        sandbox,
        transport,
    }
}

#[tokio::test]
async fn test_channel_trigger_replies_to_channel() {
    let f = fixture(MockSandbox::always("2\n"), MockPasteService::new("https://p"));

    let handled = f
        .bot
        .handle(&Incoming::public("#rust", "alice", "playbot-mini: fn main() { println!(\"2\") }"))
        .await
        .unwrap();

    assert!(handled);
    assert_eq!(f.transport.lines_to("#rust"), vec!["2".to_string()]);
    let request = &f.sandbox.requests()[0];
    assert_eq!(request.input(), "fn main() { println!(\"2\") }");
    assert_eq!(request.channel(), ReleaseChannel::Stable);
}

#[tokio::test]
async fn test_unaddressed_channel_message_is_ignored() {
    let f = fixture(MockSandbox::always("x"), MockPasteService::new("https://p"));

    let handled = f
        .bot
        .handle(&Incoming::public("#rust", "bob", "does anyone know lifetimes?"))
        .await
        .unwrap();

    assert!(!handled);
    assert_eq!(f.sandbox.call_count(), 0);
    assert!(f.transport.notices().is_empty());
}

#[tokio::test]
async fn test_direct_message_uses_default_and_replies_to_sender() {
    let f = fixture(MockSandbox::always("()\n"), MockPasteService::new("https://p"));

    f.bot
        .handle(&Incoming::direct("carol", "()"))
        .await
        .unwrap();

    // Default mode wraps the snippet, which needs the version banner first.
    let requests = f.sandbox.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].command(), "rustc");
    assert!(requests[1].input().contains("show({"));
    assert_eq!(f.transport.lines_to("carol"), vec!["()".to_string()]);
}

#[tokio::test]
async fn test_long_output_sends_two_lines_and_link() {
    let f = fixture(
        MockSandbox::always("a\n\nb\nc\nd\n"),
        MockPasteService::failing(),
    );

    f.bot
        .handle(&Incoming::public("#rust", "dave", "playbot-mini: fn main() {}"))
        .await
        .unwrap();

    // The blank second line is kept by truncation but never sent.
    assert_eq!(
        f.transport.lines_to("#rust"),
        vec!["a".to_string(), PASTE_FAILED.to_string()]
    );
}

#[tokio::test]
async fn test_launch_failure_sends_nothing() {
    let f = fixture(MockSandbox::failing("no jail"), MockPasteService::new("https://p"));

    let result = f
        .bot
        .handle(&Incoming::public("#rust", "erin", "playbot-mini: fn main() {}"))
        .await;

    assert!(result.is_err());
    assert!(f.transport.notices().is_empty());
}
