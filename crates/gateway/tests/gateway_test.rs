use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use playpen_core::config::{OutputConfig, ServerConfig, ToolsConfig};
use playpen_core::mocks::MockPasteService;
use playpen_core::types::ExecutionResult;
use playpen_gateway::GatewayServer;
use playpen_pipeline::{Pipeline, TemplateRenderer};
use playpen_sandbox::MockSandbox;
use playpen_store::InMemoryResultStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app(sandbox: Arc<MockSandbox>, store: Arc<InMemoryResultStore>) -> Router {
    let pipeline = Pipeline::new(
        sandbox,
        Arc::new(MockPasteService::new("https://paste.example")),
        TemplateRenderer::new().unwrap(),
        ToolsConfig::default(),
        OutputConfig::default(),
    );
    GatewayServer::new(ServerConfig::default(), Arc::new(pipeline), store).build_router()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = app(Arc::new(MockSandbox::always("")), Arc::new(InMemoryResultStore::new()));

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-xss-protection").unwrap(),
        "0"
    );

    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_evaluate_returns_result_and_id() {
    let sandbox = Arc::new(MockSandbox::always("Hello, world!\n"));
    let app = app(sandbox.clone(), Arc::new(InMemoryResultStore::new()));

    let response = app
        .oneshot(post(
            "/evaluate.json",
            json!({"code": "fn main() { println!(\"Hello, world!\"); }", "version": "stable", "optimize": "0"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["result"], "Hello, world!\n");
    assert_eq!(json["id"].as_str().unwrap().len(), 64);

    let request = &sandbox.requests()[0];
    assert!(request.args().contains(&"-g".to_string()));
}

#[tokio::test]
async fn test_repeated_request_is_served_from_store() {
    let sandbox = Arc::new(MockSandbox::always("42\n"));
    let store = Arc::new(InMemoryResultStore::new());
    let app = app(sandbox.clone(), store.clone());

    let first = json_body(
        app.clone()
            .oneshot(post("/evaluate.json", json!({"code": "x", "optimize": "2"})))
            .await
            .unwrap(),
    )
    .await;
    // Field order does not matter.
    let second = json_body(
        app.oneshot(post("/evaluate.json", json!({"optimize": "2", "code": "x"})))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(first, second);
    assert_eq!(sandbox.call_count(), 1);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_invalid_option_never_reaches_sandbox() {
    let sandbox = Arc::new(MockSandbox::always(""));
    let store = Arc::new(InMemoryResultStore::new());
    let app = app(sandbox.clone(), store.clone());

    let response = app
        .oneshot(post("/evaluate.json", json!({"code": "x", "optimize": "5"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({"error": "invalid value for optimize"})
    );
    assert_eq!(sandbox.call_count(), 0);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_malformed_body() {
    let app = app(Arc::new(MockSandbox::always("")), Arc::new(InMemoryResultStore::new()));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/format.json")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_compile_failure_is_not_stored() {
    let sandbox = Arc::new(MockSandbox::from_fn(|_| {
        Ok(ExecutionResult::completed(&b"error: expected expression"[..], 1))
    }));
    let store = Arc::new(InMemoryResultStore::new());
    let app = app(sandbox.clone(), store.clone());

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(post("/compile.json", json!({"code": "fn main() { ; }", "emit": "asm"})))
            .await
            .unwrap();
        let json = json_body(response).await;
        assert_eq!(json, json!({"error": "error: expected expression"}));
    }
    assert_eq!(sandbox.call_count(), 2);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_timed_out_evaluate_is_not_stored() {
    let sandbox = Arc::new(MockSandbox::from_fn(|_| {
        Ok(ExecutionResult::timed_out(&b"started\n"[..], std::time::Duration::from_secs(5)))
    }));
    let store = Arc::new(InMemoryResultStore::new());
    let app = app(sandbox.clone(), store.clone());

    for _ in 0..2 {
        let json = json_body(
            app.clone()
                .oneshot(post("/evaluate.json", json!({"code": "fn main() { loop {} }"})))
                .await
                .unwrap(),
        )
        .await;
        assert!(json["result"].as_str().unwrap().ends_with("error: execution timed out"));
        assert!(json.get("id").is_none());
    }
    assert_eq!(sandbox.call_count(), 2);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_raw_and_result_lookup() {
    let sandbox = Arc::new(MockSandbox::always(&b"\xffhi\n"[..]));
    let store = Arc::new(InMemoryResultStore::new());
    let app = app(sandbox, store);

    let created = json_body(
        app.clone()
            .oneshot(post(
                "/evaluate.json",
                json!({"code": "fn main() { println!(\"hi\"); }", "separate_output": true}),
            ))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(created["rustc"], "");
    assert_eq!(created["program"], "hi\n");
    let id = created["id"].as_str().unwrap().to_string();

    let raw = app
        .clone()
        .oneshot(get(&format!("/raw/{}", id)))
        .await
        .unwrap();
    assert_eq!(raw.status(), StatusCode::OK);
    let body = axum::body::to_bytes(raw.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"fn main() { println!(\"hi\"); }");

    let result = app
        .clone()
        .oneshot(get(&format!("/result/{}", id)))
        .await
        .unwrap();
    assert_eq!(json_body(result).await, created);

    let missing = app
        .clone()
        .oneshot(get(&format!("/raw/{}", "0".repeat(64))))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let traversal = app.oneshot(get("/raw/..%2Fetc%2Fpasswd")).await.unwrap();
    assert_eq!(traversal.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_launch_failure_is_server_error() {
    let store = Arc::new(InMemoryResultStore::new());
    let app = app(Arc::new(MockSandbox::failing("jail missing")), store.clone());

    let response = app
        .oneshot(post("/format.json", json!({"code": "fn main(){}"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_cors_preflight() {
    let app = app(Arc::new(MockSandbox::always("")), Arc::new(InMemoryResultStore::new()));

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/evaluate.json")
                .header("Origin", "https://example.com")
                .header("Access-Control-Request-Method", "POST")
                .header("Access-Control-Request-Headers", "content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
}
