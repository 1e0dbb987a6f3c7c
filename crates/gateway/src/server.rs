//! Axum-based HTTP server for the playground front end.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use playpen_core::config::ServerConfig;
use playpen_core::traits::ResultStore;
use playpen_core::types::{CacheEntry, Fingerprint, ProcessedOutput};
use playpen_core::{Error, Result};
use playpen_pipeline::{parse_code, CompileOptions, EvaluateOptions, FormatOptions, Pipeline};
use playpen_telemetry::{track_cache, track_request, CacheLayer};

use crate::response::{error_response, render, with_id, HealthResponse, Route};

/// Shared application state.
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    /// Persistent, content-addressed results.
    pub store: Arc<dyn ResultStore>,
}

/// Gateway server.
pub struct GatewayServer {
    config: ServerConfig,
    state: Arc<AppState>,
    metrics_handle: Option<PrometheusHandle>,
}

impl GatewayServer {
    pub fn new(config: ServerConfig, pipeline: Arc<Pipeline>, store: Arc<dyn ResultStore>) -> Self {
        Self {
            config,
            state: Arc::new(AppState { pipeline, store }),
            metrics_handle: None,
        }
    }

    /// Serve `/metrics` from this handle.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    /// Build the Axum router.
    pub fn build_router(&self) -> Router {
        let mut router = Router::new()
            .route("/health", get(health_handler))
            .route("/evaluate.json", post(evaluate_handler))
            .route("/compile.json", post(compile_handler))
            .route("/format.json", post(format_handler))
            .route("/raw/:id", get(raw_handler))
            .route("/result/:id", get(result_handler))
            .with_state(self.state.clone());

        if let Some(handle) = &self.metrics_handle {
            let handle = handle.clone();
            router = router.route("/metrics", get(move || async move { handle.render() }));
        }

        router = router.layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-xss-protection"),
            HeaderValue::from_static("0"),
        ));

        if self.config.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods([Method::POST, Method::OPTIONS])
                    .allow_headers([header::ORIGIN, header::ACCEPT, header::CONTENT_TYPE]),
            );
        }

        if self.config.enable_tracing {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Run the server.
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::gateway(format!("Failed to bind {}: {}", addr, e)))?;

        tracing::info!(addr = %addr, "Gateway server starting");

        axum::serve(listener, self.build_router())
            .await
            .map_err(|e| Error::gateway(format!("Server error: {}", e)))?;

        Ok(())
    }
}

// =============================================================================
// Jobs
// =============================================================================

/// A validated request for one of the execution routes.
enum Job {
    Evaluate(EvaluateOptions),
    Compile(CompileOptions),
    Format(FormatOptions),
}

impl Job {
    fn parse(route: Route, fields: &Map<String, Value>) -> Result<Self> {
        Ok(match route {
            Route::Evaluate => Self::Evaluate(EvaluateOptions::from_fields(fields)?),
            Route::Compile => Self::Compile(CompileOptions::from_fields(fields)?),
            Route::Format => Self::Format(FormatOptions::from_fields(fields)?),
        })
    }

    async fn run(&self, pipeline: &Pipeline, code: &str) -> Result<ProcessedOutput> {
        match self {
            Self::Evaluate(options) => pipeline.evaluate(options, code).await,
            Self::Compile(options) => pipeline.compile(options, code).await,
            Self::Format(options) => pipeline.format(options, code).await,
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn evaluate_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    timed(Route::Evaluate, execute(&state, Route::Evaluate, &body)).await
}

async fn compile_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    timed(Route::Compile, execute(&state, Route::Compile, &body)).await
}

async fn format_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    timed(Route::Format, execute(&state, Route::Format, &body)).await
}

async fn timed(route: Route, handler: impl std::future::Future<Output = Response>) -> Response {
    let started = Instant::now();
    let response = handler.await;
    track_request(
        "POST",
        route.path(),
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );
    response
}

/// Validate, consult the store, run on a miss and remember the result.
async fn execute(state: &AppState, route: Route, body: &[u8]) -> Response {
    let trace_id = Uuid::new_v4().to_string();

    let fields = match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(fields)) => fields,
        _ => return error_response(StatusCode::BAD_REQUEST, "invalid request body"),
    };
    let (job, code) = match Job::parse(route, &fields).and_then(|job| Ok((job, parse_code(&fields)?))) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::debug!(trace_id = %trace_id, route = route.name(), error = %e, "Rejected request");
            return error_response(StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    let id = Fingerprint::of_fields(&fields, route.name());
    match state.store.load(&id).await {
        Ok(Some(entry)) => {
            tracing::info!(trace_id = %trace_id, id = %id, "Store hit");
            track_cache(CacheLayer::Store, true);
            return (StatusCode::OK, Json(with_id(entry.output, id.as_str()))).into_response();
        }
        Ok(None) => track_cache(CacheLayer::Store, false),
        Err(e) => {
            tracing::warn!(trace_id = %trace_id, id = %id, error = %e, "Store lookup failed");
            track_cache(CacheLayer::Store, false);
        }
    }

    tracing::info!(
        trace_id = %trace_id,
        route = route.name(),
        code_len = code.len(),
        "Executing request"
    );

    let output = match job.run(&state.pipeline, code).await {
        Ok(output) => output,
        Err(e) if e.is_validation() => {
            return error_response(StatusCode::BAD_REQUEST, e.to_string());
        }
        Err(e) => {
            tracing::error!(trace_id = %trace_id, route = route.name(), error = %e, "Execution failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to run the sandbox");
        }
    };

    let (response, cacheable) = render(route, &output);
    if !cacheable {
        return (StatusCode::OK, Json(response)).into_response();
    }

    let entry = CacheEntry::new(code, response.clone());
    if let Err(e) = state.store.save(&id, &entry).await {
        tracing::warn!(trace_id = %trace_id, id = %id, error = %e, "Failed to persist result");
        return (StatusCode::OK, Json(response)).into_response();
    }
    (StatusCode::OK, Json(with_id(response, id.as_str()))).into_response()
}

/// `GET /raw/:id`: the stored source as plain text.
async fn raw_handler(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    let id = match Fingerprint::parse(&id) {
        Ok(id) => id,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    match state.store.load_source(&id).await {
        Ok(Some(source)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            source,
        )
            .into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "not found"),
        Err(e) => {
            tracing::error!(id = %id, error = %e, "Failed to read stored source");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to read stored source")
        }
    }
}

/// `GET /result/:id`: the stored response body.
async fn result_handler(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    let id = match Fingerprint::parse(&id) {
        Ok(id) => id,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    match state.store.load(&id).await {
        Ok(Some(entry)) => (StatusCode::OK, Json(with_id(entry.output, id.as_str()))).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "not found"),
        Err(e) => {
            tracing::error!(id = %id, error = %e, "Failed to read stored result");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to read stored result")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
