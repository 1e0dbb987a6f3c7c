//! JSON bodies returned by the HTTP routes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Map, Value};

use playpen_core::types::{OutputBody, ProcessedOutput};

/// The three execution routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Evaluate,
    Compile,
    Format,
}

impl Route {
    /// Name mixed into the fingerprint, so identical bodies sent to
    /// different routes never share a cache entry.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Evaluate => "evaluate",
            Self::Compile => "compile",
            Self::Format => "format",
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Self::Evaluate => "/evaluate.json",
            Self::Compile => "/compile.json",
            Self::Format => "/format.json",
        }
    }
}

/// Error body: `{"error": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Shape a processed result for `route`. The flag says whether the body may
/// be kept in the persistent store; timed out runs never are.
pub fn render(route: Route, output: &ProcessedOutput) -> (Value, bool) {
    match route {
        Route::Evaluate => {
            let body = match &output.body {
                OutputBody::Text(text) => json!({ "result": text }),
                OutputBody::Split { rustc, program } => {
                    let mut body = Map::new();
                    body.insert("rustc".into(), Value::String(rustc.clone()));
                    if let Some(program) = program {
                        body.insert("program".into(), Value::String(program.clone()));
                    }
                    Value::Object(body)
                }
            };
            (body, !output.timed_out)
        }
        Route::Compile | Route::Format => {
            let key = if output.success { "result" } else { "error" };
            let mut body = Map::new();
            body.insert(key.into(), Value::String(output.text()));
            (Value::Object(body), output.success)
        }
    }
}

/// Add the store identifier to a response body.
pub fn with_id(mut body: Value, id: &str) -> Value {
    if let Value::Object(fields) = &mut body {
        fields.insert("id".into(), Value::String(id.to_string()));
    }
    body
}
