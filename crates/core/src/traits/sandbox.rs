//! Isolation backend trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ExecutionRequest, ExecutionResult};

/// Runs one request inside an isolated environment.
///
/// A non-zero exit or a timeout is an `Ok` result; `Err` is reserved for the
/// backend itself failing to launch. Implementations never retry.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Execute the request and collect its combined output.
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult>;
}
