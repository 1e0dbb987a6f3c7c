#![deny(unused)]
//! Isolated execution backends for Playpen.
//!
//! Every backend implements [`playpen_core::Sandbox`]; the pipeline never
//! knows which one it is talking to.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │  Pipeline (evaluate / compile / fmt)   │
//! │    ↓ ExecutionRequest                  │
//! ├────────────────────────────────────────┤
//! │  MemoizedSandbox (LRU, per process)    │
//! │    ↓ on miss                           │
//! ├────────────────────────────────────────┤
//! │  ProcessSandbox  │  DockerSandbox      │
//! │  playpen jail    │  bollard container  │
//! └────────────────────────────────────────┘
//! ```

pub mod capture;
pub mod docker;
pub mod engine;
pub mod memo;

pub use capture::Capture;
pub use docker::DockerSandbox;
pub use engine::{MockSandbox, ProcessSandbox};
pub use memo::MemoizedSandbox;
