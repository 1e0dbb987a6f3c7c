//! Core type definitions for Playpen.
//!
//! Broken down into submodules: execution options, the validated request,
//! raw and processed results, and persistent cache keys.

pub mod cache;
pub mod channel;
pub mod request;
pub mod result;

pub use cache::*;
pub use channel::*;
pub use request::*;
pub use result::*;
