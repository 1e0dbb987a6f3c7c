#![deny(unused)]
//! Core types, traits, and error definitions for Playpen.
//!
//! This crate provides the building blocks shared by the sandbox, the
//! output pipeline and both front ends (HTTP gateway and chat bot).

pub mod config;
pub mod error;
pub mod mocks;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::*;
pub use types::*;
