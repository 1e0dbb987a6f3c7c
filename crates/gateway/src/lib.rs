#![deny(unused)]
//! HTTP front end for Playpen.
//!
//! Serves the playground JSON API (`/evaluate.json`, `/compile.json`,
//! `/format.json`) on top of the shared pipeline, with completed requests
//! kept in the persistent result store and readable back by id.

pub mod response;
pub mod server;

pub use response::{ErrorResponse, HealthResponse, Route};
pub use server::{AppState, GatewayServer};
