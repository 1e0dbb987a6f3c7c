#![deny(unused)]
//! The shared execution pipeline.
//!
//! Turns user code into an [`ExecutionRequest`](playpen_core::ExecutionRequest),
//! runs it through whatever [`Sandbox`](playpen_core::Sandbox) it was given and
//! shapes the raw output for the caller: lines for chat, JSON bodies for HTTP.

pub mod options;
pub mod output;
pub mod paste;
pub mod pipeline;
pub mod template;

pub use options::{parse_code, CompileOptions, EvaluateOptions, FormatOptions, Surface};
pub use paste::{publish_or_apologize, ChannelPaste, GistPaste, ShortenerPaste, PASTE_FAILED};
pub use pipeline::{Pipeline, UNKNOWN_VERSION};
pub use template::{RenderMode, TemplateRenderer, DEFAULT_TEMPLATE};
