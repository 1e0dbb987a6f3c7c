//! Capability traits for Playpen.
//!
//! Every external collaborator sits behind one of these:
//! - `sandbox`: the isolation backend (Sandbox)
//! - `paste`: the link-shortening / gist service (PasteService)
//! - `chat`: the chat network connection (ChatTransport)
//! - `store`: the persistent result store (ResultStore)

pub mod chat;
pub mod paste;
pub mod sandbox;
pub mod store;

pub use chat::*;
pub use paste::*;
pub use sandbox::*;
pub use store::*;
