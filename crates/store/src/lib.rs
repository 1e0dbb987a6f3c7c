#![deny(unused)]
//! Persistent result store for Playpen.
//!
//! Completed HTTP requests are kept forever under their fingerprint so that
//! a repeated request, or a shared link to `/raw/:id`, never touches the
//! sandbox again.

pub mod file;
pub mod memory;

pub use file::FileResultStore;
pub use memory::InMemoryResultStore;
