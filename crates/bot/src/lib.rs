#![deny(unused)]
//! Chat front end for Playpen.
//!
//! Messages are matched against an ordered trigger table; the captured code
//! runs through the shared pipeline and every non-empty output line goes
//! back as a notice.

pub mod bot;
pub mod console;
pub mod trigger;

pub use bot::{ChatBot, Incoming};
pub use console::{run_console, ConsoleTransport};
pub use trigger::{Trigger, TriggerMatch, TriggerRouter};
