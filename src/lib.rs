#![forbid(unsafe_code)]

//! Supervisor and session protocol engine for a stdio JSON agent.
//!
//! The agent runs as a child process speaking newline-delimited JSON over its
//! stdio pipes. [`session::Session`] is the entry point: it spawns the
//! process, decodes its output onto an event bus, and sends typed operations.

pub mod approval;
pub mod bus;
pub mod config;
pub mod errors;
pub mod protocol;
pub mod session;
pub mod step;
pub mod supervisor;
pub mod wire;

pub use config::LaunchConfig;
pub use errors::{AppError, Result};
pub use session::Session;
