//! # Runtime
//!
//! Startup wiring and the secret watch that drives the dispatcher.
//!
//! - `initialization`: builds the component graph from configuration
//! - `watch_loop`: feeds watch events to the dispatcher, reconnecting on failure

pub mod initialization;
pub mod watch_loop;

pub use initialization::{initialize, InitializationResult};
pub use watch_loop::run_watch_loop;
