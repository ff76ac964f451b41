//! # Controller
//!
//! Core reconciliation modules.
//!
//! - `backoff`: Fibonacci backoff and transient-failure retries
//! - `dispatcher`: turns secret watch events into orchestrator calls
//! - `orchestrator`: idempotent create and two-phase cascade delete
//! - `server`: HTTP server for metrics and health checks

pub mod backoff;
pub mod dispatcher;
pub mod orchestrator;
pub mod server;
