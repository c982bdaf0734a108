//! agentpm-core library.
//!
//! One XML document holds an epic with phases, tasks, tests and an event
//! log. This crate owns the in-memory model, the lifecycle rules, and the
//! engine that moves entities through them; the CLI crate is a thin shell
//! around it.
//!
//! # Conventions
//!
//! - **Errors**: one `thiserror` enum per module, each mapping to a stable
//!   [`error::ErrorCode`].
//! - **Logging**: `tracing` macros, only at the I/O boundary (`store`,
//!   `config`). The engine, batch validator, and router never log.
//! - **Time**: callers pass timestamps in; nothing here reads the clock.

pub mod batch;
pub mod check;
pub mod config;
pub mod engine;
pub mod error;
pub mod hints;
pub mod lifecycle;
pub mod model;
pub mod query;
pub mod router;
pub mod store;
