//! # Armature
//!
//! Microservice scaffolding for Rust, built around a single keystone: the
//! process lifecycle coordinator.
//!
//! Every subsystem of a service (HTTP server, message consumers, database
//! pools, telemetry exporters) attaches to one global [`shutdown`]
//! coordinator. The coordinator owns the root cancellation scope, listens
//! for termination signals, and drives every registered handler through a
//! deterministic termination sequence with bounded timeouts, panic recovery
//! and well-defined exit codes.
//!
//! ## Features
//!
//! - **Graceful shutdown**: concurrent handler fan-out bounded by a
//!   configurable timeout, with panic barriers around every handler
//! - **Root cancellation scope**: one [`CancellationToken`] for the whole
//!   process, canceled before any handler runs
//! - **Exit code taxonomy**: sysexits-compatible constants forming a stable
//!   contract with supervisors, containers and orchestrators
//! - **Structured logging**: a package-global [`log`] facade whose backend
//!   can be swapped at runtime without invalidating existing loggers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use armature::shutdown;
//!
//! #[tokio::main]
//! async fn main() {
//!     // Root context, canceled when shutdown begins.
//!     let ctx = shutdown::new_context().expect("root context already created");
//!
//!     shutdown::add_handler(|_ctx, _code| async {
//!         // close pools, flush buffers...
//!         Ok(())
//!     })
//!     .expect("shutdown already started");
//!
//!     tokio::spawn(run_server(ctx));
//!
//!     // Blocks until Shutdown/Exit or SIGINT/SIGTERM/SIGQUIT,
//!     // then exits the process with the final code.
//!     shutdown::wait().await;
//! }
//! ```
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod log;
pub mod shutdown;

// Re-export core types
pub use log::{Attr, Format, Level, Logger};
pub use shutdown::{BoxError, ShutdownError, ShutdownHook, ShutdownManager};

/// Prelude module for convenient imports
///
/// ```
/// use armature::prelude::*;
/// ```
pub mod prelude {
    pub use crate::log::{self, attr, Attr, Format, Level, Logger, Options, Output};
    pub use crate::shutdown::{
        self, exit, BoxError, ShutdownError, ShutdownHook, ShutdownManager,
    };
    pub use async_trait::async_trait;
    pub use std::sync::Arc;
    pub use tokio_util::sync::CancellationToken;
}
