//! Shutdown-specific error types

use thiserror::Error;

/// API-misuse errors returned by the shutdown manager.
///
/// Handler failures are deliberately not represented here: any error or
/// panic inside a handler is logged and folded into the final exit code
/// instead of being surfaced to a caller.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownError {
    /// The root context has already been created.
    #[error("shutdown context already initialized")]
    ContextAlreadyInit,

    /// No parent scope was supplied to derive the root context from.
    #[error("parent context is missing")]
    ParentContextMissing,

    /// Handler registration was attempted after shutdown started.
    #[error("cannot add handler after shutdown started")]
    CannotAddAfterShutdown,

    /// The default manager was already initialized when a replacement was
    /// offered.
    #[error("manager already running")]
    ManagerAlreadyRunning,

    /// A restricted operation was attempted after shutdown started or
    /// completed.
    #[error("cannot call after shutdown started")]
    CannotCallAfterShutdown,

    /// The state variable held a value outside the known lifecycle states.
    #[error("failed due to unknown state")]
    UnknownState,
}
