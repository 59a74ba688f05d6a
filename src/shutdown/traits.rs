//! Shutdown handler contracts
//!
//! A handler is invoked exactly once during termination, concurrently with
//! every other handler. It receives a cancellation scope that is canceled
//! when the shutdown timeout expires, and the preliminary exit code that
//! triggered termination.
//!
//! Handlers must tolerate running next to each other, honor cancellation,
//! and must not call back into manager operations that require the manager
//! to still be running (such as registering more handlers).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Error type handlers may return; any error is logged and counted as a
/// failed shutdown, nothing more is done with it.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub(crate) type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send>>;

/// A registered shutdown callback in type-erased form.
pub(crate) type Handler = Arc<dyn Fn(CancellationToken, i32) -> HandlerFuture + Send + Sync>;

/// Trait form of a shutdown handler, for subsystems that prefer to hang
/// their cleanup off a struct instead of a closure.
///
/// # Example
///
/// ```rust,ignore
/// use armature::shutdown::{BoxError, ShutdownHook};
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
///
/// struct KafkaConsumer { /* ... */ }
///
/// #[async_trait]
/// impl ShutdownHook for KafkaConsumer {
///     async fn on_shutdown(&self, _ctx: CancellationToken, _code: i32) -> Result<(), BoxError> {
///         // commit offsets, leave the group...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait ShutdownHook: Send + Sync {
    /// Called once when the application is shutting down.
    async fn on_shutdown(&self, ctx: CancellationToken, code: i32) -> Result<(), BoxError>;
}
