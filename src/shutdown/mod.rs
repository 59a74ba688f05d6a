//! Global shutdown coordination
//!
//! This module provides a process-wide shutdown manager: centralized
//! handling of application termination, root-context cancellation and
//! execution of user-defined shutdown handlers.
//!
//! # Lifecycle
//!
//! ```text
//! Init
//!   │  set_default_manager() / first use of the default manager
//!   ▼
//! Running
//!   │  shutdown()/exit() or SIGINT/SIGTERM/SIGQUIT
//!   ▼
//! ShuttingDown   root context canceled, handlers fan out under a timeout
//!   │  sequencer finishes
//!   ▼
//! Exited         final exit code published, process exits
//! ```
//!
//! The state only moves forward. Handlers can be registered until shutdown
//! starts; afterwards [`add_handler`] fails with
//! [`ShutdownError::CannotAddAfterShutdown`]. The final exit code follows
//! the [`exit`](mod@crate::shutdown::exit) taxonomy: a failing, panicking or
//! timed-out handler forces [`EXIT_SHUTDOWN_ERROR`](exit::EXIT_SHUTDOWN_ERROR),
//! and a clean signal-triggered shutdown reports
//! [`EXIT_OK`](exit::EXIT_OK).
//!
//! # Example
//!
//! ```rust,ignore
//! use armature::shutdown;
//!
//! #[tokio::main]
//! async fn main() {
//!     let ctx = shutdown::new_context().expect("root context already created");
//!
//!     shutdown::add_handler(|_ctx, _code| async {
//!         // close connections, flush buffers...
//!         Ok(())
//!     })
//!     .expect("shutdown already started");
//!
//!     tokio::spawn(worker(ctx));
//!
//!     shutdown::wait().await;
//! }
//! ```
//!
//! The free functions here operate on a lazily created default manager.
//! Tests can substitute their own instance with [`set_default_manager`]
//! before the default is first touched.

pub mod exit;

mod error;
mod manager;
mod traits;

pub use error::ShutdownError;
pub use manager::{ShutdownManager, DEFAULT_SHUTDOWN_TIMEOUT};
pub use traits::{BoxError, ShutdownHook};

use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use manager::{AtomicState, State};

static DEFAULT: OnceLock<Arc<ShutdownManager>> = OnceLock::new();
static DEFAULT_STATE: AtomicState = AtomicState::new(State::Init);

/// Replaces the global default shutdown manager.
///
/// Intended for tests and special scenarios; must be called before anything
/// touches the default manager. Once the default is initialized (or
/// shutdown has started) the call fails with the matching
/// [`ShutdownError`].
pub fn set_default_manager(manager: Arc<ShutdownManager>) -> Result<(), ShutdownError> {
    if DEFAULT_STATE
        .compare_exchange(State::Init, State::Running)
        .is_err()
    {
        return Err(match DEFAULT_STATE.load() {
            Some(State::Running) => ShutdownError::ManagerAlreadyRunning,
            Some(State::ShuttingDown) | Some(State::Exited) => {
                ShutdownError::CannotCallAfterShutdown
            }
            _ => ShutdownError::UnknownState,
        });
    }
    DEFAULT
        .set(manager)
        .map_err(|_| ShutdownError::ManagerAlreadyRunning)
}

fn default_manager() -> &'static Arc<ShutdownManager> {
    DEFAULT.get_or_init(|| {
        DEFAULT_STATE.store(State::Running);
        ShutdownManager::new()
    })
}

/// Creates the root, shutdown-aware cancellation scope for the program.
///
/// The returned token is the base every long-running operation should
/// derive from; it is canceled automatically when shutdown begins, whether
/// triggered by [`shutdown`]/[`exit()`](exit()) or by a termination signal.
pub fn new_context() -> Result<CancellationToken, ShutdownError> {
    default_manager().new_context()
}

/// Like [`new_context`], deriving the root from a caller-supplied parent.
pub fn with_context(parent: Option<&CancellationToken>) -> Result<CancellationToken, ShutdownError> {
    default_manager().with_context(parent)
}

/// Returns the root shutdown-aware scope, or an inert token if none was
/// created. Never fails; the token is canceled once shutdown begins.
pub fn context() -> CancellationToken {
    default_manager().context()
}

/// Registers a shutdown handler on the default manager.
///
/// The handler runs once during termination, concurrently with every other
/// handler, and receives the root-decoupled shutdown scope plus the exit
/// code.
pub fn add_handler<F, Fut>(handler: F) -> Result<(), ShutdownError>
where
    F: Fn(CancellationToken, i32) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    default_manager().add_handler(handler)
}

/// Registers a [`ShutdownHook`] on the default manager.
pub fn add_hook(hook: Arc<dyn ShutdownHook>) -> Result<(), ShutdownError> {
    default_manager().add_hook(hook)
}

/// Blocks until shutdown completes, then exits the process with the final
/// code. The usual last statement of `main`.
pub async fn wait() {
    default_manager().wait().await;
}

/// Initiates shutdown with `code` and returns immediately; handlers run in
/// the background. Use [`exit()`](exit()) to also wait for completion.
pub fn shutdown(code: i32) {
    default_manager().shutdown(code);
}

/// Initiates shutdown with `code` and blocks until the process exits.
pub async fn exit(code: i32) {
    default_manager().exit(code).await;
}

/// Runs `fut` under a panic barrier on the default manager; a panic is
/// logged and converted into an orderly exit with
/// [`EXIT_PANIC`](exit::EXIT_PANIC).
pub async fn recover<F>(fut: F)
where
    F: Future<Output = ()> + Send,
{
    default_manager().recover(fut).await;
}

/// Overrides the handler timeout of the default manager; applies to a
/// subsequent shutdown.
pub fn set_shutdown_timeout(timeout: Duration) {
    default_manager().set_shutdown_timeout(timeout);
}

/// Whether the default manager has started terminating.
pub fn is_shutting_down() -> bool {
    default_manager().is_shutting_down()
}
