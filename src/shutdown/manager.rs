//! The shutdown manager and its termination sequencer.

use std::any::Any;
use std::backtrace::Backtrace;
use std::future::Future;
use std::io::{self, Write};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, LazyLock, Once, OnceLock};
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::log::{attr, Logger};

use super::error::ShutdownError;
use super::exit::{EXIT_GENERAL_ERROR, EXIT_OK, EXIT_PANIC, EXIT_SHUTDOWN_ERROR, EXIT_SIGNAL_BASE};
use super::traits::{BoxError, Handler, HandlerFuture, ShutdownHook};

/// Wall time handlers get to finish once termination starts, unless
/// overridden with [`ShutdownManager::set_shutdown_timeout`].
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(60);

static LOG: LazyLock<Logger> = LazyLock::new(|| crate::log::named("shutdown"));

/// Lifecycle states, in order. The state variable only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum State {
    Init = 0,
    Running = 1,
    ShuttingDown = 2,
    Exited = 3,
}

impl State {
    fn from_u8(raw: u8) -> Option<State> {
        match raw {
            0 => Some(State::Init),
            1 => Some(State::Running),
            2 => Some(State::ShuttingDown),
            3 => Some(State::Exited),
            _ => None,
        }
    }
}

pub(crate) struct AtomicState(AtomicU8);

impl AtomicState {
    pub(crate) const fn new(state: State) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self) -> Option<State> {
        State::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub(crate) fn store(&self, state: State) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    pub(crate) fn compare_exchange(&self, from: State, to: State) -> Result<(), u8> {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
    }
}

pub(crate) type ExitFn = Box<dyn Fn(i32) + Send + Sync>;

/// The lifecycle coordinator.
///
/// A manager owns the root cancellation scope, the registry of shutdown
/// handlers and the background sequencer that turns a trigger (an API call
/// or a termination signal) into an orderly process exit. One default
/// instance serves the whole program through the free functions in
/// [`crate::shutdown`]; explicit instances exist for tests.
///
/// Registration is only valid before shutdown starts; the sequencer snapshots
/// the registry when it begins and late additions are rejected with
/// [`ShutdownError::CannotAddAfterShutdown`].
pub struct ShutdownManager {
    state: AtomicState,
    root: OnceLock<CancellationToken>,
    handlers: Mutex<Vec<Handler>>,
    code_tx: mpsc::Sender<i32>,
    code_rx: Mutex<Option<mpsc::Receiver<i32>>>,
    exit_tx: mpsc::Sender<i32>,
    exit_rx: tokio::sync::Mutex<mpsc::Receiver<i32>>,
    timeout_ms: AtomicU64,
    terminated: Once,
    exit_fn: ExitFn,
}

impl ShutdownManager {
    /// Creates a manager and starts its termination sequencer.
    ///
    /// Must be called from within a tokio runtime; the sequencer subscribes
    /// to SIGINT/SIGTERM/SIGQUIT as soon as it is spawned.
    pub fn new() -> Arc<Self> {
        Self::with_exit_fn(Box::new(|code| std::process::exit(code)))
    }

    pub(crate) fn with_exit_fn(exit_fn: ExitFn) -> Arc<Self> {
        let (code_tx, code_rx) = mpsc::channel(1);
        let (exit_tx, exit_rx) = mpsc::channel(1);
        let manager = Arc::new(Self {
            state: AtomicState::new(State::Init),
            root: OnceLock::new(),
            handlers: Mutex::new(Vec::new()),
            code_tx,
            code_rx: Mutex::new(Some(code_rx)),
            exit_tx,
            exit_rx: tokio::sync::Mutex::new(exit_rx),
            timeout_ms: AtomicU64::new(DEFAULT_SHUTDOWN_TIMEOUT.as_millis() as u64),
            terminated: Once::new(),
            exit_fn,
        });
        tokio::spawn(Arc::clone(&manager).sequence());
        manager
    }

    /// Creates the root cancellation scope for the program.
    ///
    /// The returned token is canceled when shutdown begins; derive every
    /// long-running operation from it. Fails with
    /// [`ShutdownError::ContextAlreadyInit`] if the root was already created.
    pub fn new_context(&self) -> Result<CancellationToken, ShutdownError> {
        self.store_root(CancellationToken::new())
    }

    /// Like [`new_context`](Self::new_context), but derives the root from a
    /// caller-supplied parent scope.
    pub fn with_context(
        &self,
        parent: Option<&CancellationToken>,
    ) -> Result<CancellationToken, ShutdownError> {
        if self.root.get().is_some() {
            return Err(ShutdownError::ContextAlreadyInit);
        }
        let parent = parent.ok_or(ShutdownError::ParentContextMissing)?;
        self.store_root(parent.child_token())
    }

    fn store_root(&self, token: CancellationToken) -> Result<CancellationToken, ShutdownError> {
        self.root
            .set(token.clone())
            .map_err(|_| ShutdownError::ContextAlreadyInit)?;
        Ok(token)
    }

    /// Returns the root scope, or an inert token that is never canceled if
    /// no root was created. Never fails.
    pub fn context(&self) -> CancellationToken {
        self.root.get().cloned().unwrap_or_default()
    }

    /// Registers a shutdown handler.
    ///
    /// Handlers run concurrently during termination and receive a scope that
    /// is canceled when the shutdown timeout expires, plus the exit code the
    /// shutdown was triggered with.
    pub fn add_handler<F, Fut>(&self, handler: F) -> Result<(), ShutdownError>
    where
        F: Fn(CancellationToken, i32) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.push_handler(Arc::new(move |ctx, code| -> HandlerFuture {
            Box::pin(handler(ctx, code))
        }))
    }

    /// Registers a [`ShutdownHook`] on the same registry as
    /// [`add_handler`](Self::add_handler).
    pub fn add_hook(&self, hook: Arc<dyn ShutdownHook>) -> Result<(), ShutdownError> {
        self.add_handler(move |ctx, code| {
            let hook = Arc::clone(&hook);
            async move { hook.on_shutdown(ctx, code).await }
        })
    }

    fn push_handler(&self, handler: Handler) -> Result<(), ShutdownError> {
        let mut handlers = self.handlers.lock();
        if self.state.load() != Some(State::Init) {
            return Err(ShutdownError::CannotAddAfterShutdown);
        }
        handlers.push(handler);
        Ok(())
    }

    /// Initiates termination with `code` without blocking the caller.
    ///
    /// The sequencer picks the code up in the background; if a code is
    /// already in flight the new one is dropped with a warning, never
    /// retried.
    pub fn shutdown(&self, code: i32) {
        if self.code_tx.try_send(code).is_err() {
            LOG.warn("code not sent: channel full", []);
        }
    }

    /// Blocks until the sequencer publishes the final exit code, then
    /// invokes the process exit with it.
    ///
    /// The code is delivered at most once; a second caller blocks forever,
    /// which in practice means until the process exits.
    pub async fn wait(&self) {
        let mut exit_rx = self.exit_rx.lock().await;
        if let Some(code) = exit_rx.recv().await {
            (self.exit_fn)(code);
        }
    }

    /// [`shutdown`](Self::shutdown) followed by [`wait`](Self::wait).
    pub async fn exit(&self, code: i32) {
        self.shutdown(code);
        self.wait().await;
    }

    /// Runs `fut` under a panic barrier.
    ///
    /// A panic is logged with its payload and a backtrace, and the process
    /// is terminated via [`exit`](Self::exit) with
    /// [`EXIT_PANIC`](super::exit::EXIT_PANIC). Wrap the outermost future of
    /// a task (or of `main`) to turn crashes into orderly exits.
    pub async fn recover<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send,
    {
        if let Err(payload) = AssertUnwindSafe(fut).catch_unwind().await {
            LOG.error(
                "panic",
                [
                    attr("error", panic_message(payload.as_ref())),
                    attr("stack", Backtrace::force_capture().to_string()),
                ],
            );
            self.exit(EXIT_PANIC).await;
        }
    }

    /// Overrides the handler timeout; takes effect for a subsequent
    /// shutdown.
    pub fn set_shutdown_timeout(&self, timeout: Duration) {
        self.timeout_ms
            .store(timeout.as_millis() as u64, Ordering::SeqCst);
    }

    /// Whether termination has started.
    pub fn is_shutting_down(&self) -> bool {
        matches!(
            self.state.load(),
            Some(State::ShuttingDown) | Some(State::Exited)
        )
    }

    /// The termination sequencer: one background task per manager.
    ///
    /// Awaits the first trigger (manual code or OS signal), flips the state,
    /// cancels the root scope, fans out the handlers and publishes the final
    /// exit code exactly once.
    async fn sequence(self: Arc<Self>) {
        let mut code_rx = self
            .code_rx
            .lock()
            .take()
            .expect("sequencer already started");

        let code = tokio::select! {
            received = code_rx.recv() => received.unwrap_or(EXIT_GENERAL_ERROR),
            signal = wait_for_signal() => EXIT_SIGNAL_BASE + signal,
        };

        let _ = self
            .state
            .compare_exchange(State::Init, State::ShuttingDown);

        LOG.info("shutdown", [attr("code", code)]);

        if let Some(root) = self.root.get() {
            root.cancel();
        }

        let code = if !self.run_handlers(code).await {
            EXIT_SHUTDOWN_ERROR
        } else if code > EXIT_SIGNAL_BASE {
            // Graceful termination via signal is a success for the program.
            EXIT_OK
        } else {
            code
        };

        self.terminate(code);
    }

    /// Runs the registered handlers concurrently, bounded by the shutdown
    /// timeout. Returns whether every handler finished in time without an
    /// error or panic.
    async fn run_handlers(&self, code: i32) -> bool {
        let handlers: Vec<Handler> = self.handlers.lock().clone();
        let timeout = Duration::from_millis(self.timeout_ms.load(Ordering::SeqCst));

        // Fresh scope, decoupled from the (already canceled) root, so
        // handlers get a usable context until the deadline.
        let scope = CancellationToken::new();
        let _guard = scope.clone().drop_guard();
        let success = Arc::new(AtomicBool::new(true));

        let mut tasks = Vec::with_capacity(handlers.len());
        for handler in handlers {
            let ctx = scope.child_token();
            let success = Arc::clone(&success);
            tasks.push(tokio::spawn(async move {
                let outcome = AssertUnwindSafe(async move { handler(ctx, code).await })
                    .catch_unwind()
                    .await;
                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        LOG.error("error in handler", [attr("error", err.to_string())]);
                        success.store(false, Ordering::SeqCst);
                    }
                    Err(payload) => {
                        LOG.error(
                            "panic in handler",
                            [
                                attr("error", panic_message(payload.as_ref())),
                                attr("stack", Backtrace::force_capture().to_string()),
                            ],
                        );
                        success.store(false, Ordering::SeqCst);
                    }
                }
            }));
        }

        let drained = async {
            for task in tasks {
                let _ = task.await;
            }
        };

        match tokio::time::timeout(timeout, drained).await {
            Ok(()) => {
                let ok = success.load(Ordering::SeqCst);
                if ok {
                    LOG.debug("all handlers completed without errors", []);
                } else {
                    LOG.warn("all handlers completed with errors", []);
                }
                ok
            }
            // Outstanding handler tasks are detached, not aborted; the scope
            // guard cancels their contexts on return.
            Err(_) => {
                LOG.warn("handlers timed out", []);
                false
            }
        }
    }

    fn terminate(&self, code: i32) {
        self.terminated.call_once(|| {
            self.state.store(State::Exited);
            LOG.info("exit", [attr("code", code)]);
            let _ = io::stdout().flush();
            let _ = io::stderr().flush();
            let _ = self.exit_tx.try_send(code);
        });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Resolves to the number of the first termination signal delivered to the
/// process. The signal streams are released when the future is dropped.
#[cfg(unix)]
async fn wait_for_signal() -> i32 {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt =
        signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut terminate =
        signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut quit = signal(SignalKind::quit()).expect("failed to install SIGQUIT handler");

    tokio::select! {
        _ = interrupt.recv() => SignalKind::interrupt().as_raw_value(),
        _ = terminate.recv() => SignalKind::terminate().as_raw_value(),
        _ = quit.recv() => SignalKind::quit().as_raw_value(),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> i32 {
    let _ = tokio::signal::ctrl_c().await;
    2
}
