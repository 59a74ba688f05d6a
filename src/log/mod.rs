//! Global structured logging facade.
//!
//! All loggers created through this module share one runtime-mutable
//! configuration: a current backend behind an atomic pointer and a level
//! threshold shared by every logger. Swapping the backend with
//! [`configure`] or [`set_backend`] takes effect immediately for all
//! previously created loggers, because a [`Logger`] resolves the backend at
//! emission time rather than capturing it.
//!
//! # Example
//!
//! ```rust,ignore
//! use armature::log::{self, attr, Format, Options, Output};
//!
//! log::configure(Options {
//!     output: Output::Stdout,
//!     format: Format::Json,
//!     replace_attr: None,
//! });
//!
//! let logger = log::named("users");
//! logger.info("user created", [attr("id", 42)]);
//! ```
//!
//! Prefer [`named`] (or [`with_attrs`]/[`with_group`]) over constructing
//! loggers by hand, so records keep flowing through the swappable backend.

mod backend;
mod logger;

pub use backend::{
    Backend, Format, JsonBackend, Options, Output, PrettyBackend, ReplaceAttr, TextBackend,
    MESSAGE_KEY,
};
pub use logger::{attr, Attr, Level, Logger, Record};

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, LazyLock};

use arc_swap::ArcSwap;
use thiserror::Error;

/// Threshold applied when the process starts.
pub const DEFAULT_LEVEL: Level = Level::Info;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogError {
    #[error("unknown log level: {0}")]
    UnknownLevel(String),
}

static LEVEL: AtomicU8 = AtomicU8::new(DEFAULT_LEVEL as u8);

static BACKEND: LazyLock<ArcSwap<Box<dyn Backend>>> =
    LazyLock::new(|| ArcSwap::from_pointee(default_backend()));

fn default_backend() -> Box<dyn Backend> {
    Box::new(PrettyBackend::new(Output::Stdout, None))
}

pub(crate) fn backend() -> Arc<Box<dyn Backend>> {
    BACKEND.load_full()
}

/// Resets the facade to its default configuration: pretty output on stdout
/// and the [`DEFAULT_LEVEL`] threshold. Typically used at startup or in
/// tests.
pub fn reset_default_state() {
    LEVEL.store(DEFAULT_LEVEL as u8, Ordering::SeqCst);
    BACKEND.store(Arc::new(default_backend()));
}

/// Replaces the current backend. Usually [`configure`] is sufficient.
pub fn set_backend(backend: Box<dyn Backend>) {
    BACKEND.store(Arc::new(backend));
}

/// Builds the backend described by `options` and installs it globally.
///
/// All loggers created via [`named`], [`with_attrs`] or [`with_group`]
/// immediately start using the new configuration.
pub fn configure(options: Options) {
    let backend: Box<dyn Backend> = match options.format {
        Format::Text => Box::new(TextBackend::new(options.output, options.replace_attr)),
        Format::Json => Box::new(JsonBackend::new(options.output, options.replace_attr)),
        Format::Pretty => Box::new(PrettyBackend::new(options.output, options.replace_attr)),
    };
    set_backend(backend);
}

/// Sets the global level threshold.
pub fn set_level(level: Level) {
    LEVEL.store(level as u8, Ordering::SeqCst);
}

/// Sets the global level threshold from a string, e.g. `"info"`.
pub fn set_level_str(level: &str) -> Result<(), LogError> {
    set_level(level.parse()?);
    Ok(())
}

/// Current global level threshold.
pub fn level() -> Level {
    Level::from_u8(LEVEL.load(Ordering::SeqCst))
}

/// Whether records at `level` currently pass the threshold.
pub fn enabled(level: Level) -> bool {
    level >= self::level()
}

/// Creates a logger scoped to a package or component; the `pkg` attribute
/// is attached to every record it emits.
pub fn named(pkg: impl Into<String>) -> Logger {
    Logger::default().with_attrs([attr("pkg", pkg.into())])
}

/// Creates a logger with additional context attributes.
pub fn with_attrs<I: IntoIterator<Item = Attr>>(attrs: I) -> Logger {
    Logger::default().with_attrs(attrs)
}

/// Creates a logger with a group for subsequent attributes.
pub fn with_group(name: impl Into<String>) -> Logger {
    Logger::default().with_group(name)
}

/// Emits a record at `level` through the root logger.
pub fn log<I: IntoIterator<Item = Attr>>(level: Level, message: impl Into<String>, attrs: I) {
    Logger::default().log(level, message, attrs);
}

pub fn debug<I: IntoIterator<Item = Attr>>(message: impl Into<String>, attrs: I) {
    log(Level::Debug, message, attrs);
}

pub fn info<I: IntoIterator<Item = Attr>>(message: impl Into<String>, attrs: I) {
    log(Level::Info, message, attrs);
}

pub fn warn<I: IntoIterator<Item = Attr>>(message: impl Into<String>, attrs: I) {
    log(Level::Warn, message, attrs);
}

pub fn error<I: IntoIterator<Item = Attr>>(message: impl Into<String>, attrs: I) {
    log(Level::Error, message, attrs);
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct CapturingBackend {
        records: Arc<Mutex<Vec<Record>>>,
    }

    impl Backend for CapturingBackend {
        fn append(&self, record: &Record) -> std::io::Result<()> {
            self.records.lock().push(record.clone());
            Ok(())
        }
    }

    // Global backend and level state is exercised by this single test so
    // parallel tests never observe each other's configuration.
    #[test]
    fn global_facade_roundtrip() {
        let records = Arc::new(Mutex::new(Vec::new()));
        set_backend(Box::new(CapturingBackend {
            records: records.clone(),
        }));

        let logger = named("users").with_group("session");
        logger.info("facade-roundtrip-marker", [attr("id", 7)]);

        // Existing loggers observe a threshold change immediately.
        set_level(Level::Warn);
        assert_eq!(level(), Level::Warn);
        assert!(!enabled(Level::Info));
        logger.info("suppressed-marker", []);
        logger.warn("passed-marker", []);

        set_level(DEFAULT_LEVEL);
        set_level_str("debug").unwrap();
        assert_eq!(level(), Level::Debug);
        assert!(set_level_str("chatty").is_err());

        reset_default_state();
        assert_eq!(level(), DEFAULT_LEVEL);
        // After the reset the capturing backend is gone; this record goes to
        // the default backend and must not show up below.
        logger.info("after-reset-marker", []);

        let captured = records.lock();
        let marker = captured
            .iter()
            .find(|r| r.message == "facade-roundtrip-marker")
            .expect("marker record not captured");
        assert_eq!(marker.level, Level::Info);
        assert_eq!(marker.groups, vec!["session".to_string()]);
        assert_eq!(marker.attrs[0], attr("pkg", "users"));
        assert_eq!(marker.attrs[1], attr("id", 7));

        assert!(captured.iter().all(|r| r.message != "suppressed-marker"));
        assert!(captured.iter().any(|r| r.message == "passed-marker"));
        assert!(captured.iter().all(|r| r.message != "after-reset-marker"));
    }
}
