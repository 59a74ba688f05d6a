//! Logger nodes and the record model.
//!
//! A [`Logger`] is a lightweight proxy: it carries an immutable set of
//! attributes and a group path, and resolves the current backend from the
//! package-global pointer once per emitted record. Deriving a logger with
//! [`Logger::with_attrs`] or [`Logger::with_group`] never mutates the
//! original, so loggers can be shared freely across tasks.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde_json::Value;

use super::LogError;

/// Log severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl Level {
    /// Upper-case name, as rendered by the text and JSON backends.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }

    pub(crate) fn from_u8(raw: u8) -> Level {
        match raw {
            0 => Level::Debug,
            1 => Level::Info,
            2 => Level::Warn,
            _ => Level::Error,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            _ => Err(LogError::UnknownLevel(s.to_string())),
        }
    }
}

/// A single structured attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    pub key: String,
    pub value: Value,
}

/// Shorthand constructor for an [`Attr`].
///
/// ```
/// use armature::log::attr;
///
/// let a = attr("code", 0);
/// assert_eq!(a.key, "code");
/// ```
pub fn attr(key: impl Into<String>, value: impl Into<Value>) -> Attr {
    Attr {
        key: key.into(),
        value: value.into(),
    }
}

/// One log event as handed to a backend.
///
/// `attrs` is the flat attribute list (logger attributes first, then
/// per-call attributes); `groups` is the group path the backend nests the
/// attributes under, outermost first.
#[derive(Debug, Clone)]
pub struct Record {
    pub time: DateTime<Local>,
    pub level: Level,
    pub message: String,
    pub attrs: Vec<Attr>,
    pub groups: Vec<String>,
}

/// A named or derived logger.
///
/// All loggers share the package-global backend and level threshold; see the
/// [module docs](crate::log) for the facade functions that create them.
#[derive(Debug, Clone, Default)]
pub struct Logger {
    attrs: Vec<Attr>,
    groups: Vec<String>,
}

impl Logger {
    /// Returns a new logger carrying `attrs` in addition to this logger's
    /// attributes. `self` is left untouched.
    pub fn with_attrs<I>(&self, attrs: I) -> Logger
    where
        I: IntoIterator<Item = Attr>,
    {
        let mut derived = self.clone();
        derived.attrs.extend(attrs);
        derived
    }

    /// Returns a new logger whose subsequent attributes are nested one group
    /// deeper. Groups nest in insertion order.
    pub fn with_group(&self, name: impl Into<String>) -> Logger {
        let mut derived = self.clone();
        derived.groups.push(name.into());
        derived
    }

    /// Whether a record at `level` would currently be emitted.
    pub fn enabled(&self, level: Level) -> bool {
        super::enabled(level)
    }

    /// Emit a record at `level` with this logger's attributes plus `attrs`.
    pub fn log<I>(&self, level: Level, message: impl Into<String>, attrs: I)
    where
        I: IntoIterator<Item = Attr>,
    {
        if !super::enabled(level) {
            return;
        }
        let record = self.build_record(level, message.into(), attrs);
        let _ = super::backend().append(&record);
    }

    pub fn debug<I: IntoIterator<Item = Attr>>(&self, message: impl Into<String>, attrs: I) {
        self.log(Level::Debug, message, attrs);
    }

    pub fn info<I: IntoIterator<Item = Attr>>(&self, message: impl Into<String>, attrs: I) {
        self.log(Level::Info, message, attrs);
    }

    pub fn warn<I: IntoIterator<Item = Attr>>(&self, message: impl Into<String>, attrs: I) {
        self.log(Level::Warn, message, attrs);
    }

    pub fn error<I: IntoIterator<Item = Attr>>(&self, message: impl Into<String>, attrs: I) {
        self.log(Level::Error, message, attrs);
    }

    fn build_record<I>(&self, level: Level, message: String, attrs: I) -> Record
    where
        I: IntoIterator<Item = Attr>,
    {
        let mut all = self.attrs.clone();
        all.extend(attrs);
        Record {
            time: Local::now(),
            level,
            message,
            attrs: all,
            groups: self.groups.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_ordering() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
    }

    #[test]
    fn level_parse() {
        assert_eq!("info".parse::<Level>().unwrap(), Level::Info);
        assert_eq!("ERROR".parse::<Level>().unwrap(), Level::Error);
        assert_eq!("Warn".parse::<Level>().unwrap(), Level::Warn);

        let err = "verbose".parse::<Level>().unwrap_err();
        assert_eq!(err, LogError::UnknownLevel("verbose".to_string()));
    }

    #[test]
    fn with_attrs_does_not_mutate_original() {
        let base = Logger::default().with_attrs([attr("pkg", "db")]);
        let derived = base.with_attrs([attr("shard", 3)]);

        let base_record = base.build_record(Level::Info, "q".into(), []);
        let derived_record = derived.build_record(Level::Info, "q".into(), []);

        assert_eq!(base_record.attrs, vec![attr("pkg", "db")]);
        assert_eq!(
            derived_record.attrs,
            vec![attr("pkg", "db"), attr("shard", 3)]
        );
    }

    #[test]
    fn groups_accumulate_in_insertion_order() {
        let logger = Logger::default().with_group("server").with_group("tls");
        let record = logger.build_record(Level::Info, "handshake".into(), []);
        assert_eq!(record.groups, vec!["server".to_string(), "tls".to_string()]);
    }

    #[test]
    fn call_attrs_follow_logger_attrs() {
        let logger = Logger::default().with_attrs([attr("pkg", "kafka")]);
        let record = logger.build_record(Level::Warn, "lag".into(), [attr("partition", 7)]);
        assert_eq!(
            record.attrs,
            vec![attr("pkg", "kafka"), attr("partition", 7)]
        );
    }
}
