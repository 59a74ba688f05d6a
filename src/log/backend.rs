//! Output backends.
//!
//! A backend turns a [`Record`] into bytes on a sink. Three formats are
//! provided: logfmt-style text, JSON (one object per line) and a colored
//! pretty format for terminals. Every backend serializes the whole record
//! into a buffer first and performs a single locked write, so concurrent
//! emission never interleaves lines.

use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

use colored::Colorize;
use parking_lot::Mutex;
use serde_json::{Map, Value};

use super::{Attr, Level, Record};

/// Record key the message is exposed under to [`ReplaceAttr`] hooks and in
/// the text/JSON formats.
pub const MESSAGE_KEY: &str = "msg";

/// Output format selector for [`configure`](super::configure).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Plain text logs, human-readable, suitable for local or file output.
    Text,
    /// Structured JSON logs, recommended for production and log aggregation.
    Json,
    /// Colorized, developer-friendly logs; color is automatically disabled
    /// if the sink is not a terminal.
    Pretty,
}

/// Where a backend writes.
pub enum Output {
    Stdout,
    Stderr,
    /// A caller-supplied sink. Never considered a terminal.
    Writer(Box<dyn Write + Send>),
}

impl Output {
    fn is_terminal(&self) -> bool {
        match self {
            Output::Stdout => io::stdout().is_terminal(),
            Output::Stderr => io::stderr().is_terminal(),
            Output::Writer(_) => false,
        }
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Stdout => io::stdout().write(buf),
            Output::Stderr => io::stderr().write(buf),
            Output::Writer(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout => io::stdout().flush(),
            Output::Stderr => io::stderr().flush(),
            Output::Writer(w) => w.flush(),
        }
    }
}

/// Attribute rewrite hook.
///
/// Called with the record's group path and each attribute (plus the message
/// under [`MESSAGE_KEY`] with an empty path) before output. Returning `None`
/// drops the attribute. Used to mask sensitive data or rename fields.
pub type ReplaceAttr = Arc<dyn Fn(&[String], Attr) -> Option<Attr> + Send + Sync>;

/// Configuration for [`configure`](super::configure).
pub struct Options {
    pub output: Output,
    pub format: Format,
    pub replace_attr: Option<ReplaceAttr>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            output: Output::Stdout,
            format: Format::Pretty,
            replace_attr: None,
        }
    }
}

/// A log record sink. Implementations must be safe to call from any task.
pub trait Backend: Send + Sync {
    fn append(&self, record: &Record) -> io::Result<()>;
}

fn rewrite(replace: &Option<ReplaceAttr>, groups: &[String], attr: Attr) -> Option<Attr> {
    match replace {
        Some(f) => f(groups, attr),
        None => Some(attr),
    }
}

fn rewrite_message(replace: &Option<ReplaceAttr>, message: &str) -> String {
    let Some(f) = replace else {
        return message.to_string();
    };
    let attr = Attr {
        key: MESSAGE_KEY.to_string(),
        value: Value::String(message.to_string()),
    };
    match f(&[], attr) {
        Some(a) => plain(&a.value),
        None => String::new(),
    }
}

/// String rendering without JSON quoting for string values.
fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn needs_quoting(s: &str) -> bool {
    s.is_empty() || s.chars().any(|c| c.is_whitespace() || c == '"' || c == '=')
}

fn logfmt_value(value: &Value) -> String {
    match value {
        Value::String(s) if needs_quoting(s) => format!("{s:?}"),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// logfmt-style lines: `time=… level=… msg=… group.key=value`.
pub struct TextBackend {
    sink: Mutex<Output>,
    replace_attr: Option<ReplaceAttr>,
}

impl TextBackend {
    pub fn new(output: Output, replace_attr: Option<ReplaceAttr>) -> Self {
        Self {
            sink: Mutex::new(output),
            replace_attr,
        }
    }
}

impl Backend for TextBackend {
    fn append(&self, record: &Record) -> io::Result<()> {
        let mut line = format!(
            "time={} level={} {MESSAGE_KEY}={}",
            record.time.to_rfc3339_opts(chrono::SecondsFormat::Millis, false),
            record.level,
            logfmt_value(&Value::String(rewrite_message(
                &self.replace_attr,
                &record.message
            ))),
        );
        let prefix = record.groups.join(".");
        for attr in &record.attrs {
            let Some(attr) = rewrite(&self.replace_attr, &record.groups, attr.clone()) else {
                continue;
            };
            line.push(' ');
            if !prefix.is_empty() {
                line.push_str(&prefix);
                line.push('.');
            }
            line.push_str(&attr.key);
            line.push('=');
            line.push_str(&logfmt_value(&attr.value));
        }
        line.push('\n');
        self.sink.lock().write_all(line.as_bytes())
    }
}

/// One JSON object per line; attributes nested under their group objects.
pub struct JsonBackend {
    sink: Mutex<Output>,
    replace_attr: Option<ReplaceAttr>,
}

impl JsonBackend {
    pub fn new(output: Output, replace_attr: Option<ReplaceAttr>) -> Self {
        Self {
            sink: Mutex::new(output),
            replace_attr,
        }
    }
}

impl Backend for JsonBackend {
    fn append(&self, record: &Record) -> io::Result<()> {
        let mut root = Map::new();
        root.insert(
            "time".to_string(),
            Value::String(
                record
                    .time
                    .to_rfc3339_opts(chrono::SecondsFormat::Millis, false),
            ),
        );
        root.insert(
            "level".to_string(),
            Value::String(record.level.to_string()),
        );
        root.insert(
            MESSAGE_KEY.to_string(),
            Value::String(rewrite_message(&self.replace_attr, &record.message)),
        );

        let mut attrs = Map::new();
        for attr in &record.attrs {
            if let Some(attr) = rewrite(&self.replace_attr, &record.groups, attr.clone()) {
                attrs.insert(attr.key, attr.value);
            }
        }
        // Wrap in groups from the innermost out, then merge at the top.
        for group in record.groups.iter().rev() {
            let mut wrapper = Map::new();
            wrapper.insert(group.clone(), Value::Object(attrs));
            attrs = wrapper;
        }
        root.extend(attrs);

        let mut line = Value::Object(root).to_string();
        line.push('\n');
        self.sink.lock().write_all(line.as_bytes())
    }
}

/// Colored, developer-facing format.
pub struct PrettyBackend {
    sink: Mutex<Output>,
    replace_attr: Option<ReplaceAttr>,
    color: bool,
}

impl PrettyBackend {
    pub fn new(output: Output, replace_attr: Option<ReplaceAttr>) -> Self {
        let color = output.is_terminal();
        Self {
            sink: Mutex::new(output),
            replace_attr,
            color,
        }
    }

    fn paint_level(&self, level: Level) -> String {
        if !self.color {
            return level.as_str().to_string();
        }
        match level {
            Level::Debug => level.as_str().blue().to_string(),
            Level::Info => level.as_str().green().to_string(),
            Level::Warn => level.as_str().yellow().to_string(),
            Level::Error => level.as_str().red().bold().to_string(),
        }
    }

    fn dim(&self, s: &str) -> String {
        if self.color {
            s.dimmed().to_string()
        } else {
            s.to_string()
        }
    }
}

impl Backend for PrettyBackend {
    fn append(&self, record: &Record) -> io::Result<()> {
        let time = record.time.format("%b %d %H:%M:%S%.3f").to_string();
        let mut line = format!(
            "{} {} {}",
            self.dim(&time),
            self.paint_level(record.level),
            rewrite_message(&self.replace_attr, &record.message),
        );
        let prefix = record.groups.join(".");
        for attr in &record.attrs {
            let Some(attr) = rewrite(&self.replace_attr, &record.groups, attr.clone()) else {
                continue;
            };
            let key = if prefix.is_empty() {
                attr.key.clone()
            } else {
                format!("{prefix}.{}", attr.key)
            };
            let value = logfmt_value(&attr.value);
            // Provenance attrs stay visually quiet.
            let value = if attr.key == "pkg" {
                self.dim(&value)
            } else {
                value
            };
            line.push(' ');
            line.push_str(&self.dim(&format!("{key}=")));
            line.push_str(&value);
        }
        line.push('\n');
        self.sink.lock().write_all(line.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::attr;
    use chrono::Local;
    use std::sync::Mutex as StdMutex;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<StdMutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn record(attrs: Vec<Attr>, groups: Vec<String>) -> Record {
        Record {
            time: Local::now(),
            level: Level::Info,
            message: "user login".to_string(),
            attrs,
            groups,
        }
    }

    #[test]
    fn text_format() {
        let buf = SharedBuf::default();
        let backend = TextBackend::new(Output::Writer(Box::new(buf.clone())), None);

        backend
            .append(&record(vec![attr("user", "alice"), attr("id", 42)], vec![]))
            .unwrap();

        let line = buf.contents();
        assert!(line.contains("level=INFO"));
        assert!(line.contains("msg=\"user login\""));
        assert!(line.contains("user=alice"));
        assert!(line.contains("id=42"));
        assert!(line.ends_with('\n'));
    }

    #[test]
    fn text_group_qualifies_keys() {
        let buf = SharedBuf::default();
        let backend = TextBackend::new(Output::Writer(Box::new(buf.clone())), None);

        backend
            .append(&record(
                vec![attr("query", "select")],
                vec!["db".to_string(), "pg".to_string()],
            ))
            .unwrap();

        assert!(buf.contents().contains("db.pg.query=select"));
    }

    #[test]
    fn json_format_nests_groups() {
        let buf = SharedBuf::default();
        let backend = JsonBackend::new(Output::Writer(Box::new(buf.clone())), None);

        backend
            .append(&record(
                vec![attr("user", "alice"), attr("id", 42)],
                vec!["session".to_string()],
            ))
            .unwrap();

        let parsed: Value = serde_json::from_str(buf.contents().trim()).unwrap();
        assert_eq!(parsed["level"], "INFO");
        assert_eq!(parsed["msg"], "user login");
        assert_eq!(parsed["session"]["user"], "alice");
        assert_eq!(parsed["session"]["id"], 42);
    }

    #[test]
    fn replace_attr_rewrites_and_drops() {
        let buf = SharedBuf::default();
        let replace: ReplaceAttr = Arc::new(|_groups, attr| match attr.key.as_str() {
            "msg" => Some(Attr {
                key: attr.key,
                value: Value::String("REDACTED".to_string()),
            }),
            "password" => None,
            _ => Some(attr),
        });
        let backend = TextBackend::new(Output::Writer(Box::new(buf.clone())), Some(replace));

        backend
            .append(&record(
                vec![attr("user", "alice"), attr("password", "hunter2")],
                vec![],
            ))
            .unwrap();

        let line = buf.contents();
        assert!(line.contains("msg=REDACTED"));
        assert!(line.contains("user=alice"));
        assert!(!line.contains("hunter2"));
    }

    #[test]
    fn replace_attr_applies_to_json_too() {
        let buf = SharedBuf::default();
        let replace: ReplaceAttr = Arc::new(|_groups, attr| {
            if attr.key == "msg" {
                Some(Attr {
                    key: attr.key,
                    value: Value::String("REPLACED".to_string()),
                })
            } else {
                Some(attr)
            }
        });
        let backend = JsonBackend::new(Output::Writer(Box::new(buf.clone())), Some(replace));

        backend.append(&record(vec![attr("id", 31337)], vec![])).unwrap();

        let parsed: Value = serde_json::from_str(buf.contents().trim()).unwrap();
        assert_eq!(parsed["msg"], "REPLACED");
        assert_eq!(parsed["id"], 31337);
    }

    #[test]
    fn pretty_without_terminal_has_no_escape_codes() {
        let buf = SharedBuf::default();
        let backend = PrettyBackend::new(Output::Writer(Box::new(buf.clone())), None);

        backend
            .append(&record(vec![attr("pkg", "shutdown"), attr("code", 0)], vec![]))
            .unwrap();

        let line = buf.contents();
        assert!(!line.contains('\u{1b}'));
        assert!(line.contains("INFO"));
        assert!(line.contains("user login"));
        assert!(line.contains("pkg=shutdown"));
        assert!(line.contains("code=0"));
    }
}
