use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use time::OffsetDateTime;
use time::macros::format_description;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;

pub const DEFAULT_FILTER: &str = "info";
pub const DEFAULT_CAPACITY: usize = 500;

/// Field names whose values never reach the buffer.
const SECRET_FIELDS: &[&str] = &["password", "secret_access_key", "session_token"];
const REDACTED: &str = "<redacted>";

/// One captured event. `profile` is lifted out of the event's `profile`
/// field so the log view can be narrowed to a single AWS profile.
#[derive(Clone, Debug)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: Level,
    pub target: String,
    pub profile: Option<String>,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl LogEntry {
    /// `HH:MM:SS LEVEL [profile] message | k=v ...`; events outside any
    /// profile show their target instead.
    pub fn format_compact(&self) -> String {
        let scope = match &self.profile {
            Some(profile) => format!("[{profile}]"),
            None => self.target.clone(),
        };
        let mut line = format!(
            "{} {:<5} {scope} {}",
            self.timestamp, self.level, self.message
        );
        if !self.fields.is_empty() {
            let mut extras: Vec<String> = self
                .fields
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            extras.sort();
            line.push_str(" | ");
            line.push_str(&extras.join(" "));
        }
        line
    }

    fn concerns(&self, profile: Option<&str>) -> bool {
        match profile {
            Some(wanted) => self.profile.as_deref() == Some(wanted),
            None => true,
        }
    }
}

/// Recent log events kept in memory for `GET /api/logs`.
#[derive(Clone)]
pub struct LogBuffer {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
    max_entries: usize,
}

impl LogBuffer {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::new())),
            max_entries,
        }
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// The newest `limit` entries for `profile` (all profiles when `None`),
    /// oldest first, rendered as single lines.
    pub fn recent_lines(&self, limit: usize, profile: Option<&str>) -> Vec<String> {
        let Ok(entries) = self.entries.lock() else {
            return Vec::new();
        };
        let mut lines: Vec<String> = entries
            .iter()
            .rev()
            .filter(|entry| entry.concerns(profile))
            .take(limit)
            .map(LogEntry::format_compact)
            .collect();
        lines.reverse();
        lines
    }

    pub(crate) fn push(&self, entry: LogEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push_back(entry);
            while entries.len() > self.max_entries {
                entries.pop_front();
            }
        }
    }
}

#[derive(Clone)]
pub struct LogLayer {
    buffer: LogBuffer,
}

impl LogLayer {
    pub fn new(buffer: LogBuffer) -> Self {
        Self { buffer }
    }
}

impl<S> Layer<S> for LogLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = EntryVisitor::default();
        event.record(&mut visitor);
        let metadata = event.metadata();
        self.buffer.push(LogEntry {
            timestamp: format_timestamp(OffsetDateTime::now_utc()),
            level: *metadata.level(),
            target: metadata.target().to_string(),
            profile: visitor.profile,
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

/// Installs the global subscriber: `RUST_LOG` filter (default `info`), a fmt
/// layer on stderr and the in-memory layer feeding `buffer`.
pub fn init(buffer: &LogBuffer) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(LogLayer::new(buffer.clone()))
        .try_init();
    if installed.is_err() {
        eprintln!("logging already initialised");
    }
}

#[derive(Default)]
struct EntryVisitor {
    profile: Option<String>,
    message: String,
    fields: Vec<(String, String)>,
}

impl EntryVisitor {
    fn take(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = value,
            "profile" => self.profile = Some(value),
            name if SECRET_FIELDS.contains(&name) => {
                self.fields.push((name.to_string(), REDACTED.to_string()))
            }
            name => self.fields.push((name.to_string(), value)),
        }
    }
}

impl Visit for EntryVisitor {
    fn record_bool(&mut self, field: &Field, value: bool) {
        self.take(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.take(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.take(field, value.to_string());
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.take(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        self.take(field, format!("{value:?}"));
    }
}

fn format_timestamp(timestamp: OffsetDateTime) -> String {
    timestamp
        .format(format_description!("[hour repr:24]:[minute]:[second]"))
        .unwrap_or_else(|_| timestamp.unix_timestamp().to_string())
}
