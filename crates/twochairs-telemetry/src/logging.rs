use std::fmt;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{span, Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
CREATE TABLE IF NOT EXISTS logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    level TEXT NOT NULL,
    target TEXT NOT NULL,
    message TEXT NOT NULL,
    fields TEXT,
    span_id TEXT,
    session_id TEXT,
    user_id TEXT
);
CREATE INDEX IF NOT EXISTS idx_logs_session ON logs(session_id, id);
CREATE INDEX IF NOT EXISTS idx_logs_level ON logs(level, id);
";

const DEFAULT_QUERY_LIMIT: u32 = 100;

/// One persisted WARN or ERROR event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: i64,
    pub timestamp: String,
    pub level: String,
    pub target: String,
    pub message: String,
    /// Remaining event fields as a JSON object.
    pub fields: Option<String>,
    pub span_id: Option<String>,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
}

/// Filters for [`SqliteLogSink::query`]. Results are newest first.
#[derive(Clone, Debug, Default)]
pub struct LogQuery {
    /// Exact level name, e.g. `"WARN"`.
    pub level: Option<String>,
    /// Substring of the event target.
    pub target: Option<String>,
    pub session_id: Option<String>,
    /// RFC 3339 lower bound on the timestamp.
    pub since: Option<String>,
    pub limit: Option<u32>,
}

/// Log database holding WARN and above.
pub struct SqliteLogSink {
    conn: Mutex<Connection>,
}

impl SqliteLogSink {
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn write(&self, entry: &Entry) -> Result<(), rusqlite::Error> {
        self.conn.lock().execute(
            "INSERT INTO logs (timestamp, level, target, message, fields, span_id, session_id, user_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry.timestamp,
                entry.level,
                entry.target,
                entry.message,
                entry.fields,
                entry.span_id,
                entry.correlation.session_id,
                entry.correlation.user_id,
            ],
        )?;
        Ok(())
    }

    pub fn query(&self, query: &LogQuery) -> Result<Vec<LogRecord>, rusqlite::Error> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut args: Vec<SqlValue> = Vec::new();
        let mut add = |clause: &'static str, value: String| {
            clauses.push(clause);
            args.push(SqlValue::Text(value));
        };

        if let Some(level) = &query.level {
            add("level = ?", level.to_uppercase());
        }
        if let Some(target) = &query.target {
            add("target LIKE ?", format!("%{target}%"));
        }
        if let Some(session_id) = &query.session_id {
            add("session_id = ?", session_id.clone());
        }
        if let Some(since) = &query.since {
            add("timestamp >= ?", since.clone());
        }

        let mut sql = String::from(
            "SELECT id, timestamp, level, target, message, fields, span_id, session_id, user_id FROM logs",
        );
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id DESC LIMIT ?");
        args.push(SqlValue::Integer(i64::from(
            query.limit.unwrap_or(DEFAULT_QUERY_LIMIT),
        )));

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args), |row| {
            Ok(LogRecord {
                id: row.get(0)?,
                timestamp: row.get(1)?,
                level: row.get(2)?,
                target: row.get(3)?,
                message: row.get(4)?,
                fields: row.get(5)?,
                span_id: row.get(6)?,
                session_id: row.get(7)?,
                user_id: row.get(8)?,
            })
        })?;
        rows.collect()
    }

    pub fn count(&self) -> Result<i64, rusqlite::Error> {
        self.conn
            .lock()
            .query_row("SELECT COUNT(*) FROM logs", [], |row| row.get(0))
    }
}

/// Ids that tie a log line to a session and user.
#[derive(Clone, Debug, Default)]
struct Correlation {
    session_id: Option<String>,
    user_id: Option<String>,
}

impl Correlation {
    fn is_empty(&self) -> bool {
        self.session_id.is_none() && self.user_id.is_none()
    }

    fn fill_from(&mut self, other: &Correlation) {
        if self.session_id.is_none() {
            self.session_id.clone_from(&other.session_id);
        }
        if self.user_id.is_none() {
            self.user_id.clone_from(&other.user_id);
        }
    }
}

struct Entry {
    timestamp: String,
    level: String,
    target: String,
    message: String,
    fields: Option<String>,
    span_id: Option<String>,
    correlation: Correlation,
}

/// Splits recorded fields into the message, correlation ids and the rest.
#[derive(Default)]
struct Collected {
    message: Option<String>,
    correlation: Correlation,
    extra: Map<String, Value>,
}

impl Collected {
    fn put(&mut self, field: &Field, value: Value) {
        match field.name() {
            "message" => self.message = Some(as_text(value)),
            "session_id" => self.correlation.session_id = Some(as_text(value)),
            "user_id" => self.correlation.user_id = Some(as_text(value)),
            name => {
                self.extra.insert(name.to_string(), value);
            }
        }
    }
}

fn as_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

impl Visit for Collected {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let rendered = format!("{value:?}");
        let unquoted = rendered
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .map(str::to_string)
            .unwrap_or(rendered);
        self.put(field, Value::String(unquoted));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::String(value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, Value::Bool(value));
    }
}

/// `tracing` layer writing WARN and ERROR events to a [`SqliteLogSink`].
///
/// Events without their own `session_id`/`user_id` inherit them from the
/// nearest enclosing span that recorded one.
pub struct SqliteLogLayer {
    sink: Arc<SqliteLogSink>,
}

impl SqliteLogLayer {
    pub fn new(sink: Arc<SqliteLogSink>) -> Self {
        Self { sink }
    }
}

impl<S> Layer<S> for SqliteLogLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let mut collected = Collected::default();
        attrs.record(&mut collected);
        if collected.correlation.is_empty() {
            return;
        }
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(collected.correlation);
        }
    }

    fn on_record(&self, id: &span::Id, values: &span::Record<'_>, ctx: Context<'_, S>) {
        let mut collected = Collected::default();
        values.record(&mut collected);
        if collected.correlation.is_empty() {
            return;
        }
        let Some(span) = ctx.span(id) else { return };
        let mut extensions = span.extensions_mut();
        if let Some(existing) = extensions.get_mut::<Correlation>() {
            let mut updated = collected.correlation;
            updated.fill_from(existing);
            *existing = updated;
            return;
        }
        extensions.insert(collected.correlation);
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let meta = event.metadata();
        if *meta.level() > Level::WARN {
            return;
        }

        let mut collected = Collected::default();
        event.record(&mut collected);

        let mut span_id = None;
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope {
                span_id.get_or_insert_with(|| format!("{:?}", span.id()));
                if let Some(inherited) = span.extensions().get::<Correlation>() {
                    collected.correlation.fill_from(inherited);
                }
            }
        }

        let entry = Entry {
            timestamp: Utc::now().to_rfc3339(),
            level: meta.level().to_string(),
            target: meta.target().to_string(),
            message: collected.message.unwrap_or_default(),
            fields: (!collected.extra.is_empty())
                .then(|| Value::Object(collected.extra).to_string()),
            span_id,
            correlation: collected.correlation,
        };

        if let Err(e) = self.sink.write(&entry) {
            eprintln!("twochairs-telemetry: dropped log record: {e}");
        }
    }
}
