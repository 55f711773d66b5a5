use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::sync::Mutex;

pub const DISPATCHER_LOGGER: &str = "actionweb::dispatcher";
pub const VIEWS_LOGGER: &str = "actionweb::views";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Message body of dispatcher records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    pub controller: String,
    pub action: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_millis: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum LogMessage {
    Text(String),
    Dispatch(DispatchFields),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExceptionRecord {
    pub message: String,
    pub stacktrace: String,
}

/// One structured log record; immutable once emitted.
/// Serialized as a single-line JSON object:
///
/// ```text
/// {"level":"INFO","timestamp":"...","logger":"actionweb::dispatcher","message":{"info":"executing controller",...}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEvent {
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    pub logger: String,
    pub message: LogMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionRecord>,
}

impl LogEvent {
    pub fn text(level: LogLevel, logger: &str, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            logger: logger.to_string(),
            message: LogMessage::Text(message.into()),
            exception: None,
        }
    }

    pub fn dispatch(level: LogLevel, fields: DispatchFields) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            logger: DISPATCHER_LOGGER.to_string(),
            message: LogMessage::Dispatch(fields),
            exception: None,
        }
    }

    pub fn with_exception(mut self, exception: ExceptionRecord) -> Self {
        self.exception = Some(exception);
        self
    }

    pub fn fields(&self) -> Option<&DispatchFields> {
        match &self.message {
            LogMessage::Dispatch(fields) => Some(fields),
            LogMessage::Text(_) => None,
        }
    }

    pub fn text_message(&self) -> Option<&str> {
        match &self.message {
            LogMessage::Text(text) => Some(text),
            LogMessage::Dispatch(_) => None,
        }
    }

    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"level":"ERROR","logger":"{}","message":"unserializable log event: {}"}}"#,
                DISPATCHER_LOGGER, e
            )
        })
    }
}

/// Destination for log records
pub trait LogSink: Send + Sync {
    fn emit(&self, event: LogEvent);
}

/// Writes one JSON object per line
pub struct JsonLineSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonLineSink {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl LogSink for JsonLineSink {
    fn emit(&self, event: LogEvent) {
        let line = event.to_json_line();
        // A poisoned lock still holds a usable writer
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
            tracing::warn!("Failed to write log record: {}", e);
        }
    }
}

/// Forwards serialized records through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, event: LogEvent) {
        let line = event.to_json_line();
        match event.level {
            LogLevel::Debug => tracing::debug!(target: "actionweb::requests", "{}", line),
            LogLevel::Info => tracing::info!(target: "actionweb::requests", "{}", line),
            LogLevel::Warn => tracing::warn!(target: "actionweb::requests", "{}", line),
            LogLevel::Error => tracing::error!(target: "actionweb::requests", "{}", line),
        }
    }
}

/// Keeps records in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<LogEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.events().iter().map(LogEvent::to_json_line).collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl LogSink for MemorySink {
    fn emit(&self, event: LogEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}
