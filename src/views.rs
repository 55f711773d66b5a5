use crate::logging::{LogEvent, LogLevel, LogSink, VIEWS_LOGGER};
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

static VALUE_REGEX: OnceLock<Regex> = OnceLock::new();
static CONTENT_FOR_REGEX: OnceLock<Regex> = OnceLock::new();
static YIELD_REGEX: OnceLock<Regex> = OnceLock::new();

fn value_regex() -> &'static Regex {
    VALUE_REGEX.get_or_init(|| {
        Regex::new(r"\$\{\s*([A-Za-z_][A-Za-z0-9_.]*)\s*(!)?\s*(\?html)?\s*\}")
            .expect("Failed to compile value regex")
    })
}

fn content_for_regex() -> &'static Regex {
    CONTENT_FOR_REGEX.get_or_init(|| {
        Regex::new(r#"(?s)<@content\s+for\s*=\s*"([^"]+)"\s*>(.*?)</@content>"#)
            .expect("Failed to compile content regex")
    })
}

fn yield_regex() -> &'static Regex {
    YIELD_REGEX.get_or_init(|| {
        Regex::new(r#"<@yield\s+to\s*=\s*"([^"]+)"\s*/>"#).expect("Failed to compile yield regex")
    })
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("Failed to render template: {target}; template not found: '{missing}'")]
    TemplateNotFound { target: String, missing: String },

    #[error("Failed to render template: {target}; no value for '${{{name}}}'")]
    MissingValue { target: String, name: String },
}

impl RenderError {
    /// Missing templates are a 404, anything else a 500
    pub fn status(&self) -> u16 {
        match self {
            RenderError::TemplateNotFound { .. } => 404,
            RenderError::MissingValue { .. } => 500,
        }
    }
}

/// The rendering collaborator used by the dispatcher
pub trait ViewRenderer: Send + Sync {
    fn render(
        &self,
        template: &str,
        layout: Option<&str>,
        values: &Map<String, Value>,
        log: &dyn LogSink,
    ) -> Result<String, RenderError>;
}

/// In-memory template set.
///
/// Supports `${name}` interpolation, `${name!}` for optional values,
/// `${name?html}` for escaped output, layouts wrapping `${page_content}`, and
/// content blocks captured with `<@content for="slot">...</@content>` in a
/// page and emitted with `<@yield to="slot"/>` in its layout.
#[derive(Debug, Clone)]
pub struct Templates {
    extension: String,
    sources: HashMap<String, String>,
}

impl Default for Templates {
    fn default() -> Self {
        Self::new(".html")
    }
}

impl Templates {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            sources: HashMap::new(),
        }
    }

    /// Load every file ending in `extension` below `dir`.
    /// `dir/books/index.html` becomes template `/books/index`.
    pub fn from_dir(dir: impl AsRef<Path>, extension: &str) -> anyhow::Result<Self> {
        let mut templates = Self::new(extension);
        let root = dir.as_ref();
        let mut pending = vec![root.to_path_buf()];

        while let Some(current) = pending.pop() {
            for entry in std::fs::read_dir(&current)? {
                let path = entry?.path();
                if path.is_dir() {
                    pending.push(path);
                    continue;
                }
                let relative = path.strip_prefix(root)?.to_string_lossy().replace('\\', "/");
                if let Some(name) = relative.strip_suffix(extension) {
                    let source = std::fs::read_to_string(&path)?;
                    templates.insert(format!("/{}", name), source);
                }
            }
        }

        tracing::info!("Loaded {} templates from {}", templates.len(), root.display());
        Ok(templates)
    }

    pub fn with_template(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(name, source);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        let name = name.into();
        let name = if name.starts_with('/') {
            name
        } else {
            format!("/{}", name)
        };
        self.sources.insert(name, source.into());
    }

    /// Add plain `/system/404` and `/system/error` pages unless already present
    pub fn with_system_pages(mut self) -> Self {
        self.sources
            .entry("/system/404".to_string())
            .or_insert_with(|| "<h1>${status}: Not Found</h1>\n<p>${message?html}</p>\n".to_string());
        self.sources.entry("/system/error".to_string()).or_insert_with(|| {
            "<h1>${status}: Internal Server Error</h1>\n<p>${message?html}</p>\n".to_string()
        });
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    fn describe(&self, template: &str, layout: Option<&str>) -> String {
        match layout {
            Some(layout) => format!(
                "'{}{}' with layout: '{}{}'",
                template, self.extension, layout, self.extension
            ),
            None => format!("'{}{}' with no layout", template, self.extension),
        }
    }

    fn source(&self, name: &str, target: &str) -> Result<&str, RenderError> {
        self.sources
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| RenderError::TemplateNotFound {
                target: target.to_string(),
                missing: format!("{}{}", name, self.extension),
            })
    }
}

impl ViewRenderer for Templates {
    fn render(
        &self,
        template: &str,
        layout: Option<&str>,
        values: &Map<String, Value>,
        log: &dyn LogSink,
    ) -> Result<String, RenderError> {
        let target = self.describe(template, layout);
        log.emit(LogEvent::text(
            LogLevel::Info,
            VIEWS_LOGGER,
            format!("Rendering template: {}.", target),
        ));

        let page = self.source(template, &target)?;
        let mut slots = HashMap::new();
        let mut captured = None;
        let page = content_for_regex().replace_all(page, |caps: &Captures| {
            match interpolate(&caps[2], values, &target) {
                Ok(content) => {
                    slots
                        .entry(caps[1].to_string())
                        .or_insert_with(String::new)
                        .push_str(&content);
                }
                Err(e) => {
                    captured.get_or_insert(e);
                }
            }
            String::new()
        });
        if let Some(e) = captured {
            return Err(e);
        }
        let body = interpolate(&page, values, &target)?;

        let Some(layout) = layout else {
            return Ok(body);
        };

        let layout_source = self.source(layout, &target)?;
        let mut layout_values = values.clone();
        layout_values.insert("page_content".to_string(), Value::String(body));
        let rendered = interpolate(layout_source, &layout_values, &target)?;

        Ok(yield_regex()
            .replace_all(&rendered, |caps: &Captures| {
                slots.get(&caps[1]).cloned().unwrap_or_default()
            })
            .into_owned())
    }
}

/// Replace `${name}` / `${name!}` / `${name?html}` expressions with values
fn interpolate(source: &str, values: &Map<String, Value>, target: &str) -> Result<String, RenderError> {
    let mut missing = None;
    let rendered = value_regex().replace_all(source, |caps: &Captures| {
        let name = &caps[1];
        let optional = caps.get(2).is_some();
        let escaped = caps.get(3).is_some();
        match lookup(values, name) {
            Some(value) if escaped => escape_html(&display_value(value)),
            Some(value) => display_value(value),
            None => {
                if !optional && missing.is_none() {
                    missing = Some(name.to_string());
                }
                String::new()
            }
        }
    });

    match missing {
        Some(name) => Err(RenderError::MissingValue {
            target: target.to_string(),
            name,
        }),
        None => Ok(rendered.into_owned()),
    }
}

/// Dotted lookup: `author.name` reads `values["author"]["name"]`
fn lookup<'a>(values: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    let mut parts = name.split('.');
    let mut current = values.get(parts.next()?)?;
    for part in parts {
        current = current.get(part)?;
    }
    Some(current)
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
