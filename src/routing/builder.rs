use super::segment::{parse_pattern, Segment};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// HTTP methods a route can be restricted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    /// Case-insensitive: `post` and `POST` are the same method
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            other => Err(format!("Unsupported HTTP method: {}", other)),
        }
    }
}

impl TryFrom<String> for HttpMethod {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HttpMethod> for String {
    fn from(method: HttpMethod) -> Self {
        method.as_str().to_string()
    }
}

/// Declaration-time route errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteConflictError {
    #[error("Cannot combine {{controller}} segment and .to(\"...\") method. Failed route: {0}")]
    ControllerBinding(String),

    #[error("Cannot combine {{action}} segment and .action(\"...\") method. Failed route: {0}")]
    ActionBinding(String),

    #[error("Route must declare a {{controller}} segment or a .to(\"...\") binding. Failed route: {0}")]
    MissingController(String),
}

impl RouteConflictError {
    /// The pattern that failed validation
    pub fn pattern(&self) -> &str {
        match self {
            RouteConflictError::ControllerBinding(p)
            | RouteConflictError::ActionBinding(p)
            | RouteConflictError::MissingController(p) => p,
        }
    }
}

/// Start declaring a route
pub fn route(pattern: impl Into<String>) -> RouteBuilder {
    RouteBuilder::new(pattern)
}

/// Fluent route declaration, finished with [`RouteBuilder::build`]
#[derive(Debug, Clone)]
pub struct RouteBuilder {
    pattern: String,
    controller: Option<String>,
    action: Option<String>,
    method: Option<HttpMethod>,
}

impl RouteBuilder {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            controller: None,
            action: None,
            method: None,
        }
    }

    /// Bind the route to a controller by registry name
    pub fn to(mut self, controller: impl Into<String>) -> Self {
        self.controller = Some(controller.into());
        self
    }

    /// Bind the route to an action by name
    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Restrict the route to one HTTP method
    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn get(self) -> Self {
        self.method(HttpMethod::Get)
    }

    pub fn post(self) -> Self {
        self.method(HttpMethod::Post)
    }

    pub fn put(self) -> Self {
        self.method(HttpMethod::Put)
    }

    pub fn delete(self) -> Self {
        self.method(HttpMethod::Delete)
    }

    pub fn patch(self) -> Self {
        self.method(HttpMethod::Patch)
    }

    pub fn head(self) -> Self {
        self.method(HttpMethod::Head)
    }

    pub fn options(self) -> Self {
        self.method(HttpMethod::Options)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Parse and validate the declaration into an immutable route
    pub fn build(self) -> Result<RouteSpec, RouteConflictError> {
        let segments = parse_pattern(&self.pattern);
        let has_controller_segment = segments.iter().any(|s| *s == Segment::Controller);
        let has_action_segment = segments.iter().any(|s| *s == Segment::Action);

        if self.controller.is_some() && has_controller_segment {
            return Err(RouteConflictError::ControllerBinding(self.pattern));
        }
        if self.action.is_some() && has_action_segment {
            return Err(RouteConflictError::ActionBinding(self.pattern));
        }
        if self.controller.is_none() && !has_controller_segment {
            return Err(RouteConflictError::MissingController(self.pattern));
        }

        Ok(RouteSpec {
            pattern: self.pattern,
            segments,
            controller: self.controller,
            action: self.action,
            method: self.method,
        })
    }
}

/// A compiled, validated route declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    pattern: String,
    segments: Vec<Segment>,
    controller: Option<String>,
    action: Option<String>,
    method: Option<HttpMethod>,
}

impl RouteSpec {
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Explicit `.to()` binding
    pub fn controller(&self) -> Option<&str> {
        self.controller.as_deref()
    }

    /// Explicit `.action()` binding
    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    /// Method constraint; `None` accepts any method
    pub fn method(&self) -> Option<HttpMethod> {
        self.method
    }

    pub fn accepts(&self, method: HttpMethod) -> bool {
        self.method.map_or(true, |m| m == method)
    }
}

impl fmt::Display for RouteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let method = self.method.map_or("ANY", |m| m.as_str());
        write!(f, "{} {}", method, self.pattern)?;
        if let Some(controller) = &self.controller {
            write!(f, " -> {}", controller)?;
        }
        if let Some(action) = &self.action {
            write!(f, "#{}", action)?;
        }
        Ok(())
    }
}
