pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
pub const TEXT_HTML: &str = "text/html; charset=utf-8";

/// The dispatcher's output, handed back to the serving layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResponse {
    status: u16,
    content_type: String,
    body: String,
    location: Option<String>,
}

impl DispatchResponse {
    pub fn new(status: u16, content_type: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: content_type.into(),
            body: body.into(),
            location: None,
        }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, TEXT_PLAIN, body)
    }

    pub fn html(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, TEXT_HTML, body)
    }

    pub fn redirect(status: u16, target: impl Into<String>) -> Self {
        Self {
            status,
            content_type: TEXT_PLAIN.to_string(),
            body: String::new(),
            location: Some(target.into()),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Redirect target
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status) && self.location.is_some()
    }
}
