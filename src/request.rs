use crate::routing::{normalize_path, HttpMethod};
use std::collections::HashMap;

/// The request as seen by the dispatcher.
///
/// Built by the serving layer (or directly in tests). Parameter values are
/// kept exactly as received: `?flag1` and `?flag1=` both bind `flag1` to `""`.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    method: HttpMethod,
    uri: String,
    path: String,
    query: Option<String>,
    scheme: String,
    host: String,
    params: HashMap<String, String>,
    request_id: Option<String>,
}

impl DispatchRequest {
    /// Create a request from a method and a request target (`/path?query`)
    pub fn new(method: HttpMethod, target: &str) -> Self {
        let (uri, query) = match target.split_once('?') {
            Some((uri, query)) => (uri, Some(query.to_string())),
            None => (target, None),
        };
        let uri = if uri.starts_with('/') {
            uri.to_string()
        } else {
            format!("/{}", uri)
        };

        let mut request = Self {
            method,
            path: normalize_path(&uri),
            uri,
            query: None,
            scheme: "http".to_string(),
            host: "localhost".to_string(),
            params: HashMap::new(),
            request_id: None,
        };
        if let Some(query) = query {
            request.extend_form(query.as_bytes());
            request.query = Some(query);
        }
        request
    }

    pub fn get(target: &str) -> Self {
        Self::new(HttpMethod::Get, target)
    }

    pub fn post(target: &str) -> Self {
        Self::new(HttpMethod::Post, target)
    }

    /// Add a parameter; the first value bound to a name wins
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.entry(name.into()).or_insert_with(|| value.into());
        self
    }

    /// Add parameters decoded from an `application/x-www-form-urlencoded` payload
    pub fn with_form(mut self, payload: &[u8]) -> Self {
        self.extend_form(payload);
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    fn extend_form(&mut self, payload: &[u8]) {
        for (name, value) in url::form_urlencoded::parse(payload) {
            self.params
                .entry(name.into_owned())
                .or_insert_with(|| value.into_owned());
        }
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Normalized path used for routing
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Request URI path as received
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Scheme, host and URI path, without the query string
    pub fn url(&self) -> String {
        format!("{}://{}{}", self.scheme, self.host, self.uri)
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn get_param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_uri_and_url() {
        let request = DispatchRequest::get("/student/index");
        assert_eq!(request.path(), "/student/index");
        assert_eq!(request.uri(), "/student/index");
        assert_eq!(request.url(), "http://localhost/student/index");
        assert_eq!(request.method(), HttpMethod::Get);
    }

    #[test]
    fn test_trailing_slash_is_normalized_for_routing_only() {
        let request = DispatchRequest::get("/api/v2/authors/9/");
        assert_eq!(request.path(), "/api/v2/authors/9");
        assert_eq!(request.uri(), "/api/v2/authors/9/");
    }

    #[test]
    fn test_query_parameters() {
        let request = DispatchRequest::get("/search?q=rust%20web&page=2").host("example.com:8080");
        assert_eq!(request.get_param("q"), Some("rust web"));
        assert_eq!(request.get_param("page"), Some("2"));
        assert_eq!(request.query(), Some("q=rust%20web&page=2"));
        assert_eq!(request.url(), "http://example.com:8080/search");
    }

    #[test]
    fn test_blank_parameters_are_preserved() {
        let request = DispatchRequest::get("/blank_parameter?flag1&flag2=");
        assert_eq!(request.get_param("flag1"), Some(""));
        assert_eq!(request.get_param("flag2"), Some(""));
    }

    #[test]
    fn test_form_payload() {
        let request = DispatchRequest::post("/greeting/save").with_form(b"name=Joe&empty=");
        assert_eq!(request.get_param("name"), Some("Joe"));
        assert_eq!(request.get_param("empty"), Some(""));
    }

    #[test]
    fn test_first_value_wins() {
        let request = DispatchRequest::get("/x?name=first").param("name", "second");
        assert_eq!(request.get_param("name"), Some("first"));
    }
}
