use percent_encoding::percent_decode_str;
use std::borrow::Cow;
use std::fmt;

/// One `/`-delimited piece of a route pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text that must equal the path component
    Static(String),
    /// `{controller}`: binds the controller name
    Controller,
    /// `{action}`: binds the action name
    Action,
    /// `{id}`: binds the conventional `id` parameter
    Id,
    /// Any other `{name}`: binds a request parameter called `name`
    User(String),
}

impl Segment {
    /// Parse a single pattern piece
    pub fn parse(piece: &str) -> Self {
        match user_segment_name(piece) {
            Some("controller") => Segment::Controller,
            Some("action") => Segment::Action,
            Some("id") => Segment::Id,
            Some(name) => Segment::User(name.to_string()),
            None => Segment::Static(piece.to_string()),
        }
    }

    pub fn is_static(&self) -> bool {
        matches!(self, Segment::Static(_))
    }

    /// Name of the parameter this segment binds, if it binds one
    pub fn param_name(&self) -> Option<&str> {
        match self {
            Segment::Id => Some("id"),
            Segment::User(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Static(text) => f.write_str(text),
            Segment::Controller => f.write_str("{controller}"),
            Segment::Action => f.write_str("{action}"),
            Segment::Id => f.write_str("{id}"),
            Segment::User(name) => write!(f, "{{{}}}", name),
        }
    }
}

/// Extract the name from a `{name}` segment
pub fn user_segment_name(piece: &str) -> Option<&str> {
    piece
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .filter(|name| !name.is_empty())
}

/// Split a pattern into segments, ignoring empty pieces
pub fn parse_pattern(pattern: &str) -> Vec<Segment> {
    split_path(pattern).map(Segment::parse).collect()
}

/// Split a request path (or pattern) into its non-empty components
pub fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|piece| !piece.is_empty())
}

/// Percent-decode one path component; invalid UTF-8 is replaced, not rejected
pub fn decode_segment(piece: &str) -> Cow<'_, str> {
    percent_decode_str(piece).decode_utf8_lossy()
}

/// Normalize a request path: leading slash, no trailing slash, no empty pieces
pub fn normalize_path(path: &str) -> String {
    let joined = split_path(path).collect::<Vec<_>>().join("/");
    format!("/{}", joined)
}
