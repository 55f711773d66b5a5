pub mod builder;
pub mod route_config;
pub mod router;
pub mod segment;

pub use builder::{route, HttpMethod, RouteBuilder, RouteConflictError, RouteSpec};
pub use route_config::RouteConfig;
pub use router::{MatchResult, RouteError, Router};
pub use segment::{normalize_path, split_path, user_segment_name, Segment};
