// Library exports for actionweb

pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod env_interpolation;
pub mod filters;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod request;
pub mod response;
pub mod routing;
pub mod server;
pub mod views;

pub use controller::{ActionContext, ActionOutcome, ControllerDef, ControllerRegistry, ViewSpec};
pub use dispatcher::{DispatchError, RequestDispatcher};
pub use filters::{ControllerFilter, FilterChain, FilterContext, FilterDecision};
pub use logging::{JsonLineSink, LogEvent, LogSink, MemorySink, TracingSink};
pub use request::DispatchRequest;
pub use response::DispatchResponse;
pub use routing::{route, HttpMethod, RouteConfig, Router};
pub use views::{Templates, ViewRenderer};
