use crate::controller::{ActionContext, ActionOutcome, ControllerRegistry};
use crate::filters::{ControllerFilter, FilterChain, FilterContext, FilterDecision};
use crate::logging::{DispatchFields, ExceptionRecord, LogEvent, LogLevel, LogSink};
use crate::request::DispatchRequest;
use crate::response::DispatchResponse;
use crate::routing::{RouteConflictError, RouteError, Router};
use crate::views::{RenderError, ViewRenderer};
use metrics::{counter, histogram};
use serde_json::{Map, Value};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};
use uuid::Uuid;

const NOT_FOUND_PAGE: &str = "/system/404";
const ERROR_PAGE: &str = "/system/error";

#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    RouteConflict(#[from] RouteConflictError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("controller not found: {class_name}")]
    ControllerNotFound { class_name: String },

    #[error("no such method: {class_name}.{action}()")]
    ActionNotFound { class_name: String, action: String },

    #[error("{message}")]
    ActionInvocation { message: String, stacktrace: String },

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Failed to render template: '{template}'; renderer panicked: {message}")]
    RendererPanicked { template: String, message: String },
}

impl DispatchError {
    /// Wrap an error raised by an action or filter
    pub fn invocation(error: &anyhow::Error) -> Self {
        DispatchError::ActionInvocation {
            message: error.to_string(),
            stacktrace: format!("{:?}", error),
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            DispatchError::RouteConflict(_)
            | DispatchError::ActionInvocation { .. }
            | DispatchError::RendererPanicked { .. } => 500,
            DispatchError::Route(e) => e.status(),
            DispatchError::ControllerNotFound { .. } | DispatchError::ActionNotFound { .. } => 404,
            DispatchError::Render(e) => e.status(),
        }
    }

    /// Exception record for failures raised by application code
    pub fn exception(&self) -> Option<ExceptionRecord> {
        match self {
            DispatchError::ActionInvocation {
                message,
                stacktrace,
            } => Some(ExceptionRecord {
                message: message.clone(),
                stacktrace: stacktrace.clone(),
            }),
            DispatchError::RendererPanicked { message, .. } => Some(ExceptionRecord {
                message: message.clone(),
                stacktrace: self.to_string(),
            }),
            _ => None,
        }
    }
}

/// Drives one request from path to response.
///
/// Stages run in order: routing, controller resolution, before-filters, the
/// action, after-filters, rendering. A failure at any stage is mapped to a
/// status, logged, and answered with a system page; `dispatch` never panics
/// because of application code.
pub struct RequestDispatcher {
    router: Router,
    filters: FilterChain,
    views: Arc<dyn ViewRenderer>,
    log: Arc<dyn LogSink>,
    log_requests: bool,
    default_layout: Option<String>,
}

impl RequestDispatcher {
    pub fn new(router: Router, views: Arc<dyn ViewRenderer>, log: Arc<dyn LogSink>) -> Self {
        Self {
            router,
            filters: FilterChain::new(),
            views,
            log,
            log_requests: true,
            default_layout: Some("/layouts/default_layout".to_string()),
        }
    }

    pub fn with_filters(mut self, filters: FilterChain) -> Self {
        self.filters = filters;
        self
    }

    /// `None` renders views without a layout unless they name one
    pub fn with_default_layout(mut self, layout: Option<String>) -> Self {
        self.default_layout = layout;
        self
    }

    /// Turn lifecycle records on or off; render records are unaffected
    pub fn log_requests(mut self, enabled: bool) -> Self {
        self.log_requests = enabled;
        self
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn registry(&self) -> &ControllerRegistry {
        self.router.registry()
    }

    pub fn dispatch(&self, request: &DispatchRequest) -> DispatchResponse {
        let started = Instant::now();
        let mut fields = DispatchFields {
            method: request.method().to_string(),
            request_id: Some(
                request
                    .correlation_id()
                    .map(str::to_string)
                    .unwrap_or_else(|| Uuid::new_v4().to_string()),
            ),
            ..Default::default()
        };

        let result = self.process(request, &mut fields);

        // Completion record, then the system page on failure
        let elapsed = started.elapsed();
        fields.duration_millis = Some(elapsed.as_millis() as u64);

        let response = match result {
            Ok(response) => {
                fields.status = Some(response.status());
                if let Some(target) = response.location() {
                    fields.url = Some(request.url());
                    fields.redirect_target = Some(target.to_string());
                }
                self.emit(LogEvent::dispatch(LogLevel::Info, fields.clone()));
                response
            }
            Err(e) => {
                let status = e.status();
                fields.status = Some(status);
                fields.error = Some(e.to_string());

                let level = if status >= 500 {
                    LogLevel::Error
                } else {
                    LogLevel::Info
                };
                let mut event = LogEvent::dispatch(level, fields.clone());
                if let Some(exception) = e.exception() {
                    error!("{} failed: {}", request.path(), exception.stacktrace);
                    event = event.with_exception(exception);
                }
                self.emit(event);
                self.error_response(&e)
            }
        };

        counter!(
            "dispatch_requests_total",
            "controller" => fields.controller,
            "status" => response.status().to_string()
        )
        .increment(1);
        histogram!("dispatch_duration_seconds").record(elapsed.as_secs_f64());

        response
    }

    fn emit(&self, event: LogEvent) {
        if self.log_requests {
            self.log.emit(event);
        }
    }

    fn process(
        &self,
        request: &DispatchRequest,
        fields: &mut DispatchFields,
    ) -> Result<DispatchResponse, DispatchError> {
        // A broken route table fails every request
        if let Some(conflict) = self.router.config().conflicts().first() {
            return Err(conflict.clone().into());
        }

        let matched = self.router.recognize(request.method(), request.path())?;
        let registry = self.router.registry();

        fields.controller = registry.class_name(&matched.controller);
        fields.action = matched.action.clone();
        self.emit(LogEvent::dispatch(
            LogLevel::Info,
            DispatchFields {
                info: Some("executing controller".to_string()),
                ..fields.clone()
            },
        ));

        // Resolve controller and action
        let controller = registry.resolve(&matched.controller)?;
        let handler = registry.resolve_action(controller, &matched.action)?;
        let filters = self.filters.for_controller(&matched.controller);
        let mut filter_ctx =
            FilterContext::new(request, &matched.controller, &matched.action, &matched.params);

        // Before-hooks; a halt or error stops the chain
        let mut entered = 0;
        let mut early: Option<anyhow::Result<(ActionOutcome, Map<String, Value>)>> = None;
        for filter in &filters {
            entered += 1;
            match guarded(|| filter.before(&mut filter_ctx)) {
                Ok(FilterDecision::Continue) => {}
                Ok(FilterDecision::Halt(outcome)) => {
                    early = Some(Ok((outcome, Map::new())));
                    break;
                }
                Err(e) => {
                    early = Some(Err(e));
                    break;
                }
            }
        }

        let result = early.unwrap_or_else(|| {
            let mut ctx =
                ActionContext::new(request, &matched.controller, &matched.action, &matched.params);
            guarded(|| handler(&mut ctx)).map(|outcome| (outcome, ctx.into_values()))
        });

        let entered = &filters[..entered];
        if let Err(e) = &result {
            for filter in entered {
                if guarded(|| {
                    filter.on_exception(&mut filter_ctx, e);
                    Ok(())
                })
                .is_err()
                {
                    warn!("Filter {} panicked in on_exception", filter.name());
                }
            }
        }
        // After-hooks run before rendering, so they see the action's status
        filter_ctx.set_status(match &result {
            Ok((outcome, _)) => outcome.status(),
            Err(_) => 500,
        });
        run_after_filters(entered, &mut filter_ctx);

        let (outcome, values) = result.map_err(|e| DispatchError::invocation(&e))?;
        self.respond(outcome, values, &matched.controller, &matched.action)
    }

    fn respond(
        &self,
        outcome: ActionOutcome,
        values: Map<String, Value>,
        controller: &str,
        action: &str,
    ) -> Result<DispatchResponse, DispatchError> {
        match outcome {
            ActionOutcome::Redirect { status, target } => {
                Ok(DispatchResponse::redirect(status, target))
            }
            ActionOutcome::Text {
                status,
                content_type,
                body,
            } => Ok(DispatchResponse::new(status, content_type, body)),
            ActionOutcome::View(view) => {
                let template = view.resolve_template(controller, action);
                let layout = view.resolve_layout(self.default_layout.as_deref());
                let body = self.render(&template, layout.as_deref(), &values)?;
                Ok(DispatchResponse::new(
                    view.response_status(),
                    view.response_content_type(),
                    body,
                ))
            }
        }
    }

    /// Renderer call with panics caught like action panics
    fn render(
        &self,
        template: &str,
        layout: Option<&str>,
        values: &Map<String, Value>,
    ) -> Result<String, DispatchError> {
        match guarded(|| Ok(self.views.render(template, layout, values, self.log.as_ref()))) {
            Ok(rendered) => Ok(rendered?),
            Err(panic) => Err(DispatchError::RendererPanicked {
                template: template.to_string(),
                message: panic.to_string(),
            }),
        }
    }

    /// System page for a failure, or plain text if that page cannot be rendered
    fn error_response(&self, err: &DispatchError) -> DispatchResponse {
        let status = err.status();
        let message = err.to_string();
        if matches!(err, DispatchError::RouteConflict(_)) {
            return DispatchResponse::text(status, message);
        }

        let page = if status == 404 {
            NOT_FOUND_PAGE
        } else {
            ERROR_PAGE
        };
        let mut values = Map::new();
        values.insert("status".to_string(), Value::from(status));
        values.insert("message".to_string(), Value::from(message.clone()));

        match self.render(page, self.default_layout.as_deref(), &values) {
            Ok(body) => DispatchResponse::html(status, body),
            Err(render_err) => {
                warn!("Failed to render system page {}: {}", page, render_err);
                DispatchResponse::text(status, message)
            }
        }
    }
}

/// After-hooks in reverse order; one failing hook does not stop the others
fn run_after_filters(filters: &[Arc<dyn ControllerFilter>], ctx: &mut FilterContext<'_>) {
    for filter in filters.iter().rev() {
        if guarded(|| {
            filter.after(ctx);
            Ok(())
        })
        .is_err()
        {
            warn!("Filter {} panicked in after", filter.name());
        }
    }
}

/// Run application code, turning a panic into an error
fn guarded<T>(f: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(anyhow::anyhow!(panic_message(payload))))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "action panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{ControllerDef, ViewSpec};
    use crate::logging::{MemorySink, DISPATCHER_LOGGER, VIEWS_LOGGER};
    use crate::routing::{route, RouteBuilder, RouteConfig};
    use crate::views::Templates;
    use std::sync::Mutex;

    fn registry() -> ControllerRegistry {
        let mut registry = ControllerRegistry::new("app.controllers");
        registry
            .register(
                ControllerDef::new("logging")
                    .action("index", |ctx| {
                        ctx.assign("greeting", "hello");
                        Ok(ActionOutcome::render())
                    })
                    .action("no-view", |_| Ok(ActionOutcome::render()))
                    .action("error", |_| Err(anyhow::anyhow!("blah!")))
                    .action("panic", |_| panic!("boom"))
                    .action("redirect", |_| {
                        Ok(ActionOutcome::redirect("https://example.com/next"))
                    }),
            )
            .register(ControllerDef::new("joe").action("index", |ctx| {
                if let Some(name) = ctx.param("name") {
                    let name = name.to_string();
                    ctx.assign("name", name);
                }
                Ok(ActionOutcome::view(ViewSpec::new().no_layout()))
            }))
            .register(ControllerDef::new("blank_parameter").action("index", |ctx| {
                Ok(ActionOutcome::text(format!(
                    "flag1 exists: {}, value: '{}'",
                    ctx.exists("flag1"),
                    ctx.param("flag1").unwrap_or("none")
                )))
            }))
            .register(ControllerDef::new("photos").action("show", |ctx| {
                Ok(ActionOutcome::text(format!("photo {}", ctx.id().unwrap_or("?"))))
            }))
            .register(ControllerDef::new("greeting").action("hi", |ctx| {
                Ok(ActionOutcome::text(format!(
                    "user={} q={}",
                    ctx.param("user_id").unwrap_or("?"),
                    ctx.param("q").unwrap_or("?")
                )))
            }))
            .register(ControllerDef::new("api"))
            .register(ControllerDef::new("api/test"))
            .register(
                ControllerDef::new("level1/level2/registration")
                    .action("index", |_| Ok(ActionOutcome::text("registered")))
                    .action("fail", |_| Err(anyhow::anyhow!("registration failed"))),
            );
        registry
    }

    fn templates() -> Templates {
        Templates::new(".html")
            .with_template("/layouts/default_layout", "[${page_content}]")
            .with_template("/logging/index", "logging ${greeting}")
            .with_template("/joe/index", "name: ${name!}")
            .with_system_pages()
    }

    fn dispatcher(routes: Vec<RouteBuilder>, filters: FilterChain) -> (RequestDispatcher, Arc<MemorySink>) {
        let router = Router::new(
            Arc::new(RouteConfig::from_builders(routes)),
            Arc::new(registry()),
        );
        let sink = Arc::new(MemorySink::new());
        let dispatcher = RequestDispatcher::new(router, Arc::new(templates()), sink.clone())
            .with_filters(filters);
        (dispatcher, sink)
    }

    fn plain() -> (RequestDispatcher, Arc<MemorySink>) {
        dispatcher(vec![], FilterChain::new())
    }

    struct Recorder {
        name: &'static str,
        events: Arc<Mutex<Vec<String>>>,
    }

    impl ControllerFilter for Recorder {
        fn before(&self, ctx: &mut FilterContext<'_>) -> anyhow::Result<FilterDecision> {
            self.events
                .lock()
                .unwrap()
                .push(format!("{} before {} {}", self.name, ctx.path(), ctx.url()));
            Ok(FilterDecision::Continue)
        }

        fn after(&self, ctx: &mut FilterContext<'_>) {
            self.events
                .lock()
                .unwrap()
                .push(format!("{} after {:?}", self.name, ctx.status()));
        }

        fn on_exception(&self, _ctx: &mut FilterContext<'_>, error: &anyhow::Error) {
            self.events
                .lock()
                .unwrap()
                .push(format!("{} exception {}", self.name, error));
        }
    }

    struct ExplodingRenderer;

    impl ViewRenderer for ExplodingRenderer {
        fn render(
            &self,
            _template: &str,
            _layout: Option<&str>,
            _values: &Map<String, Value>,
            _log: &dyn LogSink,
        ) -> Result<String, RenderError> {
            panic!("renderer exploded")
        }
    }

    struct RequireLogin;

    impl ControllerFilter for RequireLogin {
        fn before(&self, ctx: &mut FilterContext<'_>) -> anyhow::Result<FilterDecision> {
            if ctx.request().get_param("user").is_some() {
                return Ok(FilterDecision::Continue);
            }
            Ok(FilterDecision::Halt(ActionOutcome::redirect("/login")))
        }
    }

    #[test]
    fn test_successful_render_logs_in_order() {
        let (dispatcher, sink) = plain();
        let response = dispatcher.dispatch(&DispatchRequest::get("/logging").request_id("req-1"));

        assert_eq!(response.status(), 200);
        assert_eq!(response.body(), "[logging hello]");

        let events = sink.events();
        assert_eq!(events.len(), 3);

        let start = events[0].fields().unwrap();
        assert_eq!(events[0].logger, DISPATCHER_LOGGER);
        assert_eq!(start.info.as_deref(), Some("executing controller"));
        assert_eq!(start.controller, "app.controllers.LoggingController");
        assert_eq!(start.action, "index");
        assert_eq!(start.method, "GET");
        assert_eq!(start.request_id.as_deref(), Some("req-1"));
        assert_eq!(start.status, None);

        assert_eq!(events[1].logger, VIEWS_LOGGER);
        assert_eq!(
            events[1].text_message(),
            Some("Rendering template: '/logging/index.html' with layout: '/layouts/default_layout.html'.")
        );

        let done = events[2].fields().unwrap();
        assert_eq!(events[2].level, LogLevel::Info);
        assert_eq!(done.info, None);
        assert_eq!(done.status, Some(200));
        assert!(done.duration_millis.is_some());
        assert_eq!(done.request_id.as_deref(), Some("req-1"));
    }

    #[test]
    fn test_missing_controller_logs_once() {
        let (dispatcher, sink) = plain();
        let response = dispatcher.dispatch(&DispatchRequest::get("/fake11"));
        assert_eq!(response.status(), 404);
        assert!(response.body().contains("controller not found: app.controllers.Fake11Controller"));

        let events = sink.events();
        assert_eq!(events.len(), 2);
        let done = events[0].fields().unwrap();
        assert_eq!(done.controller, "");
        assert_eq!(done.action, "");
        assert_eq!(done.status, Some(404));
        assert_eq!(
            done.error.as_deref(),
            Some("controller not found: app.controllers.Fake11Controller")
        );
        assert_eq!(
            events[1].text_message(),
            Some("Rendering template: '/system/404.html' with layout: '/layouts/default_layout.html'.")
        );
    }

    #[test]
    fn test_missing_action() {
        let (dispatcher, sink) = plain();
        let response = dispatcher.dispatch(&DispatchRequest::get("/logging/notfound"));
        assert_eq!(response.status(), 404);

        let events = sink.events();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[0].fields().unwrap().info.as_deref(),
            Some("executing controller")
        );
        let done = events[1].fields().unwrap();
        assert_eq!(done.status, Some(404));
        assert_eq!(
            done.error.as_deref(),
            Some("no such method: app.controllers.LoggingController.notfound()")
        );
        assert!(events[2].text_message().unwrap().contains("/system/404.html"));
    }

    #[test]
    fn test_declared_route_to_unregistered_controller() {
        let (dispatcher, sink) = dispatcher(vec![route("/ghosts").to("ghost")], FilterChain::new());
        let response = dispatcher.dispatch(&DispatchRequest::get("/ghosts"));
        assert_eq!(response.status(), 404);

        let events = sink.events();
        assert_eq!(events[0].fields().unwrap().info.as_deref(), Some("executing controller"));
        assert_eq!(
            events[1].fields().unwrap().error.as_deref(),
            Some("controller not found: app.controllers.GhostController")
        );
    }

    #[test]
    fn test_action_error() {
        let (dispatcher, sink) = plain();
        let response = dispatcher.dispatch(&DispatchRequest::get("/logging/error"));
        assert_eq!(response.status(), 500);
        assert!(response.body().contains("blah!"));

        let events = sink.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[1].level, LogLevel::Error);
        let done = events[1].fields().unwrap();
        assert_eq!(done.status, Some(500));
        assert_eq!(done.error.as_deref(), Some("blah!"));
        let exception = events[1].exception.as_ref().unwrap();
        assert_eq!(exception.message, "blah!");
        assert!(exception.stacktrace.contains("blah!"));
        assert!(events[2].text_message().unwrap().contains("/system/error.html"));
    }

    #[test]
    fn test_action_panic_becomes_500() {
        let (dispatcher, sink) = plain();
        let response = dispatcher.dispatch(&DispatchRequest::get("/logging/panic"));
        assert_eq!(response.status(), 500);

        let events = sink.events();
        let exception = events[1].exception.as_ref().unwrap();
        assert_eq!(exception.message, "boom");
    }

    #[test]
    fn test_missing_view() {
        let (dispatcher, sink) = plain();
        let response = dispatcher.dispatch(&DispatchRequest::get("/logging/no-view"));
        assert_eq!(response.status(), 404);

        let events = sink.events();
        assert_eq!(events.len(), 4);
        assert_eq!(
            events[1].text_message(),
            Some("Rendering template: '/logging/no-view.html' with layout: '/layouts/default_layout.html'.")
        );
        let done = events[2].fields().unwrap();
        assert_eq!(done.status, Some(404));
        assert!(done.error.as_deref().unwrap().starts_with(
            "Failed to render template: '/logging/no-view.html' with layout: '/layouts/default_layout.html'"
        ));
        assert!(events[3].text_message().unwrap().contains("/system/404.html"));
    }

    #[test]
    fn test_redirect() {
        let (dispatcher, sink) = plain();
        let response = dispatcher.dispatch(&DispatchRequest::get("/logging/redirect"));
        assert_eq!(response.status(), 302);
        assert_eq!(response.location(), Some("https://example.com/next"));

        let events = sink.events();
        assert_eq!(events.len(), 2);
        let done = events[1].fields().unwrap();
        assert_eq!(done.status, Some(302));
        assert_eq!(done.url.as_deref(), Some("http://localhost/logging/redirect"));
        assert_eq!(done.redirect_target.as_deref(), Some("https://example.com/next"));
        assert_eq!(done.error, None);
    }

    #[test]
    fn test_parameters_do_not_leak_between_requests() {
        let (dispatcher, _) = plain();
        let first = dispatcher.dispatch(&DispatchRequest::get("/joe?name=joe"));
        assert_eq!(first.body(), "name: joe");

        let second = dispatcher.dispatch(&DispatchRequest::get("/joe"));
        assert_eq!(second.body(), "name: ");
    }

    #[test]
    fn test_blank_parameter_is_preserved() {
        let (dispatcher, _) = plain();
        let response = dispatcher.dispatch(&DispatchRequest::get("/blank_parameter?flag1"));
        assert_eq!(response.body(), "flag1 exists: true, value: ''");

        let response = dispatcher.dispatch(&DispatchRequest::get("/blank_parameter"));
        assert_eq!(response.body(), "flag1 exists: false, value: 'none'");
    }

    #[test]
    fn test_route_params_reach_the_action() {
        let (dispatcher, _) = dispatcher(
            vec![route("/pictures/{id}").to("photos").action("show")],
            FilterChain::new(),
        );
        let response = dispatcher.dispatch(&DispatchRequest::get("/pictures/12?id=99"));
        assert_eq!(response.body(), "photo 12");
    }

    #[test]
    fn test_filters_see_sub_package_path_and_url() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut filters = FilterChain::new();
        filters.add(
            &["level1/level2/registration"],
            Arc::new(Recorder {
                name: "a",
                events: events.clone(),
            }),
        );
        let (dispatcher, _) = dispatcher(vec![], filters);

        let response = dispatcher.dispatch(&DispatchRequest::get("/level1/level2/registration/index"));
        assert_eq!(response.body(), "registered");
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                "a before /level1/level2/registration/index http://localhost/level1/level2/registration/index".to_string(),
                "a after Some(200)".to_string(),
            ]
        );
    }

    #[test]
    fn test_after_filters_run_in_reverse_even_on_failure() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut filters = FilterChain::new();
        filters
            .add_global(Arc::new(Recorder {
                name: "a",
                events: events.clone(),
            }))
            .add_global(Arc::new(Recorder {
                name: "b",
                events: events.clone(),
            }));
        let (dispatcher, _) = dispatcher(vec![], filters);

        let response = dispatcher.dispatch(&DispatchRequest::get("/level1/level2/registration/fail"));
        assert_eq!(response.status(), 500);

        let events = events.lock().unwrap();
        let tags: Vec<String> = events
            .iter()
            .map(|e| e.split(' ').take(2).collect::<Vec<_>>().join(" "))
            .collect();
        assert_eq!(
            tags,
            vec!["a before", "b before", "a exception", "b exception", "b after", "a after"]
        );
        assert!(events.contains(&"a exception registration failed".to_string()));
        assert!(events.contains(&"a after Some(500)".to_string()));
    }

    #[test]
    fn test_halting_filter_skips_action() {
        let mut filters = FilterChain::new();
        filters.add(&["logging"], Arc::new(RequireLogin));
        let (dispatcher, _) = dispatcher(vec![], filters);

        let response = dispatcher.dispatch(&DispatchRequest::get("/logging/error"));
        assert_eq!(response.status(), 302);
        assert_eq!(response.location(), Some("/login"));

        let response = dispatcher.dispatch(&DispatchRequest::get("/logging/error?user=joe"));
        assert_eq!(response.status(), 500);
    }

    #[test]
    fn test_route_conflict_fails_every_request() {
        let (dispatcher, sink) = dispatcher(
            vec![
                route("/photos/{id}").to("photos").action("show"),
                route("/{controller}").to("logging"),
            ],
            FilterChain::new(),
        );

        for path in ["/logging", "/photos/1", "/anything"] {
            let response = dispatcher.dispatch(&DispatchRequest::get(path));
            assert_eq!(response.status(), 500);
            assert_eq!(
                response.body(),
                "Cannot combine {controller} segment and .to(\"...\") method. Failed route: /{controller}"
            );
        }
        assert_eq!(sink.events().len(), 3);
        assert_eq!(sink.events()[0].level, LogLevel::Error);
    }

    #[test]
    fn test_package_conflict_is_500() {
        let (dispatcher, sink) = plain();
        let response = dispatcher.dispatch(&DispatchRequest::get("/api"));
        assert_eq!(response.status(), 500);
        assert!(response.body().contains(
            "Your controller and package named the same: controllerName=  &#39;api&#39; , controllerPackage= &#39;api&#39;"
        ));
        assert_eq!(
            sink.events()[0].fields().unwrap().error.as_deref(),
            Some("Your controller and package named the same: controllerName=  'api' , controllerPackage= 'api'")
        );
    }

    #[test]
    fn test_system_page_escapes_request_text() {
        let (dispatcher, _) = plain();
        let response = dispatcher.dispatch(&DispatchRequest::get("/%3Cscript%3Ealert(1)"));
        assert_eq!(response.status(), 404);
        assert!(!response.body().contains("<script"));
        assert!(response.body().contains("controller not found: app.controllers.&lt;script&gt;alert(1)Controller"));
    }

    #[test]
    fn test_encoded_route_param_reaches_the_action() {
        let (dispatcher, _) = dispatcher(
            vec![route("/greeting/{user_id}").to("greeting").action("hi")],
            FilterChain::new(),
        );
        let response = dispatcher.dispatch(&DispatchRequest::get("/greeting/John%20Doe?q=John%20Doe"));
        assert_eq!(response.status(), 200);
        assert_eq!(response.body(), "user=John Doe q=John Doe");
    }

    #[test]
    fn test_renderer_panic_becomes_500() {
        let router = Router::new(Arc::new(RouteConfig::new()), Arc::new(registry()));
        let sink = Arc::new(MemorySink::new());
        let dispatcher = RequestDispatcher::new(router, Arc::new(ExplodingRenderer), sink.clone());

        let response = dispatcher.dispatch(&DispatchRequest::get("/logging").request_id("req-9"));
        assert_eq!(response.status(), 500);
        assert_eq!(response.content_type(), crate::response::TEXT_PLAIN);
        assert_eq!(
            response.body(),
            "Failed to render template: '/logging/index'; renderer panicked: renderer exploded"
        );

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].fields().unwrap().info.as_deref(), Some("executing controller"));
        assert_eq!(events[1].level, LogLevel::Error);
        let done = events[1].fields().unwrap();
        assert_eq!(done.status, Some(500));
        assert_eq!(done.request_id.as_deref(), Some("req-9"));
        assert_eq!(events[1].exception.as_ref().unwrap().message, "renderer exploded");
    }

    #[test]
    fn test_after_filters_see_action_status_not_render_status() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut filters = FilterChain::new();
        filters.add(
            &["logging"],
            Arc::new(Recorder {
                name: "a",
                events: events.clone(),
            }),
        );
        let (dispatcher, _) = dispatcher(vec![], filters);

        let response = dispatcher.dispatch(&DispatchRequest::get("/logging/no-view"));
        assert_eq!(response.status(), 404);
        assert_eq!(events.lock().unwrap().last().map(String::as_str), Some("a after Some(200)"));
    }

    #[test]
    fn test_system_page_fallback_is_plain_text() {
        let router = Router::new(Arc::new(RouteConfig::new()), Arc::new(registry()));
        let dispatcher = RequestDispatcher::new(
            router,
            Arc::new(Templates::new(".html")),
            Arc::new(MemorySink::new()),
        );
        let response = dispatcher.dispatch(&DispatchRequest::get("/fake11"));
        assert_eq!(response.status(), 404);
        assert_eq!(response.content_type(), crate::response::TEXT_PLAIN);
        assert_eq!(response.body(), "controller not found: app.controllers.Fake11Controller");
    }

    #[test]
    fn test_lifecycle_logging_can_be_disabled() {
        let (dispatcher, sink) = plain();
        let dispatcher = dispatcher.log_requests(false);
        dispatcher.dispatch(&DispatchRequest::get("/logging/redirect"));
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_generated_request_id() {
        let (dispatcher, sink) = plain();
        dispatcher.dispatch(&DispatchRequest::get("/logging/redirect"));
        let events = sink.events();
        let id = events[0].fields().unwrap().request_id.clone().unwrap();
        assert!(Uuid::parse_str(&id).is_ok());
        assert_eq!(events[1].fields().unwrap().request_id.as_deref(), Some(id.as_str()));
    }
}
