use crate::dispatcher::DispatchError;
use crate::request::DispatchRequest;
use crate::response::{TEXT_HTML, TEXT_PLAIN};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Action used when neither the route nor the path names one
pub const DEFAULT_ACTION: &str = "index";

/// A controller action
pub type ActionHandler =
    Arc<dyn Fn(&mut ActionContext<'_>) -> anyhow::Result<ActionOutcome> + Send + Sync>;

/// A named controller and its actions
#[derive(Clone)]
pub struct ControllerDef {
    name: String,
    actions: HashMap<String, ActionHandler>,
}

impl ControllerDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().trim_matches('/').to_string(),
            actions: HashMap::new(),
        }
    }

    /// Register an action under the name used in URLs
    pub fn action<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut ActionContext<'_>) -> anyhow::Result<ActionOutcome> + Send + Sync + 'static,
    {
        self.actions.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn find_action(&self, name: &str) -> Option<&ActionHandler> {
        self.actions.get(name)
    }

    pub fn action_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for ControllerDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerDef")
            .field("name", &self.name)
            .field("actions", &self.action_names())
            .finish()
    }
}

/// Lookup table from controller name to controller.
///
/// Names are path-like (`greeting`, `api/v2/authors`). Every prefix before a
/// `/` is a controller package, which lets the convention router read
/// `/api/v2/authors/show/9` as controller `api/v2/authors`.
#[derive(Debug, Clone)]
pub struct ControllerRegistry {
    root_package: String,
    controllers: HashMap<String, ControllerDef>,
    packages: HashSet<String>,
}

impl Default for ControllerRegistry {
    fn default() -> Self {
        Self::new("app.controllers")
    }
}

impl ControllerRegistry {
    pub fn new(root_package: impl Into<String>) -> Self {
        Self {
            root_package: root_package.into(),
            controllers: HashMap::new(),
            packages: HashSet::new(),
        }
    }

    pub fn register(&mut self, controller: ControllerDef) -> &mut Self {
        // Record every parent package of the name
        let mut prefix = String::new();
        let mut pieces = controller.name.split('/').peekable();
        while let Some(piece) = pieces.next() {
            if pieces.peek().is_none() {
                break;
            }
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(piece);
            self.packages.insert(prefix.clone());
        }
        self.controllers.insert(controller.name.clone(), controller);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.controllers.contains_key(name)
    }

    /// True if some registered controller lives under `name/`
    pub fn is_package(&self, name: &str) -> bool {
        self.packages.contains(name)
    }

    pub fn get(&self, name: &str) -> Option<&ControllerDef> {
        self.controllers.get(name)
    }

    pub fn resolve(&self, name: &str) -> Result<&ControllerDef, DispatchError> {
        self.controllers
            .get(name)
            .ok_or_else(|| DispatchError::ControllerNotFound {
                class_name: self.class_name(name),
            })
    }

    pub fn resolve_action<'a>(
        &self,
        controller: &'a ControllerDef,
        action: &str,
    ) -> Result<&'a ActionHandler, DispatchError> {
        controller
            .find_action(action)
            .ok_or_else(|| DispatchError::ActionNotFound {
                class_name: self.class_name(controller.name()),
                action: action.to_string(),
            })
    }

    /// Fully qualified display name: `api/v2/authors` -> `app.controllers.api.v2.AuthorsController`
    pub fn class_name(&self, name: &str) -> String {
        let mut pieces: Vec<&str> = name.split('/').filter(|p| !p.is_empty()).collect();
        let simple = pieces.pop().map(camelize).unwrap_or_default();

        let mut qualified = self.root_package.clone();
        for package in pieces {
            if !qualified.is_empty() {
                qualified.push('.');
            }
            qualified.push_str(package);
        }
        if !qualified.is_empty() {
            qualified.push('.');
        }
        qualified.push_str(&simple);
        qualified.push_str("Controller");
        qualified
    }

    pub fn root_package(&self) -> &str {
        &self.root_package
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.controllers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}

fn camelize(word: &str) -> String {
    word.split(['_', '-'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Everything an action can see and produce during one request.
/// Built fresh per request; handlers themselves hold no state.
pub struct ActionContext<'a> {
    request: &'a DispatchRequest,
    controller: &'a str,
    action: &'a str,
    route_params: &'a [(String, String)],
    values: Map<String, Value>,
}

impl<'a> ActionContext<'a> {
    pub fn new(
        request: &'a DispatchRequest,
        controller: &'a str,
        action: &'a str,
        route_params: &'a [(String, String)],
    ) -> Self {
        Self {
            request,
            controller,
            action,
            route_params,
            values: Map::new(),
        }
    }

    /// Route parameter if bound, otherwise request parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.route_params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
            .or_else(|| self.request.get_param(name))
    }

    /// Present even when the value is blank
    pub fn exists(&self, name: &str) -> bool {
        self.param(name).is_some()
    }

    pub fn id(&self) -> Option<&str> {
        self.param("id")
    }

    /// Route parameters in segment order
    pub fn route_params(&self) -> &[(String, String)] {
        self.route_params
    }

    pub fn request(&self) -> &DispatchRequest {
        self.request
    }

    pub fn controller(&self) -> &str {
        self.controller
    }

    pub fn action(&self) -> &str {
        self.action
    }

    /// Expose a value to the view
    pub fn assign(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_values(self) -> Map<String, Value> {
        self.values
    }
}

/// Which layout wraps a rendered view
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Layout {
    /// The application's default layout
    #[default]
    Default,
    None,
    Named(String),
}

/// A template render request returned by an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSpec {
    template: Option<String>,
    layout: Layout,
    status: u16,
    content_type: String,
}

impl Default for ViewSpec {
    fn default() -> Self {
        Self {
            template: None,
            layout: Layout::Default,
            status: 200,
            content_type: TEXT_HTML.to_string(),
        }
    }
}

impl ViewSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absolute (`/shared/list`) or relative to the controller (`list`)
    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = Layout::Named(layout.into());
        self
    }

    pub fn no_layout(mut self) -> Self {
        self.layout = Layout::None;
        self
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn response_status(&self) -> u16 {
        self.status
    }

    pub fn response_content_type(&self) -> &str {
        &self.content_type
    }

    pub fn resolve_template(&self, controller: &str, action: &str) -> String {
        match &self.template {
            Some(template) if template.starts_with('/') => template.clone(),
            Some(template) => format!("/{}/{}", controller, template),
            None => format!("/{}/{}", controller, action),
        }
    }

    pub fn resolve_layout(&self, default_layout: Option<&str>) -> Option<String> {
        match &self.layout {
            Layout::Default => default_layout.map(str::to_string),
            Layout::None => None,
            Layout::Named(layout) => Some(layout.clone()),
        }
    }
}

/// What an action (or a halting filter) asks the dispatcher to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    View(ViewSpec),
    Text {
        status: u16,
        content_type: String,
        body: String,
    },
    Redirect {
        status: u16,
        target: String,
    },
}

impl ActionOutcome {
    /// Render the action's default template
    pub fn render() -> Self {
        ActionOutcome::View(ViewSpec::default())
    }

    pub fn view(view: ViewSpec) -> Self {
        ActionOutcome::View(view)
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self::text_with_status(200, body)
    }

    pub fn text_with_status(status: u16, body: impl Into<String>) -> Self {
        ActionOutcome::Text {
            status,
            content_type: TEXT_PLAIN.to_string(),
            body: body.into(),
        }
    }

    pub fn redirect(target: impl Into<String>) -> Self {
        ActionOutcome::Redirect {
            status: 302,
            target: target.into(),
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            ActionOutcome::View(view) => view.status,
            ActionOutcome::Text { status, .. } | ActionOutcome::Redirect { status, .. } => *status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ControllerRegistry {
        let mut registry = ControllerRegistry::new("app.controllers");
        registry
            .register(ControllerDef::new("greeting").action("hi", |_| Ok(ActionOutcome::text("hi"))))
            .register(ControllerDef::new("api/v2/authors"))
            .register(ControllerDef::new("level1/level2/registration"));
        registry
    }

    #[test]
    fn test_packages_are_derived_from_names() {
        let registry = registry();
        assert!(registry.is_package("api"));
        assert!(registry.is_package("api/v2"));
        assert!(registry.is_package("level1/level2"));
        assert!(!registry.is_package("api/v2/authors"));
        assert!(!registry.is_package("greeting"));
    }

    #[test]
    fn test_class_names() {
        let registry = registry();
        assert_eq!(
            registry.class_name("api/v2/authors"),
            "app.controllers.api.v2.AuthorsController"
        );
        assert_eq!(registry.class_name("route_3"), "app.controllers.Route3Controller");
        assert_eq!(registry.class_name("fake11"), "app.controllers.Fake11Controller");
        assert_eq!(
            ControllerRegistry::new("").class_name("blank_parameter"),
            "BlankParameterController"
        );
    }

    #[test]
    fn test_resolve_errors_are_distinguishable() {
        let registry = registry();
        let missing = registry.resolve("fake11").unwrap_err();
        assert_eq!(
            missing.to_string(),
            "controller not found: app.controllers.Fake11Controller"
        );

        let greeting = registry.resolve("greeting").unwrap();
        assert!(registry.resolve_action(greeting, "hi").is_ok());
        let err = registry.resolve_action(greeting, "notfound").err().unwrap();
        assert_eq!(
            err.to_string(),
            "no such method: app.controllers.GreetingController.notfound()"
        );
    }

    #[test]
    fn test_context_prefers_route_params() {
        let request = DispatchRequest::get("/photos/12?id=99&flag1");
        let params = vec![("id".to_string(), "12".to_string())];
        let mut ctx = ActionContext::new(&request, "photos", "show", &params);

        assert_eq!(ctx.id(), Some("12"));
        assert!(ctx.exists("flag1"));
        assert_eq!(ctx.param("flag1"), Some(""));
        assert!(!ctx.exists("missing"));

        ctx.assign("title", "Photo");
        assert_eq!(ctx.value("title"), Some(&Value::from("Photo")));
    }

    #[test]
    fn test_view_resolution() {
        let view = ViewSpec::new();
        assert_eq!(view.resolve_template("logging", "no-view"), "/logging/no-view");
        assert_eq!(
            view.resolve_layout(Some("/layouts/default_layout")),
            Some("/layouts/default_layout".to_string())
        );

        let view = ViewSpec::new().template("list").no_layout();
        assert_eq!(view.resolve_template("books", "index"), "/books/list");
        assert_eq!(view.resolve_layout(Some("/layouts/default_layout")), None);

        let view = ViewSpec::new().template("/shared/list").layout("/layouts/plain");
        assert_eq!(view.resolve_template("books", "index"), "/shared/list");
        assert_eq!(view.resolve_layout(None), Some("/layouts/plain".to_string()));
    }

    #[test]
    fn test_outcome_status() {
        assert_eq!(ActionOutcome::render().status(), 200);
        assert_eq!(ActionOutcome::redirect("/login").status(), 302);
        assert_eq!(ActionOutcome::text_with_status(201, "created").status(), 201);
    }
}
