use super::builder::{HttpMethod, RouteSpec};
use super::route_config::RouteConfig;
use super::segment::{decode_segment, split_path, Segment};
use crate::controller::{ControllerRegistry, DEFAULT_ACTION};
use std::sync::Arc;
use tracing::debug;

/// A recognized request: which controller and action to run, with bound parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult<'a> {
    /// Registry name of the controller
    pub controller: String,
    pub action: String,
    /// `id` and user segment values in left-to-right segment order
    pub params: Vec<(String, String)>,
    /// The declared route, or `None` for the convention fallback
    pub route: Option<&'a RouteSpec>,
}

impl MatchResult<'_> {
    pub fn get_param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_convention(&self) -> bool {
        self.route.is_none()
    }
}

/// Why a path could not be routed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("controller not found: {class_name}")]
    ControllerNotFound { class_name: String },

    #[error("Your controller and package named the same: controllerName=  '{name}' , controllerPackage= '{name}'")]
    PackageConflict { name: String },

    #[error("no route matches path: {path}")]
    NoRoute { path: String },
}

impl RouteError {
    pub fn status(&self) -> u16 {
        match self {
            RouteError::PackageConflict { .. } => 500,
            RouteError::ControllerNotFound { .. } | RouteError::NoRoute { .. } => 404,
        }
    }
}

/// Maps `(method, path)` to a controller action.
///
/// Declared routes are tried first, in declaration order; the first one that
/// matches wins. Otherwise the path is read by convention as
/// `/{package...}/{controller}/{action}/{id}`.
#[derive(Debug, Clone)]
pub struct Router {
    config: Arc<RouteConfig>,
    registry: Arc<ControllerRegistry>,
    root_controller: String,
}

impl Router {
    pub fn new(config: Arc<RouteConfig>, registry: Arc<ControllerRegistry>) -> Self {
        Self {
            config,
            registry,
            root_controller: "home".to_string(),
        }
    }

    /// Controller serving `/` when no declared route does
    pub fn with_root_controller(mut self, name: impl Into<String>) -> Self {
        self.root_controller = name.into();
        self
    }

    pub fn config(&self) -> &RouteConfig {
        &self.config
    }

    pub fn registry(&self) -> &ControllerRegistry {
        &self.registry
    }

    pub fn recognize(&self, method: HttpMethod, path: &str) -> Result<MatchResult<'_>, RouteError> {
        // Split first so an encoded `/` stays inside its component
        let decoded: Vec<_> = split_path(path).map(decode_segment).collect();
        let segments: Vec<&str> = decoded.iter().map(|s| s.as_ref()).collect();

        for spec in self.config.specs() {
            if let Some(matched) = self.match_spec(spec, method, &segments) {
                debug!(
                    "Route {} matched {} {} -> {}#{}",
                    spec.pattern(),
                    method,
                    path,
                    matched.controller,
                    matched.action
                );
                return Ok(matched);
            }
        }

        self.recognize_convention(path, &segments)
    }

    fn match_spec<'a>(
        &self,
        spec: &'a RouteSpec,
        method: HttpMethod,
        segments: &[&str],
    ) -> Option<MatchResult<'a>> {
        if !spec.accepts(method) || spec.segments().len() != segments.len() {
            return None;
        }

        let mut controller = spec.controller().map(str::to_string);
        let mut action = spec.action().map(str::to_string);
        let mut params = Vec::new();

        for (index, (segment, value)) in spec.segments().iter().zip(segments).enumerate() {
            match segment {
                Segment::Static(text) => {
                    if text != value {
                        return None;
                    }
                }
                Segment::Controller => {
                    controller = Some(self.controller_in_package(&spec.segments()[..index], value)?);
                }
                Segment::Action => action = Some(value.to_string()),
                Segment::Id => params.push(("id".to_string(), value.to_string())),
                Segment::User(name) => params.push((name.clone(), value.to_string())),
            }
        }

        Some(MatchResult {
            controller: controller?,
            action: action.unwrap_or_else(|| DEFAULT_ACTION.to_string()),
            params,
            route: Some(spec),
        })
    }

    /// A `{controller}` value only matches a registered controller, looked up
    /// first inside the package spelled by the static segments before it
    fn controller_in_package(&self, preceding: &[Segment], value: &str) -> Option<String> {
        let package: Option<Vec<&str>> = preceding
            .iter()
            .map(|segment| match segment {
                Segment::Static(text) => Some(text.as_str()),
                _ => None,
            })
            .collect();

        if let Some(package) = package.filter(|p| !p.is_empty()) {
            let package = package.join("/");
            let qualified = format!("{}/{}", package, value);
            if self.registry.is_package(&package) && self.registry.contains(&qualified) {
                return Some(qualified);
            }
        }

        self.registry
            .contains(value)
            .then(|| value.to_string())
    }

    fn recognize_convention(
        &self,
        path: &str,
        segments: &[&str],
    ) -> Result<MatchResult<'static>, RouteError> {
        if segments.is_empty() {
            return Ok(MatchResult {
                controller: self.root_controller.clone(),
                action: DEFAULT_ACTION.to_string(),
                params: Vec::new(),
                route: None,
            });
        }

        // Packages are prefix-closed, so the longest package is a leading run
        let mut package_len = 0;
        for len in 1..=segments.len() {
            if self.registry.is_package(&segments[..len].join("/")) {
                package_len = len;
            } else {
                break;
            }
        }

        if package_len == segments.len() {
            let name = segments.join("/");
            if self.registry.contains(&name) {
                return Err(RouteError::PackageConflict {
                    name: segments[package_len - 1].to_string(),
                });
            }
            return Err(RouteError::ControllerNotFound {
                class_name: self.registry.class_name(&name),
            });
        }

        let controller = segments[..=package_len].join("/");
        if !self.registry.contains(&controller) {
            return Err(RouteError::ControllerNotFound {
                class_name: self.registry.class_name(&controller),
            });
        }

        let rest = &segments[package_len + 1..];
        if rest.len() > 2 {
            return Err(RouteError::NoRoute {
                path: path.to_string(),
            });
        }

        let action = rest.first().copied().unwrap_or(DEFAULT_ACTION).to_string();
        let params = rest
            .get(1)
            .map(|id| vec![("id".to_string(), id.to_string())])
            .unwrap_or_default();

        Ok(MatchResult {
            controller,
            action,
            params,
            route: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ControllerDef;
    use crate::routing::route;

    fn registry() -> Arc<ControllerRegistry> {
        let mut registry = ControllerRegistry::new("app.controllers");
        for name in [
            "home",
            "route1",
            "route2",
            "route_3",
            "route_4",
            "route5",
            "segment_route3",
            "simple_value",
            "student",
            "api",
            "api/test",
            "api/api_home",
            "api/v2/authors",
            "level1/level2/registration",
        ] {
            registry.register(ControllerDef::new(name));
        }
        Arc::new(registry)
    }

    fn router(builders: Vec<crate::routing::RouteBuilder>) -> Router {
        Router::new(Arc::new(RouteConfig::from_builders(builders)), registry())
    }

    #[test]
    fn test_root_route() {
        let router = router(vec![route("/").to("route1")]);
        let matched = router.recognize(HttpMethod::Get, "/").unwrap();
        assert_eq!(matched.controller, "route1");
        assert_eq!(matched.action, "index");
        assert!(!matched.is_convention());
    }

    #[test]
    fn test_builtin_segments_are_positional() {
        let router = router(vec![route("/{action}/{controller}/{id}")]);
        let matched = router.recognize(HttpMethod::Get, "/show/route_3/1").unwrap();
        assert_eq!(matched.controller, "route_3");
        assert_eq!(matched.action, "show");
        assert_eq!(matched.get_param("id"), Some("1"));
    }

    #[test]
    fn test_user_segments_keep_order_and_names() {
        let router = router(vec![
            route("/greeting/{user_id}/from_mars/{fav_color}/{action}/{id}").to("segment_route3"),
        ]);
        let matched = router
            .recognize(HttpMethod::Get, "/greeting/1/from_mars/blue/greeting/123")
            .unwrap();
        assert_eq!(matched.controller, "segment_route3");
        assert_eq!(matched.action, "greeting");
        assert_eq!(
            matched.params,
            vec![
                ("user_id".to_string(), "1".to_string()),
                ("fav_color".to_string(), "blue".to_string()),
                ("id".to_string(), "123".to_string()),
            ]
        );
    }

    #[test]
    fn test_builtin_and_user_segments() {
        let router = router(vec![route("/{action}/{controller}/{id}/{user_name}/{user_color}")]);
        let matched = router.recognize(HttpMethod::Get, "/edit/route_4/1/alex/blue").unwrap();
        assert_eq!(matched.controller, "route_4");
        assert_eq!(matched.action, "edit");
        let names: Vec<&str> = matched.params.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["id", "user_name", "user_color"]);
    }

    #[test]
    fn test_encoded_segments_are_decoded() {
        let router = router(vec![route("/greeting/{user_id}").to("route2").action("hi")]);
        let matched = router
            .recognize(HttpMethod::Get, "/greeting/John%20Doe")
            .unwrap();
        assert_eq!(matched.get_param("user_id"), Some("John Doe"));

        let matched = router.recognize(HttpMethod::Get, "/greeting/a%2Fb").unwrap();
        assert_eq!(matched.get_param("user_id"), Some("a/b"));
    }

    #[test]
    fn test_encoded_static_segment_matches() {
        let router = router(vec![route("/my photos/{id}").to("route5").action("show")]);
        let matched = router.recognize(HttpMethod::Get, "/my%20photos/3").unwrap();
        assert_eq!(matched.controller, "route5");
    }

    #[test]
    fn test_first_declared_route_wins() {
        let router = router(vec![
            route("/photos/{id}").to("route5").action("show"),
            route("/photos/{id}").to("route2").action("other"),
        ]);
        let matched = router.recognize(HttpMethod::Get, "/photos/12").unwrap();
        assert_eq!(matched.controller, "route5");
        assert_eq!(matched.route.unwrap().pattern(), "/photos/{id}");
        assert_eq!(matched.route.unwrap().action(), Some("show"));
    }

    #[test]
    fn test_segment_count_must_match() {
        let router = router(vec![route("/greeting/{user_id}").to("route2").action("hi")]);
        assert!(router.recognize(HttpMethod::Get, "/greeting/alex").is_ok());
        let err = router.recognize(HttpMethod::Get, "/greeting/alex/extra").unwrap_err();
        assert!(matches!(err, RouteError::ControllerNotFound { .. }));
    }

    #[test]
    fn test_method_mismatch_falls_through_to_convention() {
        let router = router(vec![route("/greeting").to("route2").post().action("hi")]);
        let err = router.recognize(HttpMethod::Get, "/greeting").unwrap_err();
        assert_eq!(
            err.to_string(),
            "controller not found: app.controllers.GreetingController"
        );
        assert_eq!(err.status(), 404);

        let matched = router.recognize(HttpMethod::Post, "/greeting").unwrap();
        assert_eq!(matched.controller, "route2");
    }

    #[test]
    fn test_controller_segment_requires_registered_controller() {
        let router = router(vec![
            route("/{controller}/{id}").action("show"),
            route("/photos/{id}").to("route5").action("show"),
        ]);
        let matched = router.recognize(HttpMethod::Get, "/photos/12").unwrap();
        assert_eq!(matched.controller, "route5");
    }

    #[test]
    fn test_controller_segment_inside_package() {
        let router = router(vec![route("/api/v2/{controller}/{aut_id}").action("find_by_id")]);
        let matched = router.recognize(HttpMethod::Get, "/api/v2/authors/9/").unwrap();
        assert_eq!(matched.controller, "api/v2/authors");
        assert_eq!(matched.get_param("aut_id"), Some("9"));
    }

    #[test]
    fn test_convention_fallback() {
        let router = router(vec![]);
        let matched = router.recognize(HttpMethod::Get, "/student").unwrap();
        assert_eq!(matched.controller, "student");
        assert_eq!(matched.action, "index");
        assert!(matched.is_convention());

        let matched = router.recognize(HttpMethod::Get, "/student/show/7").unwrap();
        assert_eq!(matched.action, "show");
        assert_eq!(matched.get_param("id"), Some("7"));

        let matched = router.recognize(HttpMethod::Get, "/").unwrap();
        assert_eq!(matched.controller, "home");
    }

    #[test]
    fn test_convention_sub_packages() {
        let router = router(vec![]);
        let matched = router
            .recognize(HttpMethod::Get, "/level1/level2/registration/index")
            .unwrap();
        assert_eq!(matched.controller, "level1/level2/registration");
        assert_eq!(matched.action, "index");
    }

    #[test]
    fn test_custom_route_does_not_swallow_sub_package_paths() {
        let router = router(vec![route("/api").to("api/api_home").action("index").get()]);
        let matched = router.recognize(HttpMethod::Get, "/api/test").unwrap();
        assert_eq!(matched.controller, "api/test");
        assert_eq!(matched.action, "index");
    }

    #[test]
    fn test_package_and_controller_named_the_same() {
        let router = router(vec![route("/api").to("api").action("index").get()]);
        assert_eq!(router.recognize(HttpMethod::Get, "/api").unwrap().controller, "api");

        let router = Router::new(Arc::new(RouteConfig::new()), registry());
        let err = router.recognize(HttpMethod::Get, "/api").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Your controller and package named the same: controllerName=  'api' , controllerPackage= 'api'"
        );
        assert_eq!(err.status(), 500);
    }

    #[test]
    fn test_missing_controller() {
        let router = router(vec![]);
        let err = router.recognize(HttpMethod::Get, "/fake11").unwrap_err();
        assert_eq!(
            err,
            RouteError::ControllerNotFound {
                class_name: "app.controllers.Fake11Controller".to_string()
            }
        );
    }

    #[test]
    fn test_too_many_segments() {
        let router = router(vec![]);
        let err = router.recognize(HttpMethod::Get, "/student/show/7/extra").unwrap_err();
        assert!(matches!(err, RouteError::NoRoute { .. }));
    }

    #[test]
    fn test_root_controller_override() {
        let router = router(vec![]).with_root_controller("student");
        assert_eq!(router.recognize(HttpMethod::Get, "/").unwrap().controller, "student");
    }
}
