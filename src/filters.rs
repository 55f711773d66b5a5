use crate::controller::ActionOutcome;
use crate::request::DispatchRequest;
use crate::routing::HttpMethod;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Result of a before-hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    Continue,
    /// Skip the action (and any later before-hooks) and respond with this outcome
    Halt(ActionOutcome),
}

/// Hooks around controller actions. One instance serves concurrent requests,
/// so request-scoped state belongs in the [`FilterContext`] attributes.
pub trait ControllerFilter: Send + Sync {
    fn before(&self, _ctx: &mut FilterContext<'_>) -> anyhow::Result<FilterDecision> {
        Ok(FilterDecision::Continue)
    }

    /// Runs after the action, also when it failed
    fn after(&self, _ctx: &mut FilterContext<'_>) {}

    fn on_exception(&self, _ctx: &mut FilterContext<'_>, _error: &anyhow::Error) {}

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Read-only request metadata plus request-scoped attributes
pub struct FilterContext<'a> {
    request: &'a DispatchRequest,
    controller: &'a str,
    action: &'a str,
    params: &'a [(String, String)],
    status: Option<u16>,
    attributes: HashMap<String, Value>,
}

impl<'a> FilterContext<'a> {
    pub fn new(
        request: &'a DispatchRequest,
        controller: &'a str,
        action: &'a str,
        params: &'a [(String, String)],
    ) -> Self {
        Self {
            request,
            controller,
            action,
            params,
            status: None,
            attributes: HashMap::new(),
        }
    }

    pub fn path(&self) -> &str {
        self.request.path()
    }

    pub fn method(&self) -> HttpMethod {
        self.request.method()
    }

    pub fn uri(&self) -> &str {
        self.request.uri()
    }

    pub fn url(&self) -> String {
        self.request.url()
    }

    pub fn controller(&self) -> &str {
        self.controller
    }

    pub fn action(&self) -> &str {
        self.action
    }

    pub fn params(&self) -> &[(String, String)] {
        self.params
    }

    pub fn request(&self) -> &DispatchRequest {
        self.request
    }

    /// Status of the action's outcome. Rendering runs after the after-hooks,
/// so a template failure that turns a 200 into a 404 is not reflected here.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: u16) {
        self.status = Some(status);
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }
}

#[derive(Debug, Clone)]
enum FilterScope {
    Global { except: Vec<String> },
    Controllers(Vec<String>),
}

impl FilterScope {
    fn applies_to(&self, controller: &str) -> bool {
        match self {
            FilterScope::Global { except } => !except.iter().any(|c| c == controller),
            FilterScope::Controllers(controllers) => controllers.iter().any(|c| c == controller),
        }
    }
}

#[derive(Clone)]
struct FilterRegistration {
    scope: FilterScope,
    filter: Arc<dyn ControllerFilter>,
}

impl fmt::Debug for FilterRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRegistration")
            .field("scope", &self.scope)
            .field("filter", &self.filter.name())
            .finish()
    }
}

/// Filters in registration order
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    registrations: Vec<FilterRegistration>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run for every controller
    pub fn add_global(&mut self, filter: Arc<dyn ControllerFilter>) -> &mut Self {
        self.add_global_except(filter, &[])
    }

    /// Run for every controller except the listed ones
    pub fn add_global_except(
        &mut self,
        filter: Arc<dyn ControllerFilter>,
        except: &[&str],
    ) -> &mut Self {
        self.registrations.push(FilterRegistration {
            scope: FilterScope::Global {
                except: except.iter().map(|c| c.to_string()).collect(),
            },
            filter,
        });
        self
    }

    /// Run only for the listed controllers
    pub fn add(&mut self, controllers: &[&str], filter: Arc<dyn ControllerFilter>) -> &mut Self {
        self.registrations.push(FilterRegistration {
            scope: FilterScope::Controllers(controllers.iter().map(|c| c.to_string()).collect()),
            filter,
        });
        self
    }

    /// Filters applying to a controller, in before-hook order
    pub fn for_controller(&self, controller: &str) -> Vec<Arc<dyn ControllerFilter>> {
        self.registrations
            .iter()
            .filter(|r| r.scope.applies_to(controller))
            .map(|r| r.filter.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}
