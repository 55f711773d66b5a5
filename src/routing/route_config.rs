use super::builder::{RouteBuilder, RouteConflictError, RouteSpec};
use super::segment::Segment;
use tracing::{debug, warn};

/// Ordered route declarations.
///
/// Built once during application start-up, then shared behind an `Arc` and
/// only read. Declarations that fail validation are kept as conflicts so that
/// every request served against this table reports them.
#[derive(Debug, Clone, Default)]
pub struct RouteConfig {
    specs: Vec<RouteSpec>,
    conflicts: Vec<RouteConflictError>,
}

impl RouteConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a route; first declared wins at match time
    pub fn route(&mut self, builder: RouteBuilder) -> &mut Self {
        match builder.build() {
            Ok(spec) => {
                debug!("Registering route: {}", spec);
                self.specs.push(spec);
            }
            Err(conflict) => {
                warn!("Rejected route declaration: {}", conflict);
                self.conflicts.push(conflict);
            }
        }
        self
    }

    /// Build a table from a list of declarations
    pub fn from_builders(builders: impl IntoIterator<Item = RouteBuilder>) -> Self {
        let mut config = Self::new();
        for builder in builders {
            config.route(builder);
        }
        config
    }

    pub fn specs(&self) -> &[RouteSpec] {
        &self.specs
    }

    pub fn conflicts(&self) -> &[RouteConflictError] {
        &self.conflicts
    }

    /// Fails with the first rejected declaration
    pub fn validate(&self) -> Result<(), RouteConflictError> {
        match self.conflicts.first() {
            Some(conflict) => Err(conflict.clone()),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Pairs `(earlier, later)` where the earlier route matches every request
    /// the later one would, so the later one is unreachable
    pub fn shadowed(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for (later, spec) in self.specs.iter().enumerate() {
            if let Some(earlier) = self.specs[..later].iter().position(|e| covers(e, spec)) {
                pairs.push((earlier, later));
            }
        }
        pairs
    }
}

fn covers(earlier: &RouteSpec, later: &RouteSpec) -> bool {
    let method_covered = match (earlier.method(), later.method()) {
        (None, _) => true,
        (Some(a), Some(b)) => a == b,
        (Some(_), None) => false,
    };
    // A {controller} segment depends on the registry, so it never covers
    method_covered
        && earlier.segments().len() == later.segments().len()
        && earlier
            .segments()
            .iter()
            .zip(later.segments())
            .all(|(a, b)| match (a, b) {
                (Segment::Static(a), Segment::Static(b)) => a == b,
                (Segment::Controller, _) => false,
                (Segment::Static(_), _) => false,
                (_, Segment::Controller) => false,
                _ => true,
            })
}
