use crate::config::{RouteConfig, TransformValues};
use crate::document::HttpMethod;
use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet};

/// A resolved routing rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub id: String,
    pub cluster_id: Option<String>,
    pub match_path: Option<String>,
    /// Upper-cased method names; `None` accepts every method.
    pub match_methods: Option<BTreeSet<String>>,
    pub transforms: Vec<TransformValues>,
}

impl Route {
    #[must_use]
    pub fn from_config(id: &str, config: &RouteConfig) -> Self {
        Self {
            id: id.to_owned(),
            cluster_id: config.cluster_id.clone().filter(|c| !c.is_empty()),
            match_path: config.route_match.path.clone().filter(|p| !p.is_empty()),
            match_methods: config.route_match.methods.as_ref().map(|methods| {
                methods
                    .iter()
                    .map(|m| m.trim().to_ascii_uppercase())
                    .filter(|m| !m.is_empty())
                    .collect()
            }),
            transforms: config.transforms.clone(),
        }
    }
}

/// Methods published for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodSet {
    Any,
    Only(BTreeSet<String>),
}

impl MethodSet {
    #[must_use]
    pub fn allows(&self, method: HttpMethod) -> bool {
        match self {
            MethodSet::Any => true,
            MethodSet::Only(methods) => methods.contains(method.as_str()),
        }
    }

    /// Widen with another route's methods; `None` widens to [`MethodSet::Any`].
    fn union(&mut self, methods: Option<&BTreeSet<String>>) {
        match methods {
            None => *self = MethodSet::Any,
            Some(more) => {
                if let MethodSet::Only(existing) = self {
                    existing.extend(more.iter().cloned());
                }
            }
        }
    }
}

/// Whitelist of paths (and their methods) reachable through configured routes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishedPaths {
    paths: BTreeMap<String, MethodSet>,
}

impl PublishedPaths {
    #[must_use]
    pub fn from_routes(routes: &[Route]) -> Self {
        let mut paths: BTreeMap<String, MethodSet> = BTreeMap::new();
        for route in routes {
            let Some(path) = &route.match_path else {
                continue;
            };
            match paths.get_mut(path) {
                Some(existing) => existing.union(route.match_methods.as_ref()),
                None => {
                    let methods = route
                        .match_methods
                        .clone()
                        .map_or(MethodSet::Any, MethodSet::Only);
                    paths.insert(path.clone(), methods);
                }
            }
        }
        Self { paths }
    }

    #[must_use]
    pub fn methods(&self, path: &str) -> Option<&MethodSet> {
        self.paths.get(path)
    }

    #[must_use]
    pub fn allows(&self, path: &str, method: HttpMethod) -> bool {
        self.methods(path).is_some_and(|m| m.allows(method))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Resolved routes in configuration order, with the derived whitelist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    routes: Vec<Route>,
    published: PublishedPaths,
}

impl RouteTable {
    #[must_use]
    pub fn new(routes: Vec<Route>) -> Self {
        let published = PublishedPaths::from_routes(&routes);
        Self { routes, published }
    }

    #[must_use]
    pub fn from_config(routes: &IndexMap<String, RouteConfig>) -> Self {
        Self::new(
            routes
                .iter()
                .map(|(id, config)| Route::from_config(id, config))
                .collect(),
        )
    }

    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    #[must_use]
    pub fn published_paths(&self) -> &PublishedPaths {
        &self.published
    }

    /// Transform directives of every route owned by `cluster_id`, flattened in route order.
    #[must_use]
    pub fn transforms_for_cluster(&self, cluster_id: &str) -> Vec<&TransformValues> {
        self.routes
            .iter()
            .filter(|route| route.cluster_id.as_deref() == Some(cluster_id))
            .flat_map(|route| route.transforms.iter())
            .collect()
    }
}
