use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::app::{ErrorStage, Exchange, Request, Stage, StageResult};

/// A server method implementation, called with the server instance.
pub type Handler<S> = Arc<dyn Fn(&S, &mut Exchange) -> StageResult + Send + Sync>;

/// Predicate deciding whether a route accepts a request.
pub type Filter = Arc<dyn Fn(&Request) -> anyhow::Result<bool> + Send + Sync>;

/// Options for a namespace a server provides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceOptions {
    /// Explicit documentation href template; disables auto docs unless `auto` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    /// Force auto documentation on or off
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto: Option<bool>,
    /// Template for the auto documentation page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

impl NamespaceOptions {
    /// Auto documentation is on by default, off when an explicit href is given,
    /// and `auto` overrides both.
    #[must_use]
    pub fn auto_docs(&self) -> bool {
        self.auto.unwrap_or(self.href.is_none())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceProvision {
    pub namespace: String,
    pub options: NamespaceOptions,
}

/// Server-wide middleware. Error handlers are installed after all routes.
#[derive(Clone)]
pub enum ServerMiddleware {
    Request(Stage),
    Error(ErrorStage),
}

impl ServerMiddleware {
    #[must_use]
    pub fn is_error_handler(&self) -> bool {
        matches!(self, ServerMiddleware::Error(_))
    }

    fn same_handler(&self, other: &ServerMiddleware) -> bool {
        match (self, other) {
            (ServerMiddleware::Request(a), ServerMiddleware::Request(b)) => Arc::ptr_eq(a, b),
            (ServerMiddleware::Error(a), ServerMiddleware::Error(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for ServerMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMiddleware::Request(_) => f.write_str("ServerMiddleware::Request"),
            ServerMiddleware::Error(_) => f.write_str("ServerMiddleware::Error"),
        }
    }
}

/// A verb and path template a method answers on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteTemplate {
    pub verb: String,
    pub path: String,
}

/// Options attached to a provided rel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelOptions {
    /// Placeholder name → parameter to read it from when expanding links
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
    /// Listed by the discovery endpoint
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub discoverable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Anything else; carried into the link descriptor untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RelOptions {
    #[must_use]
    pub fn discoverable() -> Self {
        Self {
            discoverable: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_param(mut self, placeholder: &str, source: &str) -> Self {
        self.params.insert(placeholder.to_string(), source.to_string());
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelProvision {
    pub rel: String,
    pub options: RelOptions,
}

/// Options of a hypermedia declaration on a method.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HalOptions {
    /// `Some(false)` suppresses the implicit `self` rel of a GET route;
    /// `Some(true)` adds it to any verb
    #[serde(default, rename = "self", skip_serializing_if = "Option::is_none")]
    pub self_link: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HalDeclaration {
    /// Sibling rels advertised by responses of this method
    pub rels: Vec<String>,
    pub options: HalOptions,
}

/// Declarations for one server method.
pub struct MethodApi<S> {
    pub(crate) name: String,
    pub(crate) routes: Vec<RouteTemplate>,
    pub(crate) provides: Vec<RelProvision>,
    pub(crate) middleware: Vec<Stage>,
    pub(crate) filters: Vec<Filter>,
    pub(crate) hal: Vec<HalDeclaration>,
    pub(crate) handler: Option<Handler<S>>,
}

impl<S> Clone for MethodApi<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            routes: self.routes.clone(),
            provides: self.provides.clone(),
            middleware: self.middleware.clone(),
            filters: self.filters.clone(),
            hal: self.hal.clone(),
            handler: self.handler.clone(),
        }
    }
}

impl<S> fmt::Debug for MethodApi<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodApi")
            .field("name", &self.name)
            .field("routes", &self.routes)
            .field("provides", &self.provides)
            .field("middleware", &self.middleware.len())
            .field("filters", &self.filters.len())
            .field("hal", &self.hal)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

impl<S> MethodApi<S> {
    /// Start declaring the method called `name`.
    ///
    /// Declaring the same name again (typically in an included base api) adds
    /// to this method rather than replacing it.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            routes: Vec::new(),
            provides: Vec::new(),
            middleware: Vec::new(),
            filters: Vec::new(),
            hal: Vec::new(),
            handler: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn route(mut self, verb: &str, path: &str) -> Self {
        self.routes.push(RouteTemplate {
            verb: verb.to_string(),
            path: path.to_string(),
        });
        self
    }

    #[must_use]
    pub fn get(self, path: &str) -> Self {
        self.route("GET", path)
    }

    #[must_use]
    pub fn post(self, path: &str) -> Self {
        self.route("POST", path)
    }

    #[must_use]
    pub fn put(self, path: &str) -> Self {
        self.route("PUT", path)
    }

    #[must_use]
    pub fn delete(self, path: &str) -> Self {
        self.route("DELETE", path)
    }

    /// Declare that the routes of this declaration satisfy `rel`.
    #[must_use]
    pub fn provides(self, rel: &str) -> Self {
        self.provides_with(rel, RelOptions::default())
    }

    #[must_use]
    pub fn provides_with(mut self, rel: &str, options: RelOptions) -> Self {
        self.provides.push(RelProvision {
            rel: rel.to_string(),
            options,
        });
        self
    }

    #[must_use]
    pub fn middleware(mut self, stage: Stage) -> Self {
        self.middleware.push(stage);
        self
    }

    #[must_use]
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Request) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.filters.push(Arc::new(filter));
        self
    }

    /// Make responses of this method hypermedia responses linking `rels`.
    #[must_use]
    pub fn hal(self, rels: &[&str]) -> Self {
        self.hal_with(rels, HalOptions::default())
    }

    #[must_use]
    pub fn hal_with(mut self, rels: &[&str], options: HalOptions) -> Self {
        self.hal.push(HalDeclaration {
            rels: rels.iter().map(|r| (*r).to_string()).collect(),
            options,
        });
        self
    }

    #[must_use]
    pub fn handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&S, &mut Exchange) -> StageResult + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }
}

/// Declarations for a server type.
///
/// Built once per type by [`crate::server::Server::api`]. A derived server
/// reuses its base's declarations with [`ServerApi::include`].
pub struct ServerApi<S> {
    pub(crate) name: String,
    pub(crate) provides: Vec<NamespaceProvision>,
    pub(crate) middleware: Vec<ServerMiddleware>,
    pub(crate) methods: Vec<MethodApi<S>>,
}

impl<S> Clone for ServerApi<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            provides: self.provides.clone(),
            middleware: self.middleware.clone(),
            methods: self.methods.clone(),
        }
    }
}

impl<S> fmt::Debug for ServerApi<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerApi")
            .field("name", &self.name)
            .field("provides", &self.provides)
            .field("middleware", &self.middleware)
            .field("methods", &self.methods)
            .finish()
    }
}

impl<S> ServerApi<S> {
    /// `name` is the server's display name and its default namespace.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            provides: Vec::new(),
            middleware: Vec::new(),
            methods: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append everything `base` declares at this point of the declaration.
    ///
    /// Calling `include` before the server's own declarations gives base-first
    /// order, which is what [`ServerApi::merge`](crate::api::ServerApi::merge)
    /// then preserves.
    #[must_use]
    pub fn include(mut self, base: ServerApi<S>) -> Self {
        self.provides.extend(base.provides);
        self.middleware.extend(base.middleware);
        self.methods.extend(base.methods);
        self
    }

    /// Declare a namespace this server provides rels in.
    #[must_use]
    pub fn provides(self, namespace: &str) -> Self {
        self.provides_with(namespace, NamespaceOptions::default())
    }

    #[must_use]
    pub fn provides_with(mut self, namespace: &str, options: NamespaceOptions) -> Self {
        self.provides.push(NamespaceProvision {
            namespace: namespace.to_string(),
            options,
        });
        self
    }

    /// Server-wide middleware, installed ahead of every route.
    #[must_use]
    pub fn middleware(mut self, stage: Stage) -> Self {
        self.middleware.push(ServerMiddleware::Request(stage));
        self
    }

    /// Server-wide error handler, installed after every route.
    #[must_use]
    pub fn error_middleware(mut self, stage: ErrorStage) -> Self {
        self.middleware.push(ServerMiddleware::Error(stage));
        self
    }

    #[must_use]
    pub fn method(mut self, method: MethodApi<S>) -> Self {
        self.methods.push(method);
        self
    }

    pub(crate) fn dedup_middleware(list: &mut Vec<ServerMiddleware>) {
        let mut kept: Vec<ServerMiddleware> = Vec::with_capacity(list.len());
        for mw in list.drain(..) {
            if !kept.iter().any(|k| k.same_handler(&mw)) {
                kept.push(mw);
            }
        }
        *list = kept;
    }
}
