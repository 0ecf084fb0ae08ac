use std::fmt;
use std::sync::Arc;

use super::declare::{
    Filter, HalDeclaration, Handler, NamespaceProvision, RelProvision, RouteTemplate, ServerApi,
    ServerMiddleware,
};
use crate::app::Stage;

/// A rel provided by a route, paired where both were declared together.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteLink {
    pub route: RouteTemplate,
    pub provision: RelProvision,
}

/// Flattened declarations for one method name.
pub struct MethodMetadata<S> {
    pub name: String,
    pub routes: Vec<RouteTemplate>,
    pub provides: Vec<RelProvision>,
    /// Route and rel pairs of every declaration, in declaration order
    pub links: Vec<RouteLink>,
    pub middleware: Vec<Stage>,
    pub filters: Vec<Filter>,
    pub hal: Vec<HalDeclaration>,
    /// The most recently declared implementation
    pub handler: Option<Handler<S>>,
}

impl<S> Clone for MethodMetadata<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            routes: self.routes.clone(),
            provides: self.provides.clone(),
            links: self.links.clone(),
            middleware: self.middleware.clone(),
            filters: self.filters.clone(),
            hal: self.hal.clone(),
            handler: self.handler.clone(),
        }
    }
}

impl<S> fmt::Debug for MethodMetadata<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodMetadata")
            .field("name", &self.name)
            .field("routes", &self.routes)
            .field("provides", &self.provides)
            .field("links", &self.links)
            .field("middleware", &self.middleware.len())
            .field("filters", &self.filters.len())
            .field("hal", &self.hal)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

impl<S> MethodMetadata<S> {
    /// Rels of this method flagged for the discovery endpoint.
    pub fn discoverable_rels(&self) -> impl Iterator<Item = &str> {
        self.provides
            .iter()
            .filter(|p| p.options.discoverable)
            .map(|p| p.rel.as_str())
    }

    /// Rel provisions registered for `route`.
    pub fn links_for<'a>(&'a self, route: &'a RouteTemplate) -> impl Iterator<Item = &'a RelProvision> {
        self.links
            .iter()
            .filter(move |link| link.route == *route)
            .map(|link| &link.provision)
    }
}

/// Flattened declarations for a server type.
pub struct ServerMetadata<S> {
    pub name: String,
    pub namespaces: Vec<NamespaceProvision>,
    pub middleware: Vec<ServerMiddleware>,
    pub methods: Vec<MethodMetadata<S>>,
}

impl<S> Clone for ServerMetadata<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            namespaces: self.namespaces.clone(),
            middleware: self.middleware.clone(),
            methods: self.methods.clone(),
        }
    }
}

impl<S> fmt::Debug for ServerMetadata<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerMetadata")
            .field("name", &self.name)
            .field("namespaces", &self.namespaces)
            .field("middleware", &self.middleware)
            .field("methods", &self.methods)
            .finish()
    }
}

impl<S> ServerMetadata<S> {
    /// The namespace unqualified rels of this server belong to.
    #[must_use]
    pub fn primary_namespace(&self) -> &str {
        self.namespaces
            .first()
            .map_or(self.name.as_str(), |ns| ns.namespace.as_str())
    }

    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MethodMetadata<S>> {
        self.methods.iter().find(|m| m.name == name)
    }
}

fn push_unique<T: PartialEq>(list: &mut Vec<T>, item: T) {
    if !list.contains(&item) {
        list.push(item);
    }
}

fn push_unique_arc<T: ?Sized>(list: &mut Vec<Arc<T>>, item: Arc<T>) {
    if !list.iter().any(|existing| Arc::ptr_eq(existing, &item)) {
        list.push(item);
    }
}

impl<S> ServerApi<S> {
    /// Flatten the declarations into one snapshot.
    ///
    /// Declaration order is preserved everywhere: namespaces and server
    /// middleware in the order declared (included bases at the position of
    /// their `include`), methods in order of first declaration. Entries for the
    /// same method name are appended to each other, never replaced; only the
    /// handler is replaced, by the last one declared. Equal routes, hal
    /// declarations and namespaces are kept once, and the same middleware or
    /// filter `Arc` is kept once. Equal rel provisions are kept once within a
    /// single method declaration but accumulate across declarations.
    ///
    /// A rel is linked to the routes of the declaration that provides it, so
    /// a base and an override that both provide `item` yield two links.
    ///
    /// When nothing declares a namespace, the server name is used.
    #[must_use]
    pub fn merge(&self) -> ServerMetadata<S> {
        let mut namespaces = Vec::with_capacity(self.provides.len());
        for ns in &self.provides {
            push_unique(&mut namespaces, ns.clone());
        }
        if namespaces.is_empty() {
            namespaces.push(NamespaceProvision {
                namespace: self.name.clone(),
                options: Default::default(),
            });
        }

        let mut middleware = self.middleware.clone();
        ServerApi::<S>::dedup_middleware(&mut middleware);

        let mut methods: Vec<MethodMetadata<S>> = Vec::new();
        for declared in &self.methods {
            let idx = match methods.iter().position(|m| m.name == declared.name) {
                Some(idx) => idx,
                None => {
                    methods.push(MethodMetadata {
                        name: declared.name.clone(),
                        routes: Vec::new(),
                        provides: Vec::new(),
                        links: Vec::new(),
                        middleware: Vec::new(),
                        filters: Vec::new(),
                        hal: Vec::new(),
                        handler: None,
                    });
                    methods.len() - 1
                }
            };
            let merged = &mut methods[idx];
            for route in &declared.routes {
                push_unique(&mut merged.routes, route.clone());
            }
            // Provisions are de-duplicated per declaration only, so a base and
            // its override providing the same rel register it twice.
            let mut provides = Vec::with_capacity(declared.provides.len());
            for provision in &declared.provides {
                push_unique(&mut provides, provision.clone());
            }
            let mut routes = Vec::with_capacity(declared.routes.len());
            for route in &declared.routes {
                push_unique(&mut routes, route.clone());
            }
            for route in &routes {
                merged.links.extend(provides.iter().map(|provision| RouteLink {
                    route: route.clone(),
                    provision: provision.clone(),
                }));
            }
            merged.provides.extend(provides);
            for hal in &declared.hal {
                push_unique(&mut merged.hal, hal.clone());
            }
            for mw in &declared.middleware {
                push_unique_arc(&mut merged.middleware, mw.clone());
            }
            for filter in &declared.filters {
                push_unique_arc(&mut merged.filters, filter.clone());
            }
            if declared.handler.is_some() {
                merged.handler = declared.handler.clone();
            }
        }

        ServerMetadata {
            name: self.name.clone(),
            namespaces,
            middleware,
            methods,
        }
    }
}
