use http::Method;
use once_cell::sync::OnceCell;
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

use crate::api::{MethodMetadata, RelOptions, RouteTemplate, ServerApi, ServerMetadata, ServerMiddleware};
use crate::app::{parse_method, stage, App, AppError, Exchange, Flow, Stage};
use crate::docs::{collect_routes, DocsContext, MiniJinjaRenderer, Renderer};
use crate::hal::{HalResponse, LinkContext};
use crate::ids::ServerId;
use crate::linker::{
    DocsEntry, LinkEntry, LinkOptions, LinkOwner, Linker, Owner, REL_SEPARATOR, SELF_REL,
};
use crate::runtime_config::RuntimeConfig;
use crate::template::{compile, CompiledPath, TemplateError};

/// Path parameter of a documentation href that names the rel.
pub const REL_PARAM: &str = "rel";

/// A type that declares routes and rels.
///
/// ```rust
/// use halrouter::api::{MethodApi, ServerApi};
/// use halrouter::app::{Flow, Request};
/// use halrouter::linker::Linker;
/// use halrouter::server::{HalServer, Server};
/// use std::sync::Arc;
///
/// struct Hello;
///
/// impl Server for Hello {
///     fn api() -> ServerApi<Self> {
///         ServerApi::new("Hello").method(
///             MethodApi::new("hello").get("/hello").handler(|_, ex| {
///                 ex.res.send("hi");
///                 Ok(Flow::Done)
///             }),
///         )
///     }
/// }
///
/// let server = HalServer::with_linker(Hello, Arc::new(Linker::new()));
/// let res = server.app().dispatch(Request::get("/hello"));
/// assert_eq!(res.body_text(), "hi");
/// ```
pub trait Server: Send + Sync + Sized + 'static {
    /// Declarations of this server type; derived types `include` their base's.
    fn api() -> ServerApi<Self>;
}

/// A declaration that could not be installed. Composition logs it and carries on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposeError {
    /// A route's verb cannot be routed
    Method {
        method: String,
        source: AppError,
    },
    /// A route's path is not a valid template
    Template {
        method: String,
        source: TemplateError,
    },
    /// A namespace's documentation href is not a valid template
    DocsHref {
        namespace: String,
        source: TemplateError,
    },
    /// A method declares routes but no implementation
    MissingHandler {
        method: String,
    },
}

impl fmt::Display for ComposeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComposeError::Method { source, .. } => write!(f, "{}", source),
            ComposeError::Template { method, source } => {
                write!(f, "method '{}': {}", method, source)
            }
            ComposeError::DocsHref { namespace, source } => {
                write!(f, "namespace '{}' documentation: {}", namespace, source)
            }
            ComposeError::MissingHandler { method } => {
                write!(f, "method '{}' has routes but no handler", method)
            }
        }
    }
}

impl std::error::Error for ComposeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ComposeError::Method { source, .. } => Some(source),
            ComposeError::Template { source, .. } | ComposeError::DocsHref { source, .. } => {
                Some(source)
            }
            ComposeError::MissingHandler { .. } => None,
        }
    }
}

/// Identity of a composed server as seen by the linker.
struct ServerOwner {
    id: ServerId,
    name: String,
    declared: OnceCell<Declared>,
}

/// What the linker needs to know about a server's declarations, fixed at
/// composition.
struct Declared {
    namespace: String,
    discoverable: Vec<String>,
}

impl LinkOwner for ServerOwner {
    fn id(&self) -> ServerId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn discoverable_rels(&self) -> Vec<String> {
        self.declared
            .get()
            .map(|d| d.discoverable.clone())
            .unwrap_or_default()
    }

    fn primary_namespace(&self) -> Option<String> {
        self.declared.get().map(|d| d.namespace.clone())
    }
}

struct Composed {
    app: Arc<App>,
    skipped: Vec<ComposeError>,
}

/// A server instance together with the app its declarations compose into.
///
/// Composition runs once, on the first call to [`HalServer::app`] (or
/// [`HalServer::skipped`]); concurrent first calls wait for the same build.
pub struct HalServer<S: Server> {
    server: Arc<S>,
    owner: Arc<ServerOwner>,
    linker: Arc<Linker>,
    config: RuntimeConfig,
    renderer: Arc<dyn Renderer>,
    composed: OnceCell<Composed>,
}

impl<S: Server> fmt::Debug for HalServer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HalServer")
            .field("id", &self.owner.id)
            .field("name", &self.owner.name)
            .field("composed", &self.composed.get().is_some())
            .finish()
    }
}

/// Prefix root-relative `href` with `base`.
fn relative(base: &str, href: &str) -> String {
    if href.starts_with('/') {
        format!("{}{}", base.trim_end_matches('/'), href)
    } else {
        href.to_string()
    }
}

fn qualify(namespace: &str, rel: &str) -> String {
    if rel.contains(REL_SEPARATOR) {
        rel.to_string()
    } else {
        format!("{}{}{}", namespace, REL_SEPARATOR, rel)
    }
}

/// Hal rels of `method` in first-declared order, plus `self` when the route
/// gets one. The last declaration that sets the `self` option decides; with
/// none, GET routes link themselves.
fn envelope_rels<S>(method: &MethodMetadata<S>, verb: &Method) -> Vec<String> {
    let mut rels: Vec<String> = Vec::new();
    let mut self_link = None;
    for decl in &method.hal {
        for rel in &decl.rels {
            if !rels.contains(rel) {
                rels.push(rel.clone());
            }
        }
        if decl.options.self_link.is_some() {
            self_link = decl.options.self_link;
        }
    }
    if self_link.unwrap_or(*verb == Method::GET) && !rels.iter().any(|r| r == SELF_REL) {
        rels.push(SELF_REL.to_string());
    }
    rels
}

fn autodoc(
    linker: Arc<Linker>,
    renderer: Arc<dyn Renderer>,
    namespace: String,
    template: String,
) -> Stage {
    stage(move |ex| {
        let rel = match ex.req.get_path_param(REL_PARAM) {
            Some(rel) if !rel.is_empty() => rel.to_string(),
            _ => {
                ex.res.send_status(404);
                return Ok(Flow::Done);
            }
        };
        let routes = collect_routes(&linker, &namespace, &rel);
        if routes.is_empty() {
            debug!(namespace = %namespace, rel = %rel, "No routes documented for rel");
            ex.res.send_status(404);
            return Ok(Flow::Done);
        }
        let page = renderer.render(
            &template,
            &DocsContext {
                ns: namespace.clone(),
                rel,
                routes,
            },
        )?;
        ex.res.status(200).send(page);
        Ok(Flow::Done)
    })
}

/// Handler listing every discoverable rel of every server known to `linker`.
///
/// Mount it wherever the entry point of the api should be:
///
/// ```rust
/// use halrouter::app::{App, Request};
/// use halrouter::linker::Linker;
/// use halrouter::server::discovery;
/// use halrouter::template::compile;
/// use std::sync::Arc;
///
/// let app = App::new();
/// app.get(&compile("/").unwrap(), vec![discovery(Arc::new(Linker::new()))]).unwrap();
/// assert_eq!(app.dispatch(Request::get("/")).status, 200);
/// ```
#[must_use]
pub fn discovery(linker: Arc<Linker>) -> Stage {
    stage(move |ex: &mut Exchange| {
        let mut hal = HalResponse::create(linker.clone(), None, ex.req.original_path(), &[], &ex.req);
        for owner in linker.servers() {
            for rel in owner.discoverable_rels() {
                hal.link(&rel, &LinkContext::server(owner.id()));
            }
        }
        hal.json(&mut ex.res, json!({}));
        Ok(Flow::Done)
    })
}

impl<S: Server> HalServer<S> {
    /// Wrap `server`, registering into the process-wide linker with
    /// configuration from the environment.
    #[must_use]
    pub fn new(server: S) -> Self {
        Self::with_linker(server, Linker::global())
    }

    /// Wrap `server`, registering into `linker`.
    #[must_use]
    pub fn with_linker(server: S, linker: Arc<Linker>) -> Self {
        Self::from_arc(Arc::new(server), linker)
    }

    #[must_use]
    pub fn from_arc(server: Arc<S>, linker: Arc<Linker>) -> Self {
        let name = S::api().name().to_string();
        Self {
            server,
            owner: Arc::new(ServerOwner {
                id: ServerId::new(),
                name,
                declared: OnceCell::new(),
            }),
            linker,
            config: RuntimeConfig::from_env(),
            renderer: Arc::new(MiniJinjaRenderer),
            composed: OnceCell::new(),
        }
    }

    /// Replace the configuration. Has no effect once composed.
    #[must_use]
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the documentation renderer. Has no effect once composed.
    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    #[must_use]
    pub fn id(&self) -> ServerId {
        self.owner.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.owner.name
    }

    #[must_use]
    pub fn server(&self) -> &Arc<S> {
        &self.server
    }

    #[must_use]
    pub fn linker(&self) -> &Arc<Linker> {
        &self.linker
    }

    /// Merged declarations of `S`.
    #[must_use]
    pub fn metadata(&self) -> ServerMetadata<S> {
        S::api().merge()
    }

    /// The composed app, composing on first access.
    pub fn app(&self) -> Arc<App> {
        self.composed().app.clone()
    }

    /// Declarations composition had to skip.
    pub fn skipped(&self) -> &[ComposeError] {
        &self.composed().skipped
    }

    /// True once composition has run.
    #[must_use]
    pub fn is_composed(&self) -> bool {
        self.composed.get().is_some()
    }

    /// Mount the composed app under `prefix` of `parent`.
    pub fn mount_into(&self, parent: &Arc<App>, prefix: &str) {
        parent.mount(prefix, self.app());
    }

    fn composed(&self) -> &Composed {
        self.composed.get_or_init(|| self.compose())
    }

    fn compose(&self) -> Composed {
        let metadata = self.metadata();
        let owner: Owner = self.owner.clone();
        let app = Arc::new(App::new());
        let mut skipped = Vec::new();

        let declared = self.owner.declared.get_or_init(|| {
            let mut discoverable: Vec<String> = Vec::new();
            for rel in metadata.methods.iter().flat_map(|m| m.discoverable_rels()) {
                if !discoverable.iter().any(|r| r == rel) {
                    discoverable.push(rel.to_string());
                }
            }
            Declared {
                namespace: metadata.primary_namespace().to_string(),
                discoverable,
            }
        });

        for provision in &metadata.namespaces {
            let namespace = &provision.namespace;
            let href = provision
                .options
                .href
                .clone()
                .unwrap_or_else(|| self.config.docs_href(namespace));
            if !href.starts_with('/') {
                // Off-site docs are advertised through curies, never served here
                self.linker.register_docs(&owner, namespace, &href);
                if provision.options.auto_docs() {
                    warn!(
                        namespace = %namespace,
                        href = %href,
                        "Documentation href is not root-relative; auto docs not installed"
                    );
                }
                continue;
            }
            let path = match compile(&href) {
                Ok(path) => path,
                Err(source) => {
                    let err = ComposeError::DocsHref {
                        namespace: namespace.clone(),
                        source,
                    };
                    error!(server = %self.owner.name, error = %err, "Skipping namespace documentation");
                    skipped.push(err);
                    continue;
                }
            };
            self.linker.register_docs(&owner, namespace, &href);

            if provision.options.auto_docs() {
                if !path.params().any(|p| p == REL_PARAM) {
                    warn!(
                        namespace = %namespace,
                        href = %href,
                        "Documentation href has no :rel placeholder; every request will answer 404"
                    );
                }
                let template = provision
                    .options
                    .template
                    .clone()
                    .unwrap_or_else(|| self.config.docs_template.clone());
                let handler = autodoc(
                    self.linker.clone(),
                    self.renderer.clone(),
                    namespace.clone(),
                    template,
                );
                if let Err(e) = app.get(&path, vec![handler]) {
                    error!(namespace = %namespace, error = %e, "Cannot install documentation route");
                }
            }
        }

        for mw in &metadata.middleware {
            if let ServerMiddleware::Request(stage) = mw {
                app.use_stage(stage.clone());
            }
        }

        let mut installed = 0usize;
        for method in &metadata.methods {
            for route in &method.routes {
                match self.install_route(&app, &owner, &declared.namespace, method, route) {
                    Ok(()) => installed += 1,
                    Err(err) => {
                        error!(
                            server = %self.owner.name,
                            method = %method.name,
                            verb = %route.verb,
                            path = %route.path,
                            error = %err,
                            "Skipping route"
                        );
                        skipped.push(err);
                    }
                }
            }
        }

        for mw in &metadata.middleware {
            if let ServerMiddleware::Error(stage) = mw {
                app.use_error(stage.clone());
            }
        }

        let weak: Weak<App> = Arc::downgrade(&app);
        self.linker.set_link_callback(self.owner.id, {
            let weak = weak.clone();
            move |mut entry: LinkEntry| {
                if let Some(app) = weak.upgrade() {
                    entry.href = relative(&app.path(), &entry.href);
                }
                entry
            }
        });
        self.linker.set_docs_callback(self.owner.id, move |mut entry: DocsEntry| {
            if let Some(app) = weak.upgrade() {
                entry.href = relative(&app.path(), &entry.href);
            }
            entry
        });

        info!(
            server = %self.owner.name,
            id = %self.owner.id,
            namespaces = metadata.namespaces.len(),
            routes = installed,
            skipped = skipped.len(),
            "Server composed"
        );

        Composed { app, skipped }
    }

    fn install_route(
        &self,
        app: &App,
        owner: &Owner,
        namespace: &str,
        method: &MethodMetadata<S>,
        route: &RouteTemplate,
    ) -> Result<(), ComposeError> {
        let verb = parse_method(&route.verb).map_err(|source| ComposeError::Method {
            method: method.name.clone(),
            source,
        })?;
        let path = compile(&route.path).map_err(|source| ComposeError::Template {
            method: method.name.clone(),
            source,
        })?;
        let handler = method
            .handler
            .clone()
            .ok_or_else(|| ComposeError::MissingHandler {
                method: method.name.clone(),
            })?;

        let rels = envelope_rels(method, &verb);
        let mut registered_self = false;
        for provision in method.links_for(route) {
            let bindings: HashMap<String, String> = provision
                .options
                .params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            registered_self |= provision.rel == SELF_REL;
            self.register_rel(owner, namespace, &provision.rel, path.bind(&bindings), &verb, &rels, &provision.options);
        }
        if !registered_self && rels.iter().any(|r| r == SELF_REL) {
            self.register_rel(owner, namespace, SELF_REL, path.clone(), &verb, &rels, &RelOptions::default());
        }

        let mut stages: Vec<Stage> = Vec::with_capacity(method.middleware.len() + method.filters.len() + 2);
        if !method.hal.is_empty() {
            let linker = self.linker.clone();
            let id = self.owner.id;
            let rels = rels.clone();
            stages.push(stage(move |ex| {
                let hal = HalResponse::create(linker.clone(), Some(id), ex.req.original_path(), &rels, &ex.req);
                ex.extensions.insert(hal);
                Ok(Flow::Next)
            }));
        }
        stages.extend(method.middleware.iter().cloned());
        for filter in &method.filters {
            let filter = filter.clone();
            stages.push(stage(move |ex| {
                if filter(&ex.req)? {
                    Ok(Flow::Next)
                } else {
                    Ok(Flow::Route)
                }
            }));
        }
        let server = self.server.clone();
        stages.push(stage(move |ex| handler(&*server, ex)));

        app.route(&verb, &path, stages).map_err(|source| ComposeError::Method {
            method: method.name.clone(),
            source,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn register_rel(
        &self,
        owner: &Owner,
        namespace: &str,
        rel: &str,
        template: CompiledPath,
        verb: &Method,
        siblings: &[String],
        options: &RelOptions,
    ) {
        self.linker.register_link(
            owner,
            &qualify(namespace, rel),
            template,
            LinkOptions {
                verb: verb.clone(),
                sibling_rels: siblings.to_vec(),
                rel: options.clone(),
            },
        );
    }
}
