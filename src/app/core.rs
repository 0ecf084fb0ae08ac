use http::Method;
use serde_json::json;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::exchange::{ErrorStage, Exchange, Flow, Request, Response, Stage, StageResult};
use crate::template::{CompiledPath, DispatchPattern};

/// Methods a route may be installed for.
pub const SUPPORTED_METHODS: [Method; 8] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::PATCH,
    Method::OPTIONS,
    Method::HEAD,
    Method::TRACE,
];

/// Error returned when a layer cannot be installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// The verb is not one of [`SUPPORTED_METHODS`]
    UnsupportedMethod {
        /// The verb as declared
        verb: String,
    },
    /// A route was installed with no stages
    EmptyPipeline {
        /// The route's template
        path: String,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::UnsupportedMethod { verb } => {
                write!(f, "{} is not a valid HTTP method.", verb.to_uppercase())
            }
            AppError::EmptyPipeline { path } => {
                write!(f, "route '{}' has no stages to run", path)
            }
        }
    }
}

impl std::error::Error for AppError {}

/// Parse a declared verb into a routable [`Method`].
///
/// # Errors
///
/// Returns [`AppError::UnsupportedMethod`] for anything outside
/// [`SUPPORTED_METHODS`].
pub fn parse_method(verb: &str) -> Result<Method, AppError> {
    let upper = verb.trim().to_ascii_uppercase();
    SUPPORTED_METHODS
        .iter()
        .find(|m| m.as_str() == upper)
        .cloned()
        .ok_or_else(|| AppError::UnsupportedMethod {
            verb: verb.to_string(),
        })
}

struct Route {
    method: Method,
    source: String,
    pattern: DispatchPattern,
    stages: Vec<Stage>,
}

enum Layer {
    Stage(Stage),
    Error(ErrorStage),
    Route(Route),
    Mount { prefix: String, app: Arc<App> },
}

pub(crate) enum Outcome {
    Done,
    Pass(Option<anyhow::Error>),
}

struct MountPoint {
    parent: Weak<App>,
    prefix: String,
}

/// An express-style stack of layers.
///
/// Layers run in installation order. Plain stages and routes run while no
/// error is in flight; error stages run only while one is. A route whose stage
/// returns [`Flow::Route`] hands the request on to the next matching layer.
///
/// An error stage returning [`Flow::Next`] marks the error handled and later
/// plain stages and routes run again; [`Flow::Route`] passes the error on to
/// the next error stage unchanged, and `Err` replaces it.
#[derive(Default)]
pub struct App {
    layers: RwLock<Vec<Layer>>,
    mount: RwLock<Option<MountPoint>>,
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("path", &self.path())
            .field("layers", &self.read_layers().len())
            .finish()
    }
}

fn strip_mount<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(path);
    }
    if path == prefix {
        return Some("/");
    }
    path.strip_prefix(prefix).filter(|rest| rest.starts_with('/'))
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn run_stage(stage: &Stage, ex: &mut Exchange) -> StageResult {
    match catch_unwind(AssertUnwindSafe(|| stage(ex))) {
        Ok(result) => result,
        Err(panic) => Err(anyhow::anyhow!("stage panicked: {}", panic_message(&*panic))),
    }
}

fn run_error_stage(stage: &ErrorStage, err: &anyhow::Error, ex: &mut Exchange) -> StageResult {
    match catch_unwind(AssertUnwindSafe(|| stage(err, ex))) {
        Ok(result) => result,
        Err(panic) => Err(anyhow::anyhow!(
            "error stage panicked: {}",
            panic_message(&*panic)
        )),
    }
}

impl App {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read_layers(&self) -> RwLockReadGuard<'_, Vec<Layer>> {
        self.layers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_layers(&self) -> RwLockWriteGuard<'_, Vec<Layer>> {
        self.layers.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Path this app is mounted at, joined through all parents.
    ///
    /// Empty for an app that has not been mounted.
    #[must_use]
    pub fn path(&self) -> String {
        let mount = self.mount.read().unwrap_or_else(|e| e.into_inner());
        match mount.as_ref() {
            Some(point) => {
                let parent = point.parent.upgrade().map(|p| p.path()).unwrap_or_default();
                format!("{}{}", parent, point.prefix)
            }
            None => String::new(),
        }
    }

    /// Install a stage that runs for every request reaching this layer.
    pub fn use_stage(&self, stage: Stage) {
        self.write_layers().push(Layer::Stage(stage));
    }

    /// Install an error-handling stage.
    pub fn use_error(&self, stage: ErrorStage) {
        self.write_layers().push(Layer::Error(stage));
    }

    /// Install a route pipeline.
    ///
    /// # Errors
    ///
    /// Fails when `method` is not routable or `stages` is empty.
    pub fn route(&self, method: &Method, path: &CompiledPath, stages: Vec<Stage>) -> Result<(), AppError> {
        if !SUPPORTED_METHODS.contains(method) {
            return Err(AppError::UnsupportedMethod {
                verb: method.to_string(),
            });
        }
        if stages.is_empty() {
            return Err(AppError::EmptyPipeline {
                path: path.source().to_string(),
            });
        }
        debug!(
            method = %method,
            path = %path.source(),
            stages = stages.len(),
            "Route installed"
        );
        self.write_layers().push(Layer::Route(Route {
            method: method.clone(),
            source: path.source().to_string(),
            pattern: path.dispatch_pattern().clone(),
            stages,
        }));
        Ok(())
    }

    /// Install a GET route pipeline.
    ///
    /// # Errors
    ///
    /// Fails when `stages` is empty.
    pub fn get(&self, path: &CompiledPath, stages: Vec<Stage>) -> Result<(), AppError> {
        self.route(&Method::GET, path, stages)
    }

    /// Mount `child` under `prefix`; requests below the prefix are handed to it.
    pub fn mount(self: &Arc<Self>, prefix: &str, child: Arc<App>) {
        let prefix = prefix.trim_end_matches('/').to_string();
        {
            let mut mount = child.mount.write().unwrap_or_else(|e| e.into_inner());
            if mount.is_some() {
                warn!(prefix = %prefix, "App mounted more than once; using the latest mount point");
            }
            *mount = Some(MountPoint {
                parent: Arc::downgrade(self),
                prefix: prefix.clone(),
            });
        }
        info!(prefix = %prefix, "App mounted");
        self.write_layers().push(Layer::Mount { prefix, app: child });
    }

    /// Method/template pairs of every installed route, in order.
    #[must_use]
    pub fn routes(&self) -> Vec<(Method, String)> {
        self.read_layers()
            .iter()
            .filter_map(|layer| match layer {
                Layer::Route(route) => Some((route.method.clone(), route.source.clone())),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn handle(&self, ex: &mut Exchange, mut error: Option<anyhow::Error>) -> Outcome {
        let layers = self.read_layers();
        for layer in layers.iter() {
            match layer {
                Layer::Stage(stage) => {
                    if error.is_some() {
                        continue;
                    }
                    match run_stage(stage, ex) {
                        Ok(Flow::Done) => return Outcome::Done,
                        Ok(_) => {}
                        Err(e) => error = Some(e),
                    }
                }
                Layer::Error(stage) => {
                    let Some(err) = error.as_ref() else {
                        continue;
                    };
                    match run_error_stage(stage, err, ex) {
                        Ok(Flow::Done) => return Outcome::Done,
                        Ok(Flow::Next) => {
                            debug!("Error handled; resuming request stages");
                            error = None;
                        }
                        Ok(Flow::Route) => {}
                        Err(e) => error = Some(e),
                    }
                }
                Layer::Route(route) => {
                    if error.is_some() || route.method != ex.req.method {
                        continue;
                    }
                    let Some(params) = route.pattern.matches(&ex.req.path) else {
                        continue;
                    };
                    ex.req.path_params = params;
                    for (idx, stage) in route.stages.iter().enumerate() {
                        match run_stage(stage, ex) {
                            Ok(Flow::Next) => continue,
                            Ok(Flow::Route) => {
                                debug!(
                                    route = %route.source,
                                    stage = idx,
                                    "Route declined request"
                                );
                                break;
                            }
                            Ok(Flow::Done) => return Outcome::Done,
                            Err(e) => {
                                debug!(
                                    route = %route.source,
                                    stage = idx,
                                    error = %e,
                                    "Stage failed"
                                );
                                error = Some(e);
                                break;
                            }
                        }
                    }
                }
                Layer::Mount { prefix, app } => {
                    let Some(rest) = strip_mount(&ex.req.path, prefix).map(str::to_string) else {
                        continue;
                    };
                    let saved_path = std::mem::replace(&mut ex.req.path, rest);
                    let saved_base = ex.req.base_url.clone();
                    ex.req.base_url.push_str(prefix);
                    let outcome = app.handle(ex, error.take());
                    ex.req.path = saved_path;
                    ex.req.base_url = saved_base;
                    match outcome {
                        Outcome::Done => return Outcome::Done,
                        Outcome::Pass(e) => error = e,
                    }
                }
            }
        }
        Outcome::Pass(error)
    }

    /// Run `req` through the layer stack and return the finished response.
    ///
    /// Unmatched requests answer 404; an error no error stage handled answers
    /// 500.
    #[must_use]
    pub fn dispatch(&self, req: Request) -> Response {
        let start = Instant::now();
        let method = req.method.clone();
        let url = req.original_url.clone();
        let mut ex = Exchange::new(req);

        match self.handle(&mut ex, None) {
            Outcome::Done => {}
            Outcome::Pass(None) => {
                if !ex.res.is_finished() {
                    ex.res.send_status(404);
                }
            }
            Outcome::Pass(Some(err)) => {
                error!(
                    method = %method,
                    url = %url,
                    error = %err,
                    "Unhandled error in request pipeline"
                );
                ex.res.status(500).json(json!({ "error": err.to_string() }));
            }
        }

        debug!(
            method = %method,
            url = %url,
            status = ex.res.status,
            duration_us = start.elapsed().as_micros() as u64,
            "Request dispatched"
        );
        ex.res
    }
}
