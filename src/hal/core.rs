use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::app::{Exchange, Flow, Request, Response, StageResult};
use crate::ids::ServerId;
use crate::linker::{split_rel, LinkDescriptor, LinkEntry, Linker, SELF_REL};
use crate::template::{uri_template, Params};

/// Content type of hypermedia responses.
pub const HAL_CONTENT_TYPE: &str = "application/hal+json";

/// One entry under `_links`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HalLink {
    pub href: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub templated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl HalLink {
    #[must_use]
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            templated: false,
            title: None,
            name: None,
        }
    }
}

/// How [`HalResponse::link`] should resolve a rel.
#[derive(Debug, Clone, Default)]
pub struct LinkContext {
    /// Only use links owned by this server, and qualify unqualified rels with
    /// its namespace
    pub server: Option<ServerId>,
    /// Parameters to expand the link templates with
    pub params: Params,
}

impl LinkContext {
    #[must_use]
    pub fn server(server: ServerId) -> Self {
        Self {
            server: Some(server),
            params: Params::new(),
        }
    }

    #[must_use]
    pub fn params(params: Params) -> Self {
        Self {
            server: None,
            params,
        }
    }

    #[must_use]
    pub fn with_param(mut self, name: &str, value: &str) -> Self {
        self.params.insert(name.to_string(), value.to_string());
        self
    }
}

/// Hypermedia envelope for one response.
///
/// Collects links and embedded resources while the pipeline runs, then
/// merges them into the body written by [`HalResponse::json`].
#[derive(Clone)]
pub struct HalResponse {
    linker: Arc<Linker>,
    owner: Option<ServerId>,
    path: String,
    links: BTreeMap<String, Vec<HalLink>>,
    curies: BTreeMap<String, HalLink>,
    embedded: Map<String, Value>,
}

impl fmt::Debug for HalResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HalResponse")
            .field("owner", &self.owner)
            .field("path", &self.path)
            .field("links", &self.links)
            .field("embedded", &self.embedded.len())
            .finish()
    }
}

impl HalResponse {
    /// Envelope for a response of `owner` at `path`, pre-linked with `rels`.
    ///
    /// `self` links to `path`; every other rel is resolved with the request's
    /// path parameters.
    #[must_use]
    pub fn create(
        linker: Arc<Linker>,
        owner: Option<ServerId>,
        path: &str,
        rels: &[String],
        req: &Request,
    ) -> Self {
        let mut hal = Self {
            linker,
            owner,
            path: path.to_string(),
            links: BTreeMap::new(),
            curies: BTreeMap::new(),
            embedded: Map::new(),
        };
        for rel in rels {
            if rel == SELF_REL {
                hal.add_link(SELF_REL, HalLink::new(path));
            } else {
                hal.link(rel, &LinkContext::params(req.path_params.clone()));
            }
        }
        hal
    }

    /// Path the envelope was created for.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Add a literal link under `rel`.
    pub fn add_link(&mut self, rel: &str, link: HalLink) {
        self.links.entry(rel.to_string()).or_default().push(link);
    }

    /// Resolve `rel` through the linker and add every resulting link.
    ///
    /// Returns the number of links added; an unknown rel adds none.
    pub fn link(&mut self, rel: &str, ctx: &LinkContext) -> usize {
        let key = match ctx.server.or(self.owner) {
            Some(owner) => self.linker.qualify(owner, rel),
            None => rel.to_string(),
        };
        let build = |_owner: ServerId, entry: &LinkEntry, descriptor: &LinkDescriptor| HalLink {
            href: entry.href.clone(),
            templated: entry.templated,
            title: descriptor.options.title.clone(),
            name: None,
        };
        let found = match ctx.server {
            Some(server) => self.linker.resolve_for(server, &ctx.params, &key, build),
            None => self.linker.resolve(&ctx.params, &key, build),
        };
        if found.is_empty() {
            debug!(rel = %key, path = %self.path, "No links resolved for rel");
            return 0;
        }
        self.add_curie(&key);
        let count = found.len();
        self.links.entry(key).or_default().extend(found);
        count
    }

    fn add_curie(&mut self, key: &str) {
        let Some((namespace, _)) = split_rel(key) else {
            return;
        };
        if self.curies.contains_key(namespace) {
            return;
        }
        let Some(docs) = self.linker.docs(namespace) else {
            return;
        };
        self.curies.insert(
            namespace.to_string(),
            HalLink {
                href: uri_template(&docs.href),
                templated: true,
                title: None,
                name: Some(namespace.to_string()),
            },
        );
    }

    /// Embed `value` under `rel`; repeated rels collect into an array.
    pub fn embed(&mut self, rel: &str, value: Value) {
        match self.embedded.get_mut(rel) {
            None => {
                self.embedded.insert(rel.to_string(), value);
            }
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
        }
    }

    /// Links collected so far for `rel`.
    #[must_use]
    pub fn links(&self, rel: &str) -> &[HalLink] {
        self.links.get(rel).map(Vec::as_slice).unwrap_or(&[])
    }

    fn links_value(&self) -> Map<String, Value> {
        let mut out = Map::new();
        for (rel, links) in &self.links {
            let value = if links.len() == 1 {
                serde_json::to_value(&links[0])
            } else {
                serde_json::to_value(links)
            };
            if let Ok(value) = value {
                out.insert(rel.clone(), value);
            }
        }
        if !self.curies.is_empty() {
            let curies: Vec<&HalLink> = self.curies.values().collect();
            if let Ok(value) = serde_json::to_value(curies) {
                out.insert("curies".to_string(), value);
            }
        }
        out
    }

    /// The HAL document for `body`.
    ///
    /// An object body gets `_links` and `_embedded` merged in; any other body
    /// is wrapped as `{ "value": body }` first.
    #[must_use]
    pub fn to_json(&self, body: Value) -> Value {
        let mut doc = match body {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        let links = self.links_value();
        if !links.is_empty() {
            doc.insert("_links".to_string(), Value::Object(links));
        }
        if !self.embedded.is_empty() {
            doc.insert("_embedded".to_string(), Value::Object(self.embedded.clone()));
        }
        Value::Object(doc)
    }

    /// Write the HAL document for `body` to `res`.
    pub fn json(&self, res: &mut Response, body: Value) {
        res.set_header("content-type", HAL_CONTENT_TYPE.to_string());
        res.json(self.to_json(body));
    }
}

impl Exchange {
    /// The hypermedia envelope installed for this request, if any.
    pub fn hal(&mut self) -> Option<&mut HalResponse> {
        self.extensions.get_mut::<HalResponse>()
    }

    /// Finish the response with the hypermedia envelope around `body`.
    ///
    /// # Errors
    ///
    /// Fails when no envelope was installed for the route.
    pub fn hal_json(&mut self, body: Value) -> StageResult {
        let hal = self
            .extensions
            .get::<HalResponse>()
            .ok_or_else(|| anyhow::anyhow!("route has no hypermedia envelope"))?;
        hal.json(&mut self.res, body);
        Ok(Flow::Done)
    }
}
