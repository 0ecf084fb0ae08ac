use dashmap::DashMap;
use http::Method;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::api::RelOptions;
use crate::ids::ServerId;
use crate::template::{CompiledPath, Params};

/// Separator between namespace and rel in a qualified rel key.
pub const REL_SEPARATOR: char = ':';

/// The rel every GET route satisfies unless it opts out.
pub const SELF_REL: &str = "self";

/// A server that owns registered links and docs.
pub trait LinkOwner: Send + Sync {
    fn id(&self) -> ServerId;

    fn name(&self) -> &str;

    /// Rels the owner flags for discovery, as declared (possibly unqualified).
    fn discoverable_rels(&self) -> Vec<String>;

    /// Namespace unqualified rels of this owner belong to.
    ///
    /// Owners that do not know one are qualified with the first namespace
    /// they registered docs for.
    fn primary_namespace(&self) -> Option<String> {
        None
    }
}

pub type Owner = Arc<dyn LinkOwner>;

/// Rewrites a resolved link before it is handed out.
pub type LinkCallback = Arc<dyn Fn(LinkEntry) -> LinkEntry + Send + Sync>;

/// Rewrites a docs entry before it is handed out.
pub type DocsCallback = Arc<dyn Fn(DocsEntry) -> DocsEntry + Send + Sync>;

/// Descriptor stored for one registration of a rel.
#[derive(Debug, Clone)]
pub struct LinkDescriptor {
    pub owner: ServerId,
    /// Qualified rel key (`namespace:rel`)
    pub rel: String,
    pub verb: Method,
    pub template: CompiledPath,
    /// Rels advertised alongside this one by responses of the route
    pub sibling_rels: Vec<String>,
    pub options: RelOptions,
}

impl LinkDescriptor {
    /// The route's href template as declared.
    #[must_use]
    pub fn href(&self) -> &str {
        self.template.source()
    }
}

/// What [`Linker::register_link`] needs besides the rel and template.
#[derive(Debug, Clone)]
pub struct LinkOptions {
    pub verb: Method,
    pub sibling_rels: Vec<String>,
    pub rel: RelOptions,
}

/// A link after expansion, as seen by link callbacks and resolve builders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkEntry {
    pub rel: String,
    pub verb: String,
    pub href: String,
    /// Some placeholders had no value and remain in `href`
    pub templated: bool,
}

/// Documentation entry point of a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocsEntry {
    pub namespace: String,
    /// Href template, usually containing a `:rel` placeholder. May point
    /// off-site (`https://docs.example.com/items/:rel`).
    pub href: String,
}

struct DocsRecord {
    owner: ServerId,
    entry: DocsEntry,
}

/// Registry of rels to links across every composed server.
///
/// Links are keyed by `namespace:rel`. A key may hold several descriptors
/// (different verbs, overriding declarations); registering never replaces.
/// Per-server callbacks are applied each time a link or docs entry is
/// resolved, so a server can be mounted after its links were registered.
#[derive(Default)]
pub struct Linker {
    links: RwLock<HashMap<String, Vec<Arc<LinkDescriptor>>>>,
    docs: RwLock<Vec<DocsRecord>>,
    owners: RwLock<Vec<Owner>>,
    link_callbacks: DashMap<ServerId, LinkCallback>,
    docs_callbacks: DashMap<ServerId, DocsCallback>,
}

static GLOBAL: Lazy<Arc<Linker>> = Lazy::new(|| Arc::new(Linker::new()));

impl fmt::Debug for Linker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Linker")
            .field("rels", &read(&self.links).len())
            .field("docs", &read(&self.docs).len())
            .field("servers", &read(&self.owners).len())
            .finish()
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

/// Split `namespace:rel`; `None` for an unqualified rel.
#[must_use]
pub fn split_rel(rel: &str) -> Option<(&str, &str)> {
    rel.split_once(REL_SEPARATOR)
}

impl Linker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide linker used by servers that are not given one.
    #[must_use]
    pub fn global() -> Arc<Linker> {
        GLOBAL.clone()
    }

    fn remember_owner(&self, owner: &Owner) {
        let id = owner.id();
        let mut owners = write(&self.owners);
        if !owners.iter().any(|o| o.id() == id) {
            owners.push(owner.clone());
        }
    }

    /// Record the documentation entry point for `namespace`.
    ///
    /// A namespace has one entry; registering it again replaces the entry.
    /// The href is stored as given; only root-relative hrefs are rewritten by
    /// the owner's docs callback.
    pub fn register_docs(&self, owner: &Owner, namespace: &str, href: &str) {
        self.remember_owner(owner);
        let entry = DocsEntry {
            namespace: namespace.to_string(),
            href: href.to_string(),
        };
        let mut docs = write(&self.docs);
        if let Some(existing) = docs.iter_mut().find(|d| d.entry.namespace == namespace) {
            warn!(
                namespace = %namespace,
                previous_server = %existing.owner,
                server = %owner.id(),
                "Namespace documentation registered twice; replacing"
            );
            existing.owner = owner.id();
            existing.entry = entry;
        } else {
            docs.push(DocsRecord {
                owner: owner.id(),
                entry,
            });
        }
        debug!(namespace = %namespace, href = %href, "Docs registered");
    }

    /// Append a descriptor under `rel_key`.
    pub fn register_link(
        &self,
        owner: &Owner,
        rel_key: &str,
        template: CompiledPath,
        options: LinkOptions,
    ) -> Arc<LinkDescriptor> {
        self.remember_owner(owner);
        let descriptor = Arc::new(LinkDescriptor {
            owner: owner.id(),
            rel: rel_key.to_string(),
            verb: options.verb,
            template,
            sibling_rels: options.sibling_rels,
            options: options.rel,
        });
        let mut links = write(&self.links);
        let list = links.entry(rel_key.to_string()).or_default();
        list.push(descriptor.clone());
        info!(
            rel = %rel_key,
            verb = %descriptor.verb,
            href = %descriptor.href(),
            server = %owner.name(),
            registrations = list.len(),
            "Link registered"
        );
        descriptor
    }

    /// Replace the link rewrite callback of `owner`.
    pub fn set_link_callback<F>(&self, owner: ServerId, callback: F)
    where
        F: Fn(LinkEntry) -> LinkEntry + Send + Sync + 'static,
    {
        self.link_callbacks.insert(owner, Arc::new(callback));
    }

    /// Replace the docs rewrite callback of `owner`.
    pub fn set_docs_callback<F>(&self, owner: ServerId, callback: F)
    where
        F: Fn(DocsEntry) -> DocsEntry + Send + Sync + 'static,
    {
        self.docs_callbacks.insert(owner, Arc::new(callback));
    }

    fn link_callback(&self, owner: ServerId) -> Option<LinkCallback> {
        self.link_callbacks.get(&owner).map(|cb| cb.value().clone())
    }

    fn docs_callback(&self, owner: ServerId) -> Option<DocsCallback> {
        self.docs_callbacks.get(&owner).map(|cb| cb.value().clone())
    }

    fn descriptors(&self, rel_key: &str) -> Vec<Arc<LinkDescriptor>> {
        read(&self.links).get(rel_key).cloned().unwrap_or_default()
    }

    fn build_all<R, F>(
        &self,
        params: &Params,
        descriptors: Vec<Arc<LinkDescriptor>>,
        mut builder: F,
    ) -> Vec<R>
    where
        F: FnMut(ServerId, &LinkEntry, &LinkDescriptor) -> R,
    {
        descriptors
            .iter()
            .map(|descriptor| {
                let mut entry = LinkEntry {
                    rel: descriptor.rel.clone(),
                    verb: descriptor.verb.to_string(),
                    href: descriptor.template.expand(params),
                    templated: descriptor.template.is_templated(params),
                };
                if let Some(callback) = self.link_callback(descriptor.owner) {
                    entry = callback(entry);
                }
                builder(descriptor.owner, &entry, descriptor)
            })
            .collect()
    }

    /// Expand every link registered under `rel_key`.
    ///
    /// Each descriptor's template is expanded with `params`, passed through the
    /// owner's link callback, then handed to `builder`. Results come back in
    /// registration order; an unknown key yields an empty vector.
    pub fn resolve<R, F>(&self, params: &Params, rel_key: &str, builder: F) -> Vec<R>
    where
        F: FnMut(ServerId, &LinkEntry, &LinkDescriptor) -> R,
    {
        let descriptors = self.descriptors(rel_key);
        if descriptors.is_empty() {
            debug!(rel = %rel_key, "Rel not registered");
        }
        self.build_all(params, descriptors, builder)
    }

    /// [`Linker::resolve`] restricted to links owned by `owner`.
    pub fn resolve_for<R, F>(&self, owner: ServerId, params: &Params, rel_key: &str, builder: F) -> Vec<R>
    where
        F: FnMut(ServerId, &LinkEntry, &LinkDescriptor) -> R,
    {
        let descriptors = self
            .descriptors(rel_key)
            .into_iter()
            .filter(|d| d.owner == owner)
            .collect();
        self.build_all(params, descriptors, builder)
    }

    /// Docs entry of `namespace`, rewritten by its owner's docs callback.
    #[must_use]
    pub fn docs(&self, namespace: &str) -> Option<DocsEntry> {
        let (owner, entry) = {
            let docs = read(&self.docs);
            let record = docs.iter().find(|d| d.entry.namespace == namespace)?;
            (record.owner, record.entry.clone())
        };
        Some(match self.docs_callback(owner) {
            Some(callback) => callback(entry),
            None => entry,
        })
    }

    /// Namespaces `owner` registered docs for, in registration order.
    #[must_use]
    pub fn namespaces(&self, owner: ServerId) -> Vec<String> {
        read(&self.docs)
            .iter()
            .filter(|d| d.owner == owner)
            .map(|d| d.entry.namespace.clone())
            .collect()
    }

    /// Qualify `rel` with the primary namespace of `owner`.
    ///
    /// Rels that already contain a namespace are returned unchanged, as are
    /// rels of an owner with no namespace.
    #[must_use]
    pub fn qualify(&self, owner: ServerId, rel: &str) -> String {
        if split_rel(rel).is_some() {
            return rel.to_string();
        }
        let declared = read(&self.owners)
            .iter()
            .find(|o| o.id() == owner)
            .and_then(|o| o.primary_namespace());
        let namespace = declared.or_else(|| {
            read(&self.docs)
                .iter()
                .find(|d| d.owner == owner)
                .map(|d| d.entry.namespace.clone())
        });
        match namespace {
            Some(namespace) => format!("{}{}{}", namespace, REL_SEPARATOR, rel),
            None => rel.to_string(),
        }
    }

    /// Every server that registered docs or links, in first-seen order.
    #[must_use]
    pub fn servers(&self) -> Vec<Owner> {
        read(&self.owners).clone()
    }

    /// Registered rel keys, sorted.
    #[must_use]
    pub fn rels(&self) -> Vec<String> {
        let mut keys: Vec<String> = read(&self.links).keys().cloned().collect();
        keys.sort();
        keys
    }
}
