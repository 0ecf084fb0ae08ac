//! # Linker Module
//!
//! The cross-server link registry. Servers register which routes satisfy
//! which rels; any code holding the [`Linker`] can then produce hrefs for a
//! rel by name (`namespace:rel`) without depending on the server that owns it.
//!
//! ## Resolution-time rewriting
//!
//! Registration stores templates, not hrefs. Every time a rel is resolved the
//! owner's link callback (see [`Linker::set_link_callback`]) gets a chance to
//! rewrite the expanded href. The composer uses this to prefix hrefs with the
//! path the server's app is mounted at, which is usually not known when the
//! links are registered.
//!
//! ```rust
//! use halrouter::linker::{Linker, LinkOptions, LinkOwner, Owner};
//! use halrouter::api::RelOptions;
//! use halrouter::ids::ServerId;
//! use halrouter::template::{compile, Params};
//! use std::sync::Arc;
//!
//! struct Items(ServerId);
//! impl LinkOwner for Items {
//!     fn id(&self) -> ServerId { self.0 }
//!     fn name(&self) -> &str { "Items" }
//!     fn discoverable_rels(&self) -> Vec<String> { Vec::new() }
//! }
//!
//! let linker = Linker::new();
//! let owner: Owner = Arc::new(Items(ServerId::new()));
//! linker.register_link(&owner, "items:item", compile("/items/:id").unwrap(), LinkOptions {
//!     verb: http::Method::GET,
//!     sibling_rels: vec![],
//!     rel: RelOptions::default(),
//! });
//! linker.set_link_callback(owner.id(), |mut entry| {
//!     entry.href = format!("/api{}", entry.href);
//!     entry
//! });
//!
//! let mut params = Params::new();
//! params.insert("id".into(), "42".into());
//! let hrefs = linker.resolve(&params, "items:item", |_, entry, _| entry.href.clone());
//! assert_eq!(hrefs, vec!["/api/items/42".to_string()]);
//! ```

mod core;

pub use core::{
    split_rel, DocsCallback, DocsEntry, LinkCallback, LinkDescriptor, LinkEntry, LinkOptions,
    LinkOwner, Linker, Owner, REL_SEPARATOR, SELF_REL,
};
