//! # halrouter
//!
//! **halrouter** composes independently written server modules into one HTTP
//! dispatch tree and one shared hypermedia link registry. Any module can link
//! to a resource owned by another module by rel name alone (`namespace:rel`),
//! with no compile-time dependency between the two.
//!
//! ## Overview
//!
//! A server type declares its namespaces, routes, rels, middleware, filters
//! and hypermedia options with plain builders ([`api::ServerApi`],
//! [`api::MethodApi`]). Wrapping a value of that type in a
//! [`server::HalServer`] and asking for its app runs composition once:
//!
//! - the declarations are merged into one snapshot;
//! - every rel a route satisfies is registered in the [`linker::Linker`];
//! - every route gets a pipeline installed in an [`app::App`].
//!
//! At request time handlers build [`hal::HalResponse`] documents whose links
//! are resolved through the linker, including links into other servers.
//!
//! ## Architecture
//!
//! - **[`template`]** - Compiles `:name` path templates for matching and expansion
//! - **[`api`]** - Declaration builders and the metadata merge
//! - **[`linker`]** - Process-wide rel registry with per-server href callbacks
//! - **[`app`]** - Synchronous express-style dispatch layer
//! - **[`hal`]** - Hypermedia envelope (`_links`, `_embedded`, `curies`)
//! - **[`docs`]** - Per-rel documentation pages rendered with `minijinja`
//! - **[`server`]** - Route composer, auto documentation and discovery
//! - **[`runtime_config`]** - Environment configuration
//! - **[`otel`]** - Structured logging setup
//!
//! ### Composition Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant User
//!     participant Server as HalServer
//!     participant Api as ServerApi::merge
//!     participant Linker
//!     participant App
//!
//!     User->>Server: app()
//!     Server->>Api: merge declarations
//!     Api-->>Server: ServerMetadata
//!     loop each namespace
//!         Server->>Linker: register_docs(ns, href)
//!         Server->>App: GET <docs href> (auto docs)
//!     end
//!     Server->>App: server middleware
//!     loop each route
//!         Server->>Linker: register_link(ns:rel, template)
//!         Server->>App: route(verb, path, pipeline)
//!     end
//!     Server->>App: error middleware
//!     Server->>Linker: set link/docs callbacks (mount path)
//!     Server-->>User: Arc<App>
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use halrouter::api::{MethodApi, RelOptions, ServerApi};
//! use halrouter::app::Request;
//! use halrouter::linker::Linker;
//! use halrouter::server::{HalServer, Server};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! struct Items;
//!
//! impl Server for Items {
//!     fn api() -> ServerApi<Self> {
//!         ServerApi::new("Items").provides("items").method(
//!             MethodApi::new("get_item")
//!                 .get("/items/:id")
//!                 .provides_with("item", RelOptions::discoverable())
//!                 .hal(&[])
//!                 .handler(|_, ex| {
//!                     let id = ex.req.get_path_param("id").unwrap_or_default().to_string();
//!                     ex.hal_json(json!({ "id": id }))
//!                 }),
//!         )
//!     }
//! }
//!
//! let linker = Arc::new(Linker::new());
//! let items = HalServer::with_linker(Items, linker.clone());
//! let res = items.app().dispatch(Request::get("/items/42"));
//! assert_eq!(res.status, 200);
//!
//! let hrefs = linker.resolve(
//!     &[("id".to_string(), "42".to_string())].into_iter().collect(),
//!     "items:item",
//!     |_, entry, _| entry.href.clone(),
//! );
//! assert_eq!(hrefs, vec!["/items/42"]);
//! ```
//!
//! ## Runtime Considerations
//!
//! Stages run synchronously on the caller's thread. Composition is guarded so
//! that concurrent first accesses to a server's app converge on one build; the
//! linker is read-mostly and safe to share across threads.

pub mod api;
pub mod app;
pub mod docs;
pub mod hal;
pub mod ids;
pub mod linker;
pub mod otel;
pub mod runtime_config;
pub mod server;
pub mod template;

pub use api::{MethodApi, RelOptions, ServerApi};
pub use app::{App, Exchange, Flow, Request, Response};
pub use hal::{HalResponse, LinkContext};
pub use ids::ServerId;
pub use linker::Linker;
pub use server::{discovery, HalServer, Server};
pub use template::{compile, CompiledPath};
