//! # Api Module
//!
//! Declarations a server type makes about itself, and the merge that turns
//! them into one snapshot for composition.
//!
//! A server describes itself with a [`ServerApi`] built from plain builder
//! calls; there is no reflection and nothing is attached to the server value.
//! Reuse between server types is explicit: a derived api calls
//! [`ServerApi::include`] with its base's api.
//!
//! ```rust
//! use halrouter::api::{MethodApi, RelOptions, ServerApi};
//! use halrouter::app::Flow;
//!
//! struct Items;
//!
//! let api: ServerApi<Items> = ServerApi::new("Items")
//!     .provides("items")
//!     .method(
//!         MethodApi::new("get_item")
//!             .get("/items/:id")
//!             .provides_with("item", RelOptions::discoverable())
//!             .hal(&["collection"])
//!             .handler(|_items, ex| {
//!                 ex.res.json(serde_json::json!({}));
//!                 Ok(Flow::Done)
//!             }),
//!     );
//!
//! let merged = api.merge();
//! assert_eq!(merged.primary_namespace(), "items");
//! assert_eq!(merged.methods[0].routes[0].path, "/items/:id");
//! ```

mod declare;
mod merge;
#[cfg(test)]
mod tests;

pub use declare::{
    Filter, HalDeclaration, HalOptions, Handler, MethodApi, NamespaceOptions, NamespaceProvision,
    RelOptions, RelProvision, RouteTemplate, ServerApi, ServerMiddleware,
};
pub use merge::{MethodMetadata, RouteLink, ServerMetadata};
