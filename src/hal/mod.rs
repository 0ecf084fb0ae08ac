//! # Hal Module
//!
//! Hypermedia (HAL) response envelope. A route that declares hypermedia links
//! gets a [`HalResponse`] installed in its [`Exchange`](crate::app::Exchange)
//! extensions before user middleware runs. Stages add links by rel name and
//! embed resources; the handler finishes with
//! [`Exchange::hal_json`](crate::app::Exchange::hal_json).
//!
//! Links are resolved through the [`Linker`](crate::linker::Linker), so a rel
//! owned by another server is linked by name only. Namespaced rels also add a
//! `curies` entry pointing at the namespace's documentation.
//!
//! ```json
//! {
//!   "id": "42",
//!   "_links": {
//!     "self": { "href": "/items/42" },
//!     "items:collection": { "href": "/items" },
//!     "curies": [{ "href": "/docs/items/{rel}", "templated": true, "name": "items" }]
//!   }
//! }
//! ```

mod core;
#[cfg(test)]
mod tests;

pub use core::{HalLink, HalResponse, LinkContext, HAL_CONTENT_TYPE};
