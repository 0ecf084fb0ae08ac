//! # Template Module
//!
//! Path templates are the one place where a route's shape is written down.
//! The same template text drives both directions of the routing layer:
//!
//! 1. **Matching**: [`CompiledPath::dispatch_pattern`] turns `/items/:id` into an
//!    anchored regex that the [`crate::app`] dispatch layer uses to match requests
//!    and pull out path parameters.
//! 2. **Expansion**: [`CompiledPath::expand`] substitutes parameters back into the
//!    template to produce a concrete href for a hypermedia link.
//!
//! ## Syntax
//!
//! A placeholder is a `:` followed by one or more `[A-Za-z0-9_]` characters and
//! runs until the next character outside that set. Everything else is literal.
//!
//! ```rust
//! use halrouter::template::{compile, Params};
//!
//! let path = compile("/items/:id").unwrap();
//! let mut params = Params::new();
//! params.insert("id".to_string(), "42".to_string());
//! assert_eq!(path.expand(&params), "/items/42");
//! ```
//!
//! ## Missing parameters
//!
//! A placeholder with no value is kept verbatim, so `/items/:id` expanded with no
//! parameters is still `/items/:id`. Links built from such an expansion are
//! reported as templated by [`CompiledPath::is_templated`].

mod core;

pub use core::{compile, uri_template, CompiledPath, DispatchPattern, Params, TemplateError};
