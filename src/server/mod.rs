//! # Server Module
//!
//! Composes a server type's declarations into an [`App`](crate::app::App)
//! and the shared [`Linker`](crate::linker::Linker).
//!
//! ## Composition
//!
//! Composition runs once per [`HalServer`], the first time its app is
//! requested:
//!
//! 1. the declarations are merged ([`ServerApi::merge`](crate::api::ServerApi::merge));
//! 2. every namespace registers its documentation href, and namespaces with
//!    auto documentation get a `GET` route rendering one page per rel
//!    (off-site hrefs are only advertised, never served);
//! 3. server-wide middleware is installed;
//! 4. every route registers its rels (including the implicit `self` of a GET
//!    route) and installs its pipeline;
//! 5. server-wide error middleware is installed;
//! 6. link and docs callbacks are set so hrefs carry the app's mount path.
//!
//! A declaration that cannot be installed is logged and skipped; it never
//! stops the other routes of the server from registering.
//!
//! ## Route pipeline
//!
//! Stages run in this order:
//!
//! | Stage        | Present when                  | Effect                                 |
//! |--------------|-------------------------------|----------------------------------------|
//! | envelope     | the method has `hal` rels     | installs a [`HalResponse`](crate::hal::HalResponse) |
//! | middleware   | per declared middleware       | runs in declaration order              |
//! | filters      | per declared filter           | `false` passes the request on          |
//! | handler      | always                        | calls the method on the server value   |
//!
//! Any stage error goes to the server's error middleware.

mod core;

pub use core::{discovery, ComposeError, HalServer, Server, REL_PARAM};
