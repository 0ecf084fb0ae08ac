//! # App Module
//!
//! A small express-style dispatch layer. The composer in [`crate::server`]
//! installs its pipelines here; nothing in this module knows about rels,
//! namespaces or hypermedia.
//!
//! ## Layers
//!
//! An [`App`] is an ordered list of layers:
//!
//! - **stages** installed with [`App::use_stage`] run for every request;
//! - **routes** installed with [`App::route`] run their stage list when the
//!   method and path template match;
//! - **error stages** installed with [`App::use_error`] run only while an error
//!   is in flight;
//! - **mounts** installed with [`App::mount`] hand the remainder of the path to
//!   a child app.
//!
//! ## Stage contract
//!
//! A stage is `Fn(&mut Exchange) -> anyhow::Result<Flow>`:
//!
//! | Return              | Meaning                                            |
//! |---------------------|----------------------------------------------------|
//! | `Ok(Flow::Next)`    | continue with the next stage                       |
//! | `Ok(Flow::Route)`   | this route declines; try the next matching layer   |
//! | `Ok(Flow::Done)`    | the response is complete                           |
//! | `Err(e)`            | skip to the error stages with `e`                  |
//!
//! Stages run synchronously; a stage that has to wait blocks only the request
//! it is serving. Panics inside a stage are caught and treated as errors.
//!
//! ```rust
//! use halrouter::app::{stage, App, Flow, Request};
//! use halrouter::template::compile;
//!
//! let app = App::new();
//! let path = compile("/hello/:name").unwrap();
//! app.get(&path, vec![stage(|ex| {
//!     let name = ex.req.get_path_param("name").unwrap_or("world").to_string();
//!     ex.res.send(format!("hello {name}"));
//!     Ok(Flow::Done)
//! })]).unwrap();
//!
//! let res = app.dispatch(Request::get("/hello/bob"));
//! assert_eq!(res.status, 200);
//! assert_eq!(res.body_text(), "hello bob");
//! ```

mod core;
mod exchange;

pub use core::{parse_method, App, AppError, SUPPORTED_METHODS};
pub use exchange::{
    error_stage, stage, Body, ErrorStage, Exchange, Flow, HeaderVec, Request, Response, Stage,
    StageResult, MAX_INLINE_HEADERS,
};
