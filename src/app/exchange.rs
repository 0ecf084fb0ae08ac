use http::Method;
use serde::Serialize;
use serde_json::Value;
use smallvec::SmallVec;
use std::sync::Arc;

use crate::template::Params;

/// Maximum inline headers before heap allocation
pub const MAX_INLINE_HEADERS: usize = 16;

/// Header storage shared by [`Request`] and [`Response`].
///
/// Header names use `Arc<str>` so the common names can be shared without copying.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// What a stage wants the dispatch layer to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Continue with the next stage of this route (`proceed()`)
    Next,
    /// Give up on this route and try the next matching one (`proceed('route')`)
    Route,
    /// The response is complete; stop dispatching
    Done,
}

/// Result of running one stage. Any error is handed to the error stages.
pub type StageResult = anyhow::Result<Flow>;

/// One step of a request pipeline.
pub type Stage = Arc<dyn Fn(&mut Exchange) -> StageResult + Send + Sync>;

/// An error-handling step; only runs while an error is in flight.
///
/// Return [`Flow::Next`] to recover, [`Flow::Route`] to pass the error on.
pub type ErrorStage = Arc<dyn Fn(&anyhow::Error, &mut Exchange) -> StageResult + Send + Sync>;

/// Wrap a closure as a [`Stage`].
pub fn stage<F>(f: F) -> Stage
where
    F: Fn(&mut Exchange) -> StageResult + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a closure as an [`ErrorStage`].
pub fn error_stage<F>(f: F) -> ErrorStage
where
    F: Fn(&anyhow::Error, &mut Exchange) -> StageResult + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Incoming request as seen by pipeline stages.
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method
    pub method: Method,
    /// Full URL as received (path and query)
    pub original_url: String,
    /// Path relative to the app currently handling the request
    pub path: String,
    /// Mount prefixes consumed so far
    pub base_url: String,
    /// Parameters captured by the matching route
    pub path_params: Params,
    /// Decoded query string parameters
    pub query_params: Params,
    /// Request headers
    pub headers: HeaderVec,
    /// JSON body, if any
    pub body: Option<Value>,
}

impl Request {
    /// Build a request for `method` and a URL of the form `/path?query`.
    #[must_use]
    pub fn new(method: Method, url: &str) -> Self {
        let (path, query) = match url.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (url, None),
        };
        let query_params = query
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect()
            })
            .unwrap_or_default();
        let path = if path.is_empty() { "/" } else { path };
        Self {
            method,
            original_url: url.to_string(),
            path: path.to_string(),
            base_url: String::new(),
            path_params: Params::new(),
            query_params,
            headers: HeaderVec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn get(url: &str) -> Self {
        Self::new(Method::GET, url)
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((Arc::from(name), value.to_string()));
        self
    }

    #[must_use]
    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Path portion of the original URL.
    #[must_use]
    pub fn original_path(&self) -> &str {
        self.original_url
            .split_once('?')
            .map_or(self.original_url.as_str(), |(path, _)| path)
    }

    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    #[inline]
    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(String::as_str)
    }

    /// Get a header by name (case-insensitive per RFC 7230)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Body {
    Empty,
    Text(String),
    Json(Value),
}

/// Outgoing response built up by pipeline stages.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    #[serde(skip_serializing)]
    pub headers: HeaderVec,
    pub body: Body,
    #[serde(skip)]
    finished: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

impl Response {
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: HeaderVec::new(),
            body: Body::Empty,
            finished: false,
        }
    }

    pub fn status(&mut self, status: u16) -> &mut Self {
        self.status = status;
        self
    }

    /// Get a header by name
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or update a header
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }

    /// Write a JSON body and finish the response.
    pub fn json(&mut self, body: Value) {
        if self.get_header("content-type").is_none() {
            self.set_header("content-type", "application/json".to_string());
        }
        self.body = Body::Json(body);
        self.finished = true;
    }

    /// Write a text body and finish the response.
    pub fn send(&mut self, body: impl Into<String>) {
        if self.get_header("content-type").is_none() {
            self.set_header("content-type", "text/html; charset=utf-8".to_string());
        }
        self.body = Body::Text(body.into());
        self.finished = true;
    }

    /// Finish with `status` and its reason phrase as the body.
    pub fn send_status(&mut self, status: u16) {
        self.status = status;
        self.set_header("content-type", "text/plain; charset=utf-8".to_string());
        self.body = Body::Text(status_reason(status).to_string());
        self.finished = true;
    }

    /// True once a body has been written.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Body as text, for JSON bodies the serialized form.
    #[must_use]
    pub fn body_text(&self) -> String {
        match &self.body {
            Body::Empty => String::new(),
            Body::Text(text) => text.clone(),
            Body::Json(value) => value.to_string(),
        }
    }
}

/// A request/response pair travelling through one pipeline.
///
/// `extensions` carries per-request values installed by earlier stages, such
/// as the hypermedia envelope.
#[derive(Debug)]
pub struct Exchange {
    pub req: Request,
    pub res: Response,
    pub extensions: http::Extensions,
}

impl Exchange {
    #[must_use]
    pub fn new(req: Request) -> Self {
        Self {
            req,
            res: Response::new(),
            extensions: http::Extensions::new(),
        }
    }
}
