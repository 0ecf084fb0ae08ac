//! Auto-generated rel documentation.
//!
//! Each namespace can serve a documentation page per rel listing every route
//! that satisfies it. Rendering goes through the [`Renderer`] trait; the
//! default [`MiniJinjaRenderer`] renders [`DEFAULT_TEMPLATE`] or a namespace's
//! own template with `minijinja`.

use minijinja::Environment;
use serde::Serialize;

use crate::api::RelOptions;
use crate::linker::{Linker, REL_SEPARATOR};
use crate::template::Params;

/// Default documentation page: one heading per href, one per verb.
pub const DEFAULT_TEMPLATE: &str = "{% for route in routes %}<h1>{{ route.href }}</h1>\
{% for method in route.methods %}<h2>{{ method.verb }}</h2><p>{{ method.options.description }}</p>\
{% endfor %}{% endfor %}";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocsMethod {
    pub verb: String,
    pub options: RelOptions,
}

/// One href and the verbs it answers for the documented rel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocsRoute {
    pub href: String,
    pub methods: Vec<DocsMethod>,
}

/// Values available to a documentation template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocsContext {
    pub ns: String,
    pub rel: String,
    pub routes: Vec<DocsRoute>,
}

/// Turns a template and a [`DocsContext`] into a page.
pub trait Renderer: Send + Sync {
    /// # Errors
    ///
    /// Fails when the template cannot be parsed or rendered.
    fn render(&self, template: &str, ctx: &DocsContext) -> anyhow::Result<String>;
}

/// [`Renderer`] backed by `minijinja`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MiniJinjaRenderer;

impl Renderer for MiniJinjaRenderer {
    fn render(&self, template: &str, ctx: &DocsContext) -> anyhow::Result<String> {
        let env = Environment::new();
        Ok(env.render_str(template, ctx)?)
    }
}

/// Routes satisfying `namespace:rel`, grouped by href in first-seen order.
///
/// Hrefs are left unexpanded (templated) and pass through the owners' link
/// callbacks, so they carry any mount prefix.
#[must_use]
pub fn collect_routes(linker: &Linker, namespace: &str, rel: &str) -> Vec<DocsRoute> {
    let key = format!("{}{}{}", namespace, REL_SEPARATOR, rel);
    let found = linker.resolve(&Params::new(), &key, |_, entry, descriptor| {
        (
            entry.href.clone(),
            DocsMethod {
                verb: entry.verb.clone(),
                options: descriptor.options.clone(),
            },
        )
    });

    let mut routes: Vec<DocsRoute> = Vec::new();
    for (href, method) in found {
        match routes.iter_mut().find(|r| r.href == href) {
            Some(route) => route.methods.push(method),
            None => routes.push(DocsRoute {
                href,
                methods: vec![method],
            }),
        }
    }
    routes
}
