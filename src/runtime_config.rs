//! # Runtime Configuration Module
//!
//! Environment-variable configuration for server composition.
//!
//! ## Environment Variables
//!
//! ### `HALR_DOCS_ROOT`
//!
//! Prefix of the default documentation href of every namespace. A namespace
//! `items` with no explicit href documents its rels at
//! `<HALR_DOCS_ROOT>/items/:rel`.
//!
//! Default: `/docs`
//!
//! ### `HALR_DOCS_TEMPLATE`
//!
//! Path of a template file that replaces the built-in documentation page
//! template. A namespace's own `template` option still takes precedence.
//! If the file cannot be read a warning is logged and the built-in template
//! is used.
//!
//! ## Usage
//!
//! ```rust
//! use halrouter::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("Docs under: {}", config.docs_root);
//! ```

use std::env;
use std::fs;
use tracing::warn;

use crate::docs::DEFAULT_TEMPLATE;

/// Default value of [`RuntimeConfig::docs_root`]
pub const DEFAULT_DOCS_ROOT: &str = "/docs";

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Prefix for default namespace documentation hrefs (no trailing slash)
    pub docs_root: String,
    /// Documentation page template used when a namespace has none
    pub docs_template: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            docs_root: DEFAULT_DOCS_ROOT.to_string(),
            docs_template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

fn normalize_root(root: &str) -> String {
    let trimmed = root.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let docs_root = env::var("HALR_DOCS_ROOT")
            .map(|v| normalize_root(&v))
            .unwrap_or_else(|_| DEFAULT_DOCS_ROOT.to_string());

        let docs_template = match env::var("HALR_DOCS_TEMPLATE") {
            Ok(path) => match fs::read_to_string(&path) {
                Ok(source) => source,
                Err(e) => {
                    warn!(path = %path, error = %e, "Cannot read docs template; using built-in template");
                    DEFAULT_TEMPLATE.to_string()
                }
            },
            Err(_) => DEFAULT_TEMPLATE.to_string(),
        };

        RuntimeConfig {
            docs_root,
            docs_template,
        }
    }

    /// Default documentation href template of `namespace`.
    #[must_use]
    pub fn docs_href(&self, namespace: &str) -> String {
        format!("{}/{}/:rel", self.docs_root, namespace)
    }
}
