use regex::Regex;
use std::collections::HashMap;
use std::fmt;

/// Parameter map used for both matching output and expansion input.
pub type Params = HashMap<String, String>;

/// Error returned by [`compile`] for a template that cannot be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// The template text was empty
    Empty,
    /// The template does not start with `/`
    NotAbsolute {
        /// The offending template
        template: String,
    },
    /// A `:` was not followed by a placeholder name
    EmptyPlaceholder {
        /// The offending template
        template: String,
        /// Byte offset of the `:`
        position: usize,
    },
    /// The same placeholder name appears more than once
    DuplicatePlaceholder {
        /// The offending template
        template: String,
        /// The repeated name
        name: String,
    },
    /// The generated dispatch regex failed to compile
    Pattern {
        /// The offending template
        template: String,
        /// Message from the regex compiler
        message: String,
    },
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::Empty => write!(f, "path template is empty"),
            TemplateError::NotAbsolute { template } => {
                write!(f, "path template '{}' must start with '/'", template)
            }
            TemplateError::EmptyPlaceholder { template, position } => write!(
                f,
                "path template '{}' has an unnamed placeholder at offset {}",
                template, position
            ),
            TemplateError::DuplicatePlaceholder { template, name } => write!(
                f,
                "path template '{}' declares placeholder ':{}' more than once",
                template, name
            ),
            TemplateError::Pattern { template, message } => write!(
                f,
                "path template '{}' produced an invalid pattern: {}",
                template, message
            ),
        }
    }
}

impl std::error::Error for TemplateError {}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// Anchored regex plus the ordered placeholder names it captures.
#[derive(Debug, Clone)]
pub struct DispatchPattern {
    regex: Regex,
    param_names: Vec<String>,
}

impl DispatchPattern {
    /// The compiled regex. Capture group `n` holds `param_names()[n - 1]`.
    #[must_use]
    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    #[must_use]
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Match a request path, returning decoded path parameters on success.
    ///
    /// Uses "last write wins" when the same name is captured twice, which can
    /// only happen for templates renamed through [`CompiledPath::bind`].
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<Params> {
        let caps = self.regex.captures(path)?;
        let mut params = Params::with_capacity(self.param_names.len());
        for (idx, name) in self.param_names.iter().enumerate() {
            if let Some(m) = caps.get(idx + 1) {
                let value = urlencoding::decode(m.as_str())
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|_| m.as_str().to_string());
                params.insert(name.clone(), value);
            }
        }
        Some(params)
    }
}

/// A parsed path template.
///
/// Immutable once compiled; expansion is a pure function of the parameters so
/// the same value can be shared by every link that points at the route.
#[derive(Debug, Clone)]
pub struct CompiledPath {
    source: String,
    segments: Vec<Segment>,
    pattern: DispatchPattern,
}

/// Parse `template` into a [`CompiledPath`].
///
/// # Errors
///
/// Returns a [`TemplateError`] when the template is empty, relative, has an
/// unnamed or repeated placeholder, or cannot be turned into a regex.
pub fn compile(template: &str) -> Result<CompiledPath, TemplateError> {
    if template.is_empty() {
        return Err(TemplateError::Empty);
    }
    if !template.starts_with('/') {
        return Err(TemplateError::NotAbsolute {
            template: template.to_string(),
        });
    }

    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        if ch != ':' {
            literal.push(ch);
            continue;
        }
        let mut name = String::new();
        while let Some(&(_, c)) = chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                name.push(c);
                chars.next();
            } else {
                break;
            }
        }
        if name.is_empty() {
            return Err(TemplateError::EmptyPlaceholder {
                template: template.to_string(),
                position: pos,
            });
        }
        let repeated = segments
            .iter()
            .any(|s| matches!(s, Segment::Param(existing) if *existing == name));
        if repeated {
            return Err(TemplateError::DuplicatePlaceholder {
                template: template.to_string(),
                name,
            });
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Param(name));
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }

    let pattern = build_pattern(template, &segments)?;
    Ok(CompiledPath {
        source: template.to_string(),
        segments,
        pattern,
    })
}

/// Render any href in RFC 6570 form, without requiring it to be routable.
///
/// Used for documentation hrefs, which may point off-site
/// (`https://docs.example.com/items/:rel`). A `:` starts a placeholder only
/// when followed by a letter or `_`, so schemes and ports stay literal.
#[must_use]
pub fn uri_template(href: &str) -> String {
    let mut out = String::with_capacity(href.len() + 2);
    let mut chars = href.chars().peekable();
    while let Some(ch) = chars.next() {
        let starts_name = matches!(chars.peek(), Some(c) if c.is_ascii_alphabetic() || *c == '_');
        if ch != ':' || !starts_name {
            out.push(ch);
            continue;
        }
        out.push('{');
        while let Some(&c) = chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                out.push(c);
                chars.next();
            } else {
                break;
            }
        }
        out.push('}');
    }
    out
}

fn build_pattern(template: &str, segments: &[Segment]) -> Result<DispatchPattern, TemplateError> {
    let mut pattern = String::with_capacity(template.len() + 16);
    let mut param_names = Vec::new();
    pattern.push('^');
    for (idx, segment) in segments.iter().enumerate() {
        match segment {
            Segment::Literal(text) => {
                // A trailing slash is optional when matching
                let text = if idx + 1 == segments.len() {
                    text.trim_end_matches('/')
                } else {
                    text.as_str()
                };
                pattern.push_str(&regex::escape(text));
            }
            Segment::Param(name) => {
                pattern.push_str("([^/]+)");
                param_names.push(name.clone());
            }
        }
    }
    pattern.push_str("/?$");

    let regex = Regex::new(&pattern).map_err(|e| TemplateError::Pattern {
        template: template.to_string(),
        message: e.to_string(),
    })?;
    Ok(DispatchPattern { regex, param_names })
}

impl CompiledPath {
    /// The template text this path was compiled from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Placeholder names in template order.
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Pattern for the dispatch layer.
    #[must_use]
    pub fn dispatch_pattern(&self) -> &DispatchPattern {
        &self.pattern
    }

    /// Substitute `params` into the template.
    ///
    /// Values are percent-encoded. A placeholder with no value is emitted
    /// verbatim as `:name`.
    #[must_use]
    pub fn expand(&self, params: &Params) -> String {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Param(name) => match params.get(name) {
                    Some(value) => out.push_str(&urlencoding::encode(value)),
                    None => {
                        out.push(':');
                        out.push_str(name);
                    }
                },
            }
        }
        out
    }

    /// True when expanding with `params` would leave a placeholder in place.
    #[must_use]
    pub fn is_templated(&self, params: &Params) -> bool {
        self.params().any(|name| !params.contains_key(name))
    }

    /// Rename placeholders so expansion reads a different parameter.
    ///
    /// `bindings` maps placeholder name to the parameter it should be filled
    /// from; unmapped placeholders keep their name. The source text and the
    /// dispatch pattern's matching behaviour are unchanged.
    #[must_use]
    pub fn bind(&self, bindings: &HashMap<String, String>) -> CompiledPath {
        if bindings.is_empty() {
            return self.clone();
        }
        let segments: Vec<Segment> = self
            .segments
            .iter()
            .map(|s| match s {
                Segment::Param(name) => {
                    Segment::Param(bindings.get(name).cloned().unwrap_or_else(|| name.clone()))
                }
                other => other.clone(),
            })
            .collect();
        let param_names = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param(name) => Some(name.clone()),
                Segment::Literal(_) => None,
            })
            .collect();
        CompiledPath {
            source: self.source.clone(),
            segments,
            pattern: DispatchPattern {
                regex: self.pattern.regex.clone(),
                param_names,
            },
        }
    }
}

impl fmt::Display for CompiledPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
