//! URI template expansion.
//!
//! # Responsibilities
//! - Compile a target template such as `http://{host}:{port}/{path}`
//! - Fill placeholders from the request's query parameters
//! - Report the query parameters that were not consumed
//!
//! # Design Decisions
//! - Templates are compiled once at startup into literal/placeholder segments
//! - `{name}` matches the query parameter `name` exactly
//! - Legacy `$N` placeholders match the query parameter `argN`
//! - The query string is parsed directly, never through a form body
//! - A placeholder without a parameter is an error, never an empty string

use url::form_urlencoded;

use crate::error::{ProxyError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A compiled target template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    source: String,
    segments: Vec<Segment>,
}

/// Result of filling a template for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    /// The template with every placeholder substituted.
    pub target: String,
    /// Query parameters left after removing the consumed ones, re-encoded.
    /// `None` when no parameters remain.
    pub residual_query: Option<String>,
}

impl UriTemplate {
    /// Compile a template string.
    pub fn parse(source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((idx, c)) = chars.next() {
            match c {
                '{' => {
                    let rest = &source[idx + 1..];
                    let end = rest.find('}').ok_or_else(|| {
                        ProxyError::config(format!("unclosed '{{' in target template {}", source))
                    })?;
                    let name = &rest[..end];
                    if name.is_empty() || name.contains('{') {
                        return Err(ProxyError::config(format!(
                            "invalid placeholder in target template {}",
                            source
                        )));
                    }
                    flush_literal(&mut literal, &mut segments);
                    segments.push(Segment::Param(name.to_string()));
                    // skip past the closing brace
                    while let Some((i, _)) = chars.next() {
                        if i == idx + 1 + end {
                            break;
                        }
                    }
                }
                '$' if chars.peek().is_some_and(|(_, d)| d.is_ascii_digit()) => {
                    let mut index = String::new();
                    while let Some((_, d)) = chars.peek().copied() {
                        if !d.is_ascii_digit() {
                            break;
                        }
                        index.push(d);
                        chars.next();
                    }
                    flush_literal(&mut literal, &mut segments);
                    segments.push(Segment::Param(format!("arg{}", index)));
                }
                _ => literal.push(c),
            }
        }
        flush_literal(&mut literal, &mut segments);

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Names of the query parameters this template consumes, in order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Fill the template from a raw (still encoded) query string.
    ///
    /// When a parameter repeats, its first value wins.
    pub fn expand(&self, query: Option<&str>) -> Result<Expansion> {
        let params: Vec<(String, String)> = form_urlencoded::parse(query.unwrap_or("").as_bytes())
            .into_owned()
            .collect();

        let mut target = String::with_capacity(self.source.len() + 32);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => target.push_str(text),
                Segment::Param(name) => {
                    let value = params
                        .iter()
                        .find(|(k, _)| k == name)
                        .map(|(_, v)| v.as_str())
                        .ok_or_else(|| ProxyError::MissingTemplateParam { name: name.clone() })?;
                    target.push_str(value);
                }
            }
        }

        let mut residual = form_urlencoded::Serializer::new(String::new());
        let mut remaining = 0;
        for (key, value) in &params {
            if self.param_names().any(|name| name == key) {
                continue;
            }
            residual.append_pair(key, value);
            remaining += 1;
        }

        Ok(Expansion {
            target,
            residual_query: (remaining > 0).then(|| residual.finish()),
        })
    }
}

fn flush_literal(literal: &mut String, segments: &mut Vec<Segment>) {
    if !literal.is_empty() {
        segments.push(Segment::Literal(std::mem::take(literal)));
    }
}
