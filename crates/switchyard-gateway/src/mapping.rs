//! HTTP method and URL template mapping

use crate::error::{GatewayError, GatewayResult};
use axum::routing::MethodFilter;
use std::fmt;

/// HTTP methods an alias may name explicitly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl HttpMethod {
    /// Parse HTTP method from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "PATCH" => Some(HttpMethod::Patch),
            "DELETE" => Some(HttpMethod::Delete),
            "OPTIONS" => Some(HttpMethod::Options),
            _ => None,
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
        }
    }

    pub fn method_filter(self) -> MethodFilter {
        match self {
            HttpMethod::Get => MethodFilter::GET,
            HttpMethod::Post => MethodFilter::POST,
            HttpMethod::Put => MethodFilter::PUT,
            HttpMethod::Patch => MethodFilter::PATCH,
            HttpMethod::Delete => MethodFilter::DELETE,
            HttpMethod::Options => MethodFilter::OPTIONS,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Methods a compiled route answers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteMethod {
    /// Any method (`*`)
    Any,
    /// An explicit, non-empty set of verbs
    Verbs(Vec<HttpMethod>),
}

impl RouteMethod {
    pub fn single(method: HttpMethod) -> Self {
        RouteMethod::Verbs(vec![method])
    }

    /// Filter for explicit verbs; `None` for `*`
    pub fn method_filter(&self) -> Option<MethodFilter> {
        match self {
            RouteMethod::Any => None,
            RouteMethod::Verbs(verbs) => verbs
                .iter()
                .map(|verb| verb.method_filter())
                .reduce(MethodFilter::or),
        }
    }

    /// Whether two routes on the same path would answer the same request.
    /// A `*` route only catches what explicit verbs leave, so it only
    /// collides with another `*` route.
    pub fn overlaps(&self, other: &RouteMethod) -> bool {
        match (self, other) {
            (RouteMethod::Any, RouteMethod::Any) => true,
            (RouteMethod::Verbs(a), RouteMethod::Verbs(b)) => a.iter().any(|m| b.contains(m)),
            _ => false,
        }
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteMethod::Any => f.write_str("*"),
            RouteMethod::Verbs(verbs) => {
                let names: Vec<&str> = verbs.iter().map(HttpMethod::as_str).collect();
                f.write_str(&names.join(","))
            }
        }
    }
}

/// URL template with path parameters
/// Example: "/api/v1/users/{id}" or "/api/v1/posts/{post_id}/comments/{comment_id}"
#[derive(Debug, Clone)]
pub struct UrlTemplate {
    /// Raw template string
    template: String,
    /// Path segments (static or parameter)
    segments: Vec<UrlSegment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum UrlSegment {
    Static(String),
    Parameter(String), // Parameter name without braces
}

impl UrlTemplate {
    /// Create a new URL template
    pub fn new(template: &str) -> GatewayResult<Self> {
        let segments = Self::parse_template(template)?;
        Ok(Self {
            template: template.to_string(),
            segments,
        })
    }

    /// Parse template into segments
    fn parse_template(template: &str) -> GatewayResult<Vec<UrlSegment>> {
        let mut segments = Vec::new();

        for part in template.split('/') {
            if part.is_empty() {
                continue;
            }

            if part.starts_with('{') && part.ends_with('}') {
                let param_name = &part[1..part.len() - 1];
                if param_name.is_empty() {
                    return Err(GatewayError::InvalidOptions(format!(
                        "empty parameter name in path: {}",
                        template
                    )));
                }
                if segments.contains(&UrlSegment::Parameter(param_name.to_string())) {
                    return Err(GatewayError::InvalidOptions(format!(
                        "duplicate parameter '{}' in path: {}",
                        param_name, template
                    )));
                }
                segments.push(UrlSegment::Parameter(param_name.to_string()));
            } else if part.contains(['{', '}', ':', '*']) {
                return Err(GatewayError::InvalidOptions(format!(
                    "invalid parameter syntax in path: {}",
                    part
                )));
            } else {
                segments.push(UrlSegment::Static(part.to_string()));
            }
        }

        Ok(segments)
    }

    /// Get the template string
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Path in axum's `:param` syntax
    pub fn axum_path(&self) -> String {
        let segments: Vec<String> = self
            .segments
            .iter()
            .map(|seg| match seg {
                UrlSegment::Static(part) => part.clone(),
                UrlSegment::Parameter(name) => format!(":{}", name),
            })
            .collect();
        format!("/{}", segments.join("/"))
    }

    /// Whether both templates match exactly the same set of paths
    pub fn same_shape(&self, other: &UrlTemplate) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(other.segments.iter())
                .all(|(a, b)| match (a, b) {
                    (UrlSegment::Static(x), UrlSegment::Static(y)) => x == y,
                    (UrlSegment::Parameter(_), UrlSegment::Parameter(_)) => true,
                    _ => false,
                })
    }

    /// First pair of differently named parameters sitting at the same
    /// position of a shared prefix. The router keys parameters by position,
    /// so such templates cannot be registered together.
    pub fn parameter_clash(&self, other: &UrlTemplate) -> Option<(String, String)> {
        for (a, b) in self.segments.iter().zip(other.segments.iter()) {
            match (a, b) {
                (UrlSegment::Static(x), UrlSegment::Static(y)) if x == y => continue,
                (UrlSegment::Parameter(x), UrlSegment::Parameter(y)) if x == y => continue,
                (UrlSegment::Parameter(x), UrlSegment::Parameter(y)) => {
                    return Some((x.clone(), y.clone()))
                }
                _ => return None,
            }
        }
        None
    }
}
