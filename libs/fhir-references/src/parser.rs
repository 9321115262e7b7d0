//! Classification of `Reference.reference` values and parsing of conditional
//! (search-URI) references like `Patient?identifier=...`.

use crate::cache::{ResolutionCache, ResolutionKey};
use crate::locator::ReferenceField;
use crate::registry::ResourceTypeRegistry;
use crate::Result;
use std::sync::Arc;
use url::Url;

/// What a reference field holds, and therefore what the resolver must do with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceKind {
    /// Blank `reference`.
    Empty,
    /// No `reference`, only a business identifier. Left as is.
    Identifier,
    /// `#id` pointing into `contained`.
    Contained,
    /// `Type/id`, versioned or absolute literal reference.
    Literal,
    /// Batch-local id that maps to an entry of the same transaction.
    Placeholder {
        id: String,
        fragment: Option<String>,
    },
    Conditional(ConditionalExpression),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalExpression {
    pub resource_type: String,
    /// Decoded `(name, value)` pairs in their original order. Never empty.
    pub params: Vec<(String, String)>,
    pub fragment: Option<String>,
    /// The reference text as submitted.
    pub original: String,
}

impl ConditionalExpression {
    /// `Type?n1=v1&n2=v2`, re-encoded from the decoded parameters so equivalent
    /// spellings of the same query share a cache entry.
    pub fn normalized(&self) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.params.iter())
            .finish();
        format!("{}?{}", self.resource_type, query)
    }

    pub fn key(&self) -> ResolutionKey {
        ResolutionKey::Conditional(self.normalized())
    }
}

pub struct ConditionalExpressionParser {
    registry: Arc<dyn ResourceTypeRegistry>,
    base_url: Option<String>,
}

impl ConditionalExpressionParser {
    pub fn new(registry: Arc<dyn ResourceTypeRegistry>, base_url: Option<String>) -> Self {
        Self {
            registry,
            base_url: base_url.map(|b| b.trim_end_matches('/').to_string()),
        }
    }

    pub fn classify(
        &self,
        field: &ReferenceField,
        request_url: &str,
        cache: &ResolutionCache,
    ) -> Result<ReferenceKind> {
        match field.reference.as_deref() {
            Some(raw) => self.classify_reference(raw, request_url, cache),
            None if field.has_identifier => Ok(ReferenceKind::Identifier),
            None => Ok(ReferenceKind::Empty),
        }
    }

    pub fn classify_reference(
        &self,
        raw: &str,
        request_url: &str,
        cache: &ResolutionCache,
    ) -> Result<ReferenceKind> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(ReferenceKind::Empty);
        }
        if raw.starts_with('#') {
            return Ok(ReferenceKind::Contained);
        }

        let (base, fragment) = raw
            .split_once('#')
            .map(|(b, f)| (b, Some(f.to_string())))
            .unwrap_or((raw, None));

        if is_urn(base) || cache.is_placeholder(base) {
            return Ok(ReferenceKind::Placeholder {
                id: base.to_string(),
                fragment,
            });
        }

        if base.contains('?') {
            return self
                .parse_conditional(raw, base, fragment, request_url)
                .map(ReferenceKind::Conditional);
        }

        Ok(ReferenceKind::Literal)
    }

    fn parse_conditional(
        &self,
        original: &str,
        base: &str,
        fragment: Option<String>,
        request_url: &str,
    ) -> Result<ConditionalExpression> {
        let invalid = || crate::Error::InvalidConditionalReference {
            reference: original.to_string(),
            request_url: request_url.to_string(),
        };

        let (path, query) = base.split_once('?').ok_or_else(invalid)?;

        let lower = path.to_ascii_lowercase();
        let relative_path = if lower.starts_with("http://") || lower.starts_with("https://") {
            self.strip_service_base(original, path, request_url)?
        } else {
            path
        };

        // `fhir/Patient?...` and `/Patient?...` both target `Patient`.
        let resource_type = relative_path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default();
        if resource_type.is_empty() {
            return Err(invalid());
        }
        if !self.registry.is_known_type(resource_type) {
            return Err(crate::Error::UnsupportedResourceType {
                resource_type: resource_type.to_string(),
                reference: original.to_string(),
            });
        }

        let params: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .filter(|(name, _)| !name.trim().is_empty())
            .collect();
        if params.is_empty() {
            return Err(invalid());
        }

        Ok(ConditionalExpression {
            resource_type: resource_type.to_string(),
            params,
            fragment,
            original: original.to_string(),
        })
    }

    /// For `https://host/fhir/Patient?...` return `/Patient`, provided the reference
    /// targets this server. Without any known base the last path segment is used.
    fn strip_service_base<'a>(
        &self,
        original: &str,
        path: &'a str,
        request_url: &str,
    ) -> Result<&'a str> {
        let service_base = self
            .base_url
            .clone()
            .or_else(|| self.service_base_from_request_url(request_url));

        let Some(service_base) = service_base else {
            let last = path
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or_default();
            return Ok(last);
        };

        let matches_base = path.len() >= service_base.len()
            && path.is_char_boundary(service_base.len())
            && path[..service_base.len()].eq_ignore_ascii_case(&service_base);
        let rest = if matches_base {
            &path[service_base.len()..]
        } else {
            ""
        };
        if !matches_base || !(rest.is_empty() || rest.starts_with('/')) {
            return Err(crate::Error::InvalidReference(format!(
                "Conditional reference '{}' does not target this server ({})",
                original, service_base
            )));
        }
        Ok(rest)
    }

    /// `https://host/fhir/Observation/1?x` -> `https://host/fhir`. `None` for
    /// relative request URLs.
    fn service_base_from_request_url(&self, request_url: &str) -> Option<String> {
        let url = Url::parse(request_url.trim()).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }

        let mut base = format!("{}://{}", url.scheme(), url.host_str()?);
        if let Some(port) = url.port() {
            base.push(':');
            base.push_str(&port.to_string());
        }
        for seg in url.path_segments()?.filter(|s| !s.is_empty()) {
            if self.registry.is_known_type(seg) || seg.starts_with('$') || seg.starts_with('_') {
                break;
            }
            base.push('/');
            base.push_str(seg);
        }
        Some(base)
    }
}

fn is_urn(s: &str) -> bool {
    let lower = s.to_ascii_lowercase();
    lower.starts_with("urn:uuid:") || lower.starts_with("urn:oid:")
}
