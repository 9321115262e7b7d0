//! Reference resolution across the entries of a batch/transaction Bundle.
//!
//! One [`ResolutionCache`] is created per bundle. For transactions it is seeded
//! with the Bundle's `fullUrl` placeholders before any entry is resolved:
//! - PUT/PATCH entries map their `fullUrl` to the `Type/id` of `request.url`;
//! - POST entries get a server id reserved up front, so entries may reference
//!   resources created later in the same bundle.
//!
//! Entries are then resolved strictly in bundle order.

use crate::cache::{ResolutionCache, ResolvedReference};
use crate::cancel::CancellationToken;
use crate::registry::is_valid_resource_type_name;
use crate::resolver::ReferenceResolver;
use crate::Result;
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleKind {
    Batch,
    Transaction,
}

/// Server id reserved for a POST entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedId {
    pub entry_index: usize,
    pub full_url: Option<String>,
    pub reference: ResolvedReference,
}

#[derive(Debug)]
pub struct TransactionResolution {
    pub kind: BundleKind,
    pub reserved_ids: Vec<ReservedId>,
    /// The cache as it stood when the last entry finished, for callers that
    /// continue processing the same transaction.
    pub cache: ResolutionCache,
}

struct EntryRequest {
    method: String,
    url: String,
}

/// Resolve references in every entry resource of `bundle` in place.
pub async fn resolve_transaction_bundle(
    resolver: &ReferenceResolver,
    bundle: &mut JsonValue,
    cancel: &CancellationToken,
) -> Result<TransactionResolution> {
    let kind = bundle_kind(bundle)?;
    let requests = validate_entries(bundle)?;

    let mut cache = ResolutionCache::new();
    let reserved_ids = match kind {
        BundleKind::Transaction => seed_placeholders(bundle, &requests, &mut cache)?,
        BundleKind::Batch => Vec::new(),
    };

    tracing::info!(
        kind = ?kind,
        entries = requests.len(),
        reserved = reserved_ids.len(),
        "Resolving references in bundle"
    );

    let Some(JsonValue::Array(entries)) = bundle.get_mut("entry") else {
        return Ok(TransactionResolution {
            kind,
            reserved_ids,
            cache,
        });
    };

    for (index, (entry, request)) in entries.iter_mut().zip(&requests).enumerate() {
        let Some(resource) = entry.get_mut("resource") else {
            continue;
        };
        resolver
            .resolve_references(resource, &mut cache, &request.url, cancel)
            .await
            .map_err(|e| e.in_entry(index))?;
    }

    Ok(TransactionResolution {
        kind,
        reserved_ids,
        cache,
    })
}

fn bundle_kind(bundle: &JsonValue) -> Result<BundleKind> {
    if bundle.get("resourceType").and_then(|v| v.as_str()) != Some("Bundle") {
        return Err(crate::Error::InvalidBundle(
            "Expected a resource of type Bundle".to_string(),
        ));
    }
    match bundle.get("type").and_then(|v| v.as_str()) {
        Some("transaction") => Ok(BundleKind::Transaction),
        Some("batch") => Ok(BundleKind::Batch),
        Some(other) => Err(crate::Error::InvalidBundle(format!(
            "Bundle type '{}' is not a batch or transaction",
            other
        ))),
        None => Err(crate::Error::InvalidBundle(
            "Bundle.type is required".to_string(),
        )),
    }
}

fn validate_entries(bundle: &JsonValue) -> Result<Vec<EntryRequest>> {
    let entries = match bundle.get("entry") {
        None | Some(JsonValue::Null) => return Ok(Vec::new()),
        Some(JsonValue::Array(entries)) => entries,
        Some(_) => {
            return Err(crate::Error::InvalidBundle(
                "Bundle.entry must be an array".to_string(),
            ))
        }
    };

    let mut seen_full_urls = HashSet::new();
    let mut requests = Vec::with_capacity(entries.len());

    for (i, entry) in entries.iter().enumerate() {
        let request = entry.get("request").ok_or_else(|| {
            crate::Error::InvalidBundle(format!("Entry {} missing request", i))
        })?;
        let method = request
            .get("method")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                crate::Error::InvalidBundle(format!("Entry {} missing request.method", i))
            })?
            .to_ascii_uppercase();
        let url = request
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| crate::Error::InvalidBundle(format!("Entry {} missing request.url", i)))?
            .to_string();

        if matches!(method.as_str(), "POST" | "PUT" | "PATCH") && entry.get("resource").is_none()
        {
            return Err(crate::Error::InvalidBundle(format!(
                "Entry {} with method {} missing resource",
                i, method
            )));
        }

        if let Some(full_url) = entry.get("fullUrl").and_then(|v| v.as_str()) {
            if !seen_full_urls.insert(full_url.to_string()) {
                return Err(crate::Error::InvalidBundle(format!(
                    "Duplicate fullUrl at entry {}: {}",
                    i, full_url
                )));
            }
        }

        requests.push(EntryRequest { method, url });
    }

    Ok(requests)
}

fn seed_placeholders(
    bundle: &JsonValue,
    requests: &[EntryRequest],
    cache: &mut ResolutionCache,
) -> Result<Vec<ReservedId>> {
    let Some(JsonValue::Array(entries)) = bundle.get("entry") else {
        return Ok(Vec::new());
    };

    let mut reserved = Vec::new();
    for (index, (entry, request)) in entries.iter().zip(requests).enumerate() {
        let full_url = entry
            .get("fullUrl")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let target = RequestTarget::parse(&request.url);

        match request.method.as_str() {
            "POST" => {
                let resource_type = target
                    .create_type()
                    .map(str::to_string)
                    .or_else(|| {
                        entry
                            .get("resource")
                            .and_then(|r| r.get("resourceType"))
                            .and_then(|v| v.as_str())
                            .map(str::to_string)
                    })
                    .ok_or_else(|| {
                        crate::Error::InvalidBundle(format!(
                            "Entry {} POST missing resource type in request.url",
                            index
                        ))
                    })?;

                let reference = ResolvedReference::new(resource_type, Uuid::new_v4().to_string());
                if let Some(full_url) = &full_url {
                    cache.register_placeholder(full_url.clone(), reference.clone());
                }
                reserved.push(ReservedId {
                    entry_index: index,
                    full_url,
                    reference,
                });
            }
            "PUT" | "PATCH" => {
                if let (Some(full_url), Some(identity)) = (full_url, target.identity()) {
                    cache.register_placeholder(full_url, identity);
                }
            }
            _ => {}
        }
    }

    Ok(reserved)
}

/// Path segments of an entry's `request.url`, without base, query or `_history`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RequestTarget {
    segments: Vec<String>,
}

impl RequestTarget {
    fn parse(raw: &str) -> Self {
        let path = raw.split_once('?').map_or(raw, |(p, _)| p);
        let path = match path.find("://") {
            Some(scheme_end) => path[scheme_end + 3..]
                .split_once('/')
                .map_or("", |(_, p)| p),
            None => path,
        };

        let segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .take_while(|s| *s != "_history")
            .map(str::to_string)
            .collect();
        Self { segments }
    }

    /// Type a POST to this URL creates: the last segment, so that
    /// `https://host/fhir/Patient` yields `Patient`.
    fn create_type(&self) -> Option<&str> {
        self.segments
            .last()
            .map(String::as_str)
            .filter(|s| is_valid_resource_type_name(s))
    }

    /// `Type/id` addressed by a PUT/PATCH.
    fn identity(&self) -> Option<ResolvedReference> {
        match self.segments.as_slice() {
            [.., rt, id] if is_valid_resource_type_name(rt) => {
                Some(ResolvedReference::new(rt, id))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_target_parsing() {
        let create = RequestTarget::parse("Patient");
        assert_eq!(create.create_type(), Some("Patient"));
        assert_eq!(create.identity(), None);

        assert_eq!(
            RequestTarget::parse("Patient/123/_history/2").identity(),
            Some(ResolvedReference::new("Patient", "123"))
        );
        assert_eq!(
            RequestTarget::parse("https://example.org/fhir/Patient/abc?x=y").identity(),
            Some(ResolvedReference::new("Patient", "abc"))
        );
        assert_eq!(RequestTarget::parse("Patient?identifier=1").identity(), None);
        assert_eq!(RequestTarget::parse("").create_type(), None);
    }

    #[test]
    fn absolute_post_url_creates_last_segment_type() {
        let target = RequestTarget::parse("https://example.org/fhir/Patient");
        assert_eq!(target.create_type(), Some("Patient"));
        assert_eq!(target.identity(), None);
        assert_eq!(RequestTarget::parse("https://example.org/fhir/").create_type(), None);
    }

    #[test]
    fn bundle_kind_requires_batch_or_transaction() {
        use serde_json::json;
        assert_eq!(
            bundle_kind(&json!({ "resourceType": "Bundle", "type": "transaction" })).unwrap(),
            BundleKind::Transaction
        );
        assert!(bundle_kind(&json!({ "resourceType": "Bundle", "type": "searchset" })).is_err());
        assert!(bundle_kind(&json!({ "resourceType": "Patient" })).is_err());
    }
}
