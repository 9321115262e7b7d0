//! Reference resolution for a single resource document.
//!
//! Rewrites conditional references (`Patient?identifier=...`) and
//! intra-transaction placeholders (`urn:uuid:...`) to literal `Type/id`
//! references. Conditional references are looked up in the transaction's
//! [`ResolutionCache`] first and searched only on a miss; failures are never
//! cached, so a later occurrence of the same expression is searched again.

use crate::cache::{ResolutionCache, ResolutionKey};
use crate::cancel::CancellationToken;
use crate::config::ResolverConfig;
use crate::locator::{set_reference, ReferenceField, ReferenceLocator};
use crate::parser::{ConditionalExpressionParser, ReferenceKind};
use crate::registry::{FhirResourceTypes, ResourceTypeRegistry};
use crate::search::{SearchDispatcher, SearchSubsystem};
use crate::Result;
use serde_json::Value as JsonValue;
use std::sync::Arc;

pub struct ReferenceResolver {
    parser: ConditionalExpressionParser,
    dispatcher: SearchDispatcher,
}

impl ReferenceResolver {
    pub fn new(
        search: Arc<dyn SearchSubsystem>,
        registry: Arc<dyn ResourceTypeRegistry>,
        config: &ResolverConfig,
    ) -> Self {
        Self {
            parser: ConditionalExpressionParser::new(registry, config.base_url.clone()),
            dispatcher: SearchDispatcher::new(search, config.strict_search_parameters),
        }
    }

    /// Resolver backed by the R4 registry plus `config.additional_resource_types`.
    pub fn from_config(search: Arc<dyn SearchSubsystem>, config: &ResolverConfig) -> Self {
        let registry =
            FhirResourceTypes::r4().with_additional(config.additional_resource_types.clone());
        Self::new(search, Arc::new(registry), config)
    }

    /// Resolve every conditional and placeholder reference in `document` in place.
    ///
    /// `request_url` is the URL of the request that carries the document; it
    /// is reported in errors and used to recognise absolute conditional
    /// references aimed at this server. Fails on the first reference that
    /// cannot be resolved; fields resolved before the failure keep their new
    /// values, the failing field is left untouched.
    pub async fn resolve_references(
        &self,
        document: &mut JsonValue,
        cache: &mut ResolutionCache,
        request_url: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let fields: Vec<ReferenceField> = ReferenceLocator::new(document).collect();
        if fields.is_empty() {
            return Ok(());
        }

        let mut rewritten = 0usize;
        for field in fields {
            let replacement = match self.parser.classify(&field, request_url, cache)? {
                ReferenceKind::Empty
                | ReferenceKind::Identifier
                | ReferenceKind::Contained
                | ReferenceKind::Literal => continue,
                ReferenceKind::Placeholder { id, fragment } => {
                    let resolved = cache
                        .get(&ResolutionKey::Placeholder(id.clone()))
                        .ok_or_else(|| crate::Error::PlaceholderNotResolved {
                            reference: field.reference.clone().unwrap_or(id),
                        })?;
                    resolved.to_reference(fragment.as_deref())
                }
                ReferenceKind::Conditional(expr) => {
                    let key = expr.key();
                    let resolved = match cache.get(&key) {
                        Some(hit) => {
                            tracing::debug!(
                                reference = %expr.original,
                                resolved = %hit,
                                "Conditional reference resolved from transaction cache"
                            );
                            hit.clone()
                        }
                        None => {
                            let resolved = self.dispatcher.resolve(&expr, cancel).await?;
                            cache.put(key, resolved.clone());
                            resolved
                        }
                    };
                    resolved.to_reference(expr.fragment.as_deref())
                }
            };

            tracing::debug!(
                path = %field.path,
                from = field.reference.as_deref().unwrap_or_default(),
                to = %replacement,
                "Rewriting reference"
            );
            set_reference(document, &field.path, replacement)?;
            rewritten += 1;
        }

        if rewritten > 0 {
            tracing::debug!(request_url, rewritten, "Resolved references in document");
        }
        Ok(())
    }
}
