#![allow(dead_code)]

pub mod builders;
pub mod fixtures;
pub mod search;

use ferrum_references::{
    CancellationToken, InMemorySearch, ReferenceResolver, ResolutionCache, ResolverConfig,
};
use serde_json::Value;
use std::sync::Arc;

pub use builders::*;
pub use fixtures::*;
pub use search::*;

/// Resolver over a recording wrapper around `store`, with default config.
pub fn recording_resolver(store: InMemorySearch) -> (ReferenceResolver, Arc<RecordingSearch>) {
    recording_resolver_with_config(store, &ResolverConfig::default())
}

pub fn recording_resolver_with_config(
    store: InMemorySearch,
    config: &ResolverConfig,
) -> (ReferenceResolver, Arc<RecordingSearch>) {
    let search = Arc::new(RecordingSearch::new(store));
    (ReferenceResolver::from_config(search.clone(), config), search)
}

/// Resolve `document` with a fresh cache and no cancellation.
pub async fn resolve_once(
    resolver: &ReferenceResolver,
    document: &mut Value,
) -> ferrum_references::Result<ResolutionCache> {
    let mut cache = ResolutionCache::new();
    resolver
        .resolve_references(document, &mut cache, "Observation", &CancellationToken::none())
        .await?;
    Ok(cache)
}
