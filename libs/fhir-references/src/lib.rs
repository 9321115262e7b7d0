//! FHIR Reference Resolution
//!
//! Resolves the references inside resources submitted to a FHIR server before
//! they are persisted:
//! - conditional references (`Patient?identifier=http://acme.org|123`) are
//!   replaced with the literal `Type/id` of the single resource the search
//!   matches;
//! - intra-transaction placeholders (`urn:uuid:...`, a Bundle entry `fullUrl`)
//!   are replaced with the identity assigned to that entry.
//!
//! Resolutions are memoized per transaction in a [`ResolutionCache`], so the
//! same conditional expression is searched at most once per bundle.
//!
//! # Example
//!
//! ```rust,no_run
//! use ferrum_references::{
//!     CancellationToken, InMemorySearch, ReferenceResolver, ResolutionCache, ResolverConfig,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn run() -> ferrum_references::Result<()> {
//! let search = InMemorySearch::new();
//! search.insert(json!({
//!     "resourceType": "Patient",
//!     "id": "123",
//!     "identifier": [{ "system": "http://acme.org", "value": "12345" }]
//! }))?;
//!
//! let resolver = ReferenceResolver::from_config(Arc::new(search), &ResolverConfig::default());
//! let mut observation = json!({
//!     "resourceType": "Observation",
//!     "subject": { "reference": "Patient?identifier=http://acme.org|12345" }
//! });
//!
//! let mut cache = ResolutionCache::new();
//! resolver
//!     .resolve_references(&mut observation, &mut cache, "Observation", &CancellationToken::none())
//!     .await?;
//! assert_eq!(observation["subject"]["reference"], "Patient/123");
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod cancel;
pub mod config;
pub mod error;
pub mod locator;
pub mod parser;
pub mod registry;
pub mod resolver;
pub mod search;
pub mod transaction;

pub use cache::{ResolutionCache, ResolutionKey, ResolvedReference};
pub use cancel::{CancellationHandle, CancellationToken};
pub use config::ResolverConfig;
pub use error::{Error, Result, SearchError};
pub use locator::{JsonPath, JsonPathSegment, ReferenceField, ReferenceLocator};
pub use parser::{ConditionalExpression, ConditionalExpressionParser, ReferenceKind};
pub use registry::{FhirResourceTypes, ResourceTypeRegistry};
pub use resolver::ReferenceResolver;
pub use search::{
    InMemorySearch, SearchDispatcher, SearchMatch, SearchOutcome, SearchRequest, SearchSubsystem,
    UnsupportedParam,
};
pub use transaction::{
    resolve_transaction_bundle, BundleKind, ReservedId, TransactionResolution,
};
