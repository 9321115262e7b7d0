//! Search subsystem boundary.
//!
//! Query execution and ranking live outside this crate; the resolver only needs
//! a structured, exact-match search that reports its matches and the parameters
//! it could not honour.

use crate::error::SearchError;
use async_trait::async_trait;
use serde_json::Value as JsonValue;

mod dispatcher;
mod escape;
pub mod memory;

pub use dispatcher::SearchDispatcher;
pub use memory::InMemorySearch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub resource_type: String,
    /// Ordered `(name, value)` pairs.
    pub params: Vec<(String, String)>,
    /// Upper bound on matches the caller needs.
    pub count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchMatch {
    pub id: String,
    pub resource_type: String,
    pub resource: JsonValue,
}

impl SearchMatch {
    /// Build a match from a stored resource's `resourceType` and `id`.
    pub fn from_resource(resource: JsonValue) -> Option<Self> {
        let resource_type = resource.get("resourceType")?.as_str()?.to_string();
        let id = resource.get("id")?.as_str()?.to_string();
        Some(Self {
            id,
            resource_type,
            resource,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedParam {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    pub matches: Vec<SearchMatch>,
    pub unsupported_params: Vec<UnsupportedParam>,
}

#[async_trait]
pub trait SearchSubsystem: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<SearchOutcome, SearchError>;
}
