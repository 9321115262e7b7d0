//! Per-transaction resolution cache.
//!
//! One cache lives exactly as long as one batch/transaction. It is threaded by
//! `&mut` through every per-entry resolution call so that a conditional
//! reference resolved for entry 1 is reused for entry 5, and so that
//! placeholder ids seeded for the bundle are visible to every entry.

use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolutionKey {
    /// Normalized conditional expression (`Type?name=value&...`).
    Conditional(String),
    /// Intra-transaction placeholder such as `urn:uuid:...` or a Bundle `fullUrl`.
    Placeholder(String),
}

impl ResolutionKey {
    pub fn placeholder(id: impl Into<String>) -> Self {
        Self::Placeholder(id.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Conditional(s) | Self::Placeholder(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedReference {
    pub resource_type: String,
    pub id: String,
}

impl ResolvedReference {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// `Type/Id`, with `#fragment` appended when present.
    pub fn to_reference(&self, fragment: Option<&str>) -> String {
        match fragment {
            Some(frag) => format!("{}/{}#{}", self.resource_type, self.id, frag),
            None => self.to_string(),
        }
    }
}

impl fmt::Display for ResolvedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_type, self.id)
    }
}

#[derive(Debug, Default)]
pub struct ResolutionCache {
    entries: HashMap<ResolutionKey, ResolvedReference>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ResolutionKey) -> Option<&ResolvedReference> {
        self.entries.get(key)
    }

    /// Entries are append-only by protocol; a second write for the same key replaces
    /// the first.
    pub fn put(&mut self, key: ResolutionKey, value: ResolvedReference) {
        self.entries.insert(key, value);
    }

    pub fn register_placeholder(&mut self, id: impl Into<String>, value: ResolvedReference) {
        self.put(ResolutionKey::Placeholder(id.into()), value);
    }

    pub fn is_placeholder(&self, id: &str) -> bool {
        self.entries
            .contains_key(&ResolutionKey::Placeholder(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
