//! In-memory exact-match search subsystem.
//!
//! Supports `_id`, `identifier` and any element parameter registered with
//! [`InMemorySearch::with_parameter`]. Values are matched exactly (token
//! semantics for Identifier/Coding/CodeableConcept, string equality otherwise).
//! Comma-separated values are OR-ed; repeated parameters are AND-ed. Parameters
//! it does not know are reported as unsupported and ignored.

use super::escape::{split_unescaped, unescape_search_value};
use super::{SearchMatch, SearchOutcome, SearchRequest, SearchSubsystem, UnsupportedParam};
use crate::error::SearchError;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::RwLock;

/// Parameter registrations that apply to every resource type.
const ANY_TYPE: &str = "*";

#[derive(Debug, Default)]
pub struct InMemorySearch {
    resources: RwLock<HashMap<String, Vec<JsonValue>>>,
    parameters: HashMap<String, HashMap<String, String>>,
}

enum Criterion {
    Id(Vec<String>),
    Element { path: String, values: Vec<String> },
}

enum TokenSearchValue {
    AnySystemCode(String),
    NoSystemCode(String),
    SystemOnly(String),
    SystemCode { system: String, code: String },
}

impl InMemorySearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register search parameter `name` on `resource_type` (`*` for all types),
    /// matching the dotted element path `element` (e.g. `name.family`).
    pub fn with_parameter(
        mut self,
        resource_type: impl Into<String>,
        name: impl Into<String>,
        element: impl Into<String>,
    ) -> Self {
        self.parameters
            .entry(resource_type.into())
            .or_default()
            .insert(name.into(), element.into());
        self
    }

    /// Store a resource, replacing any previous one with the same type and id.
    pub fn insert(&self, resource: JsonValue) -> Result<(), SearchError> {
        let resource_type = resource
            .get("resourceType")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SearchError::Backend("Resource is missing resourceType".to_string()))?
            .to_string();
        let id = resource
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                SearchError::Backend(format!("{} resource is missing id", resource_type))
            })?
            .to_string();

        let mut store = self
            .resources
            .write()
            .map_err(|_| SearchError::Backend("Resource store lock poisoned".to_string()))?;
        let bucket = store.entry(resource_type).or_default();
        bucket.retain(|r| r.get("id").and_then(|v| v.as_str()) != Some(id.as_str()));
        bucket.push(resource);
        Ok(())
    }

    pub fn extend<I>(&self, resources: I) -> Result<usize, SearchError>
    where
        I: IntoIterator<Item = JsonValue>,
    {
        let mut count = 0;
        for resource in resources {
            self.insert(resource)?;
            count += 1;
        }
        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.resources
            .read()
            .map(|store| store.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn element_for(&self, resource_type: &str, name: &str) -> Option<&str> {
        if name == "identifier" {
            return Some("identifier");
        }
        [resource_type, ANY_TYPE]
            .iter()
            .find_map(|rt| self.parameters.get(*rt)?.get(name))
            .map(String::as_str)
    }

    fn criteria(
        &self,
        request: &SearchRequest,
    ) -> (Vec<Criterion>, Vec<UnsupportedParam>) {
        let mut criteria = Vec::new();
        let mut unsupported = Vec::new();

        for (raw_name, raw_value) in &request.params {
            let (name, modifier) = raw_name
                .split_once(':')
                .map(|(n, m)| (n, Some(m)))
                .unwrap_or((raw_name.as_str(), None));

            if let Some(modifier) = modifier.filter(|m| *m != "exact") {
                unsupported.push(UnsupportedParam {
                    name: raw_name.clone(),
                    reason: format!("modifier ':{}' is not supported", modifier),
                });
                continue;
            }

            // Still escaped: token values are split on `|` before unescaping.
            let values: Vec<String> = split_unescaped(raw_value, ',')
                .into_iter()
                .map(str::to_string)
                .collect();

            if name == "_id" {
                let ids = values.iter().map(|v| unescape_search_value(v)).collect();
                criteria.push(Criterion::Id(ids));
                continue;
            }

            match self.element_for(&request.resource_type, name) {
                Some(path) => criteria.push(Criterion::Element {
                    path: path.to_string(),
                    values,
                }),
                None => unsupported.push(UnsupportedParam {
                    name: raw_name.clone(),
                    reason: format!(
                        "unknown search parameter for {}",
                        request.resource_type
                    ),
                }),
            }
        }

        (criteria, unsupported)
    }
}

#[async_trait]
impl SearchSubsystem for InMemorySearch {
    async fn search(&self, request: &SearchRequest) -> Result<SearchOutcome, SearchError> {
        let (criteria, unsupported_params) = self.criteria(request);

        let store = self
            .resources
            .read()
            .map_err(|_| SearchError::Backend("Resource store lock poisoned".to_string()))?;
        let candidates = store
            .get(&request.resource_type)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let matches = candidates
            .iter()
            .filter(|resource| criteria.iter().all(|c| criterion_matches(resource, c)))
            .take(request.count.unwrap_or(usize::MAX))
            .filter_map(|resource| SearchMatch::from_resource(resource.clone()))
            .collect();

        Ok(SearchOutcome {
            matches,
            unsupported_params,
        })
    }
}

fn criterion_matches(resource: &JsonValue, criterion: &Criterion) -> bool {
    match criterion {
        Criterion::Id(ids) => resource
            .get("id")
            .and_then(|v| v.as_str())
            .is_some_and(|id| ids.iter().any(|wanted| wanted == id)),
        Criterion::Element { path, values } => {
            let found = element_values(resource, path);
            values.iter().any(|wanted| {
                let token = parse_token_value(wanted);
                let plain = unescape_search_value(wanted);
                found.iter().any(|v| value_matches(v, &plain, &token))
            })
        }
    }
}

/// All values at dotted `path`, flattening arrays along the way.
fn element_values<'a>(resource: &'a JsonValue, path: &str) -> Vec<&'a JsonValue> {
    let mut current = vec![resource];
    for seg in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value.get(seg) {
                Some(JsonValue::Array(items)) => next.extend(items.iter()),
                Some(v) => next.push(v),
                None => {}
            }
        }
        current = next;
    }
    current
}

fn value_matches(value: &JsonValue, raw: &str, token: &TokenSearchValue) -> bool {
    match value {
        JsonValue::String(s) => match token {
            TokenSearchValue::AnySystemCode(code) | TokenSearchValue::NoSystemCode(code) => {
                s == code || s == raw
            }
            _ => s == raw,
        },
        JsonValue::Bool(b) => b.to_string() == raw,
        JsonValue::Number(n) => n.to_string() == raw,
        JsonValue::Array(items) => items.iter().any(|v| value_matches(v, raw, token)),
        JsonValue::Object(map) => {
            // CodeableConcept
            if let Some(JsonValue::Array(codings)) = map.get("coding") {
                return codings.iter().any(|c| value_matches(c, raw, token));
            }
            // Identifier (value) or Coding (code)
            let code = map
                .get("value")
                .or_else(|| map.get("code"))
                .and_then(|v| v.as_str());
            let system = map.get("system").and_then(|v| v.as_str());
            token_matches(token, system, code)
        }
        JsonValue::Null => false,
    }
}

fn token_matches(token: &TokenSearchValue, system: Option<&str>, code: Option<&str>) -> bool {
    match token {
        TokenSearchValue::AnySystemCode(c) => code == Some(c.as_str()),
        TokenSearchValue::NoSystemCode(c) => system.is_none() && code == Some(c.as_str()),
        TokenSearchValue::SystemOnly(s) => system == Some(s.as_str()),
        TokenSearchValue::SystemCode {
            system: s,
            code: c,
        } => system == Some(s.as_str()) && code == Some(c.as_str()),
    }
}

fn parse_token_value(raw: &str) -> TokenSearchValue {
    let parts = split_unescaped(raw, '|');
    match parts.as_slice() {
        [code] => TokenSearchValue::AnySystemCode(unescape_search_value(code)),
        [left, right] => {
            let left = unescape_search_value(left);
            let right = unescape_search_value(right);
            if left.is_empty() {
                TokenSearchValue::NoSystemCode(right)
            } else if right.is_empty() {
                TokenSearchValue::SystemOnly(left)
            } else {
                TokenSearchValue::SystemCode {
                    system: left,
                    code: right,
                }
            }
        }
        _ => TokenSearchValue::AnySystemCode(unescape_search_value(raw)),
    }
}
