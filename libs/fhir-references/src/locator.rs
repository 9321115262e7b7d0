//! Locates Reference-shaped nodes in a resource document.
//!
//! The walk is schema-agnostic: any object that looks like a FHIR `Reference`
//! is reported, whatever element it sits under and however deep it is nested.
//! Order is depth-first in document declaration order (requires `serde_json`'s
//! `preserve_order`), which is also the order references get resolved in.

use serde_json::{Map, Value as JsonValue};
use std::fmt;

/// Members of the FHIR `Reference` datatype.
const REFERENCE_ELEMENTS: &[&str] = &[
    "id",
    "extension",
    "reference",
    "type",
    "identifier",
    "display",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonPathSegment {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsonPath(Vec<JsonPathSegment>);

impl JsonPath {
    pub fn segments(&self) -> &[JsonPathSegment] {
        &self.0
    }

    /// The node this path addresses in `document`, if it still exists.
    pub(crate) fn node_mut<'a>(&self, document: &'a mut JsonValue) -> Option<&'a mut JsonValue> {
        self.0
            .iter()
            .try_fold(document, |node, segment| match (segment, node) {
                (JsonPathSegment::Key(key), JsonValue::Object(map)) => map.get_mut(key),
                (JsonPathSegment::Index(idx), JsonValue::Array(items)) => items.get_mut(*idx),
                _ => None,
            })
    }

    fn child(&self, segment: JsonPathSegment) -> Self {
        let mut segments = Vec::with_capacity(self.0.len() + 1);
        segments.extend(self.0.iter().cloned());
        segments.push(segment);
        Self(segments)
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("$");
        }
        let mut first = true;
        for seg in &self.0 {
            match seg {
                JsonPathSegment::Key(k) => {
                    if !first {
                        f.write_str(".")?;
                    }
                    f.write_str(k)?;
                }
                JsonPathSegment::Index(i) => write!(f, "[{}]", i)?,
            }
            first = false;
        }
        Ok(())
    }
}

/// A Reference node discovered in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceField {
    /// Path of the Reference object (not of its `reference` member).
    pub path: JsonPath,
    /// Current `Reference.reference` value.
    pub reference: Option<String>,
    /// Whether the node carries a business identifier (`Reference.identifier`).
    pub has_identifier: bool,
}

/// Lazy depth-first iterator over every [`ReferenceField`] in a document.
pub struct ReferenceLocator<'a> {
    stack: Vec<(&'a JsonValue, JsonPath)>,
}

impl<'a> ReferenceLocator<'a> {
    pub fn new(root: &'a JsonValue) -> Self {
        Self {
            stack: vec![(root, JsonPath::default())],
        }
    }
}

impl<'a> Iterator for ReferenceLocator<'a> {
    type Item = ReferenceField;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((value, path)) = self.stack.pop() {
            match value {
                JsonValue::Object(map) => {
                    // Reverse push so the first declared member is visited first.
                    for (k, v) in map.iter().rev() {
                        if v.is_object() || v.is_array() {
                            self.stack
                                .push((v, path.child(JsonPathSegment::Key(k.clone()))));
                        }
                    }
                    if let Some(field) = reference_field(map, &path) {
                        return Some(field);
                    }
                }
                JsonValue::Array(arr) => {
                    for (idx, v) in arr.iter().enumerate().rev() {
                        if v.is_object() || v.is_array() {
                            self.stack.push((v, path.child(JsonPathSegment::Index(idx))));
                        }
                    }
                }
                _ => {}
            }
        }
        None
    }
}

fn reference_field(map: &Map<String, JsonValue>, path: &JsonPath) -> Option<ReferenceField> {
    if map.contains_key("resourceType") {
        return None;
    }

    let has_identifier = map.get("identifier").is_some_and(JsonValue::is_object);
    match map.get("reference") {
        Some(JsonValue::String(reference)) => Some(ReferenceField {
            path: path.clone(),
            reference: Some(reference.clone()),
            has_identifier,
        }),
        _ if has_identifier && map.keys().all(|k| REFERENCE_ELEMENTS.contains(&k.as_str())) => {
            Some(ReferenceField {
                path: path.clone(),
                reference: None,
                has_identifier,
            })
        }
        _ => None,
    }
}

/// Replace `Reference.reference` of the node at `path` in a single assignment.
pub(crate) fn set_reference(
    document: &mut JsonValue,
    path: &JsonPath,
    reference: String,
) -> crate::Result<()> {
    let Some(JsonValue::Object(node)) = path.node_mut(document) else {
        return Err(crate::Error::Internal(format!(
            "Failed to apply resolved reference at {}",
            path
        )));
    };
    node.insert("reference".to_string(), JsonValue::String(reference));
    Ok(())
}
