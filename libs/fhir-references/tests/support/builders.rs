use serde_json::{json, Value};

/// Builder for Patient resources
pub struct PatientBuilder {
    id: Option<String>,
    active: Option<bool>,
    family: Option<String>,
    identifiers: Vec<Value>,
}

impl PatientBuilder {
    pub fn new() -> Self {
        Self {
            id: None,
            active: None,
            family: None,
            identifiers: Vec::new(),
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    pub fn family(mut self, family: impl Into<String>) -> Self {
        self.family = Some(family.into());
        self
    }

    pub fn identifier(mut self, system: impl Into<String>, value: impl Into<String>) -> Self {
        self.identifiers.push(json!({
            "system": system.into(),
            "value": value.into()
        }));
        self
    }

    pub fn build(self) -> Value {
        let mut patient = json!({ "resourceType": "Patient" });
        if let Some(id) = self.id {
            patient["id"] = json!(id);
        }
        if let Some(active) = self.active {
            patient["active"] = json!(active);
        }
        if let Some(family) = self.family {
            patient["name"] = json!([{ "family": family }]);
        }
        if !self.identifiers.is_empty() {
            patient["identifier"] = Value::Array(self.identifiers);
        }
        patient
    }
}

impl Default for PatientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for Observation resources whose references are under test
pub struct ObservationBuilder {
    subject: Option<Value>,
    performers: Vec<Value>,
    code: Option<Value>,
}

impl ObservationBuilder {
    pub fn new() -> Self {
        Self {
            subject: None,
            performers: Vec::new(),
            code: None,
        }
    }

    pub fn subject(mut self, reference: impl Into<String>) -> Self {
        self.subject = Some(json!({ "reference": reference.into() }));
        self
    }

    pub fn subject_identifier(mut self, system: &str, value: &str) -> Self {
        self.subject = Some(json!({
            "identifier": { "system": system, "value": value },
            "display": "Identified by MRN"
        }));
        self
    }

    pub fn performer(mut self, reference: impl Into<String>) -> Self {
        self.performers
            .push(json!({ "reference": reference.into() }));
        self
    }

    pub fn code(mut self, system: &str, code: &str) -> Self {
        self.code = Some(json!({ "coding": [{ "system": system, "code": code }] }));
        self
    }

    pub fn build(self) -> Value {
        let mut observation = json!({ "resourceType": "Observation", "status": "final" });
        if let Some(code) = self.code {
            observation["code"] = code;
        }
        if let Some(subject) = self.subject {
            observation["subject"] = subject;
        }
        if !self.performers.is_empty() {
            observation["performer"] = Value::Array(self.performers);
        }
        observation
    }
}

impl Default for ObservationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for transaction/batch Bundles
pub struct BundleBuilder {
    kind: String,
    entries: Vec<Value>,
}

impl BundleBuilder {
    pub fn transaction() -> Self {
        Self {
            kind: "transaction".to_string(),
            entries: Vec::new(),
        }
    }

    pub fn batch() -> Self {
        Self {
            kind: "batch".to_string(),
            entries: Vec::new(),
        }
    }

    pub fn post(mut self, full_url: &str, resource: Value) -> Self {
        let resource_type = resource["resourceType"].as_str().unwrap_or_default().to_string();
        self.entries.push(json!({
            "fullUrl": full_url,
            "resource": resource,
            "request": { "method": "POST", "url": resource_type }
        }));
        self
    }

    pub fn put(mut self, full_url: &str, url: &str, resource: Value) -> Self {
        self.entries.push(json!({
            "fullUrl": full_url,
            "resource": resource,
            "request": { "method": "PUT", "url": url }
        }));
        self
    }

    pub fn entry(mut self, entry: Value) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn build(self) -> Value {
        json!({
            "resourceType": "Bundle",
            "type": self.kind,
            "entry": self.entries
        })
    }
}
