use super::builders::PatientBuilder;
use ferrum_references::InMemorySearch;
use serde_json::{json, Value};

/// Common test constants
pub mod constants {
    pub const MRN_SYSTEM: &str = "http://example.org/fhir/mrn";
    pub const NPI_SYSTEM: &str = "http://hl7.org/fhir/sid/us-npi";
    pub const LOINC_SYSTEM: &str = "http://loinc.org";
}

/// Creates a Patient with MRN identifier
pub fn patient_with_mrn(id: &str, mrn: &str) -> Value {
    PatientBuilder::new()
        .id(id)
        .active(true)
        .family("Doe")
        .identifier(constants::MRN_SYSTEM, mrn)
        .build()
}

pub fn practitioner_with_npi(id: &str, npi: &str) -> Value {
    json!({
        "resourceType": "Practitioner",
        "id": id,
        "identifier": [{ "system": constants::NPI_SYSTEM, "value": npi }]
    })
}

/// Store with `Patient/123` (MRN 12345) and `Practitioner/dr-1` (NPI 999).
pub fn store_with_patient_123() -> InMemorySearch {
    let store = InMemorySearch::new().with_parameter("Patient", "family", "name.family");
    store
        .insert(patient_with_mrn("123", "12345"))
        .expect("insert patient");
    store
        .insert(practitioner_with_npi("dr-1", "999"))
        .expect("insert practitioner");
    store
}

/// Store where MRN 12345 is shared by two patients.
pub fn store_with_duplicate_mrn() -> InMemorySearch {
    let store = store_with_patient_123();
    store
        .insert(patient_with_mrn("456", "12345"))
        .expect("insert patient");
    store
}
