// ── Domain model ──
//
// Devices and object links are decoded from the top-level listing and live
// only for one fetch. Identity fields are kept as raw JSON values so that
// whatever the server sends (string or number) is echoed back unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tag applied to records synthesized for failed requests.
pub const FAILURE_TAG: &str = "_http_request_failure";

/// Field holding the failure details on a failure record.
pub const FAILURE_FIELD: &str = "http_request_failure";

/// Field holding record tags.
pub const TAGS_FIELD: &str = "tags";

// ── Device ───────────────────────────────────────────────────────────

/// One entry of a top-level listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub endpoint: String,
    #[serde(default)]
    pub registration_id: Value,
    #[serde(default)]
    pub registration_date: Value,
    #[serde(default)]
    pub address: Value,
    #[serde(default)]
    pub object_links: Vec<ObjectLink>,
}

impl Device {
    /// Interpret a decoded listing record as a device.
    pub fn from_fields(fields: Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(fields))
    }
}

/// A fetchable sub-resource advertised by a device.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectLink {
    #[serde(default)]
    pub object_id: Value,
    #[serde(default)]
    pub object_instance_id: Value,
    /// Path relative to the device, e.g. `/3/0`.
    pub url: String,
}

// ── CorrelationEntry ─────────────────────────────────────────────────

/// Device identity stashed while a sub-request is in flight.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationEntry {
    pub endpoint: String,
    pub registration_id: Value,
    pub registration_date: Value,
    pub address: Value,
    pub object_id: Value,
    pub object_instance_id: Value,
}

impl CorrelationEntry {
    pub fn new(device: &Device, link: &ObjectLink) -> Self {
        Self {
            endpoint: device.endpoint.clone(),
            registration_id: device.registration_id.clone(),
            registration_date: device.registration_date.clone(),
            address: device.address.clone(),
            object_id: link.object_id.clone(),
            object_instance_id: link.object_instance_id.clone(),
        }
    }

    /// Write the six identity fields into `record`, overwriting collisions.
    pub fn merge_into(&self, record: &mut Record) {
        record.insert("endpoint", Value::String(self.endpoint.clone()));
        record.insert("registrationId", self.registration_id.clone());
        record.insert("registrationDate", self.registration_date.clone());
        record.insert("address", self.address.clone());
        record.insert("objectId", self.object_id.clone());
        record.insert("objectInstanceId", self.object_instance_id.clone());
    }
}

// ── Record ───────────────────────────────────────────────────────────

/// A structured event handed to the sink.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Look up a nested field by a dotted path such as `meta.request.url`.
    pub fn pointer(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.0.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Append `tag` to the record's `tags` array unless already present.
    pub fn tag(&mut self, tag: &str) {
        let tags = self
            .0
            .entry(TAGS_FIELD)
            .or_insert_with(|| Value::Array(Vec::new()));
        if !tags.is_array() {
            let previous = tags.take();
            *tags = Value::Array(vec![previous]);
        }
        if let Value::Array(items) = tags {
            if !items.iter().any(|t| t.as_str() == Some(tag)) {
                items.push(Value::String(tag.to_owned()));
            }
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.0
            .get(TAGS_FIELD)
            .and_then(Value::as_array)
            .is_some_and(|tags| tags.iter().any(|t| t.as_str() == Some(tag)))
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}
