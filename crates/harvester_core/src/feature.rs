use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One feature as returned by the feed.
///
/// `id` is the dedup identity. Geometry is carried as an opaque JSON value
/// and never inspected by the harvester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub id: Option<String>,
    pub attributes: Map<String, Value>,
    pub geometry: Option<Value>,
}

impl FeatureRecord {
    pub fn new(id: Option<String>, attributes: Map<String, Value>, geometry: Option<Value>) -> Self {
        Self {
            id,
            attributes,
            geometry,
        }
    }

    /// Builds a record whose identity is read from `attributes[id_field]`.
    ///
    /// Strings are used as-is, numbers and booleans by their JSON text, so
    /// `"11110"` and `11110` name the same feature: the feed serialises an
    /// administrative code as either depending on the layer and output
    /// format. A missing, null or empty value leaves the record without
    /// identity.
    pub fn with_id_field(
        attributes: Map<String, Value>,
        geometry: Option<Value>,
        id_field: &str,
    ) -> Self {
        let id = attributes.get(id_field).and_then(identity_of);
        Self::new(id, attributes, geometry)
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

fn identity_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// One page of a paginated query, consumed immediately by the walker.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageResult {
    pub records: Vec<FeatureRecord>,
    /// Total match count reported by the feed, when it reports one.
    pub number_matched: Option<u64>,
}

impl PageResult {
    pub fn new(records: Vec<FeatureRecord>) -> Self {
        Self {
            records,
            number_matched: None,
        }
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
