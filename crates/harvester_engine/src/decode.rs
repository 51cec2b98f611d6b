use harvester_core::{FeatureRecord, PageResult};
use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("response has no features array")]
    MissingFeatures,
    #[error("feature {index} is not a JSON object")]
    InvalidFeature { index: usize },
}

/// Decode a GeoJSON `FeatureCollection` page, reading identity from
/// `properties[id_field]`.
///
/// A body without a `features` array is an error: the feed reports
/// exceptions in-band with a success status.
pub fn decode_feature_collection(bytes: &[u8], id_field: &str) -> Result<PageResult, DecodeError> {
    let mut document: Value = serde_json::from_slice(bytes)?;
    let features = match document.get_mut("features").map(Value::take) {
        Some(Value::Array(features)) => features,
        _ => return Err(DecodeError::MissingFeatures),
    };

    let records = features
        .into_iter()
        .enumerate()
        .map(|(index, feature)| decode_feature(index, feature, id_field))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PageResult {
        records,
        number_matched: number_matched(&document),
    })
}

fn decode_feature(index: usize, feature: Value, id_field: &str) -> Result<FeatureRecord, DecodeError> {
    let Value::Object(mut feature) = feature else {
        return Err(DecodeError::InvalidFeature { index });
    };
    let attributes = match feature.remove("properties") {
        Some(Value::Object(properties)) => properties,
        _ => Map::new(),
    };
    let geometry = feature.remove("geometry").filter(|g| !g.is_null());
    Ok(FeatureRecord::with_id_field(attributes, geometry, id_field))
}

// WFS 2.0 reports `numberMatched`, GeoServer-style feeds `totalFeatures`;
// either may be the string "unknown".
fn number_matched(document: &Value) -> Option<u64> {
    ["numberMatched", "totalFeatures"]
        .iter()
        .find_map(|key| document.get(*key).and_then(Value::as_u64))
}
