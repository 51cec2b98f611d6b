use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use harvester_core::FeatureRecord;
use serde_json::{json, Map, Value};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    Ok(())
}

/// Atomically write content to `{dir}/{filename}` by writing a temp file then renaming.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, filename: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        ensure_output_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content)?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

/// GeoJSON `FeatureCollection` for a harvested layer. The layer name and
/// harvest time are carried as foreign members.
pub fn feature_collection(records: &[FeatureRecord], layer: &str, harvested_at: &str) -> Value {
    let features: Vec<Value> = records.iter().map(geojson_feature).collect();
    json!({
        "type": "FeatureCollection",
        "name": layer,
        "harvested_at": harvested_at,
        "features": features,
    })
}

fn geojson_feature(record: &FeatureRecord) -> Value {
    let mut feature = Map::new();
    feature.insert("type".into(), Value::from("Feature"));
    if let Some(id) = record.id() {
        feature.insert("id".into(), Value::from(id));
    }
    feature.insert("properties".into(), Value::Object(record.attributes.clone()));
    feature.insert(
        "geometry".into(),
        record.geometry.clone().unwrap_or(Value::Null),
    );
    Value::Object(feature)
}

/// Writes `{dir}/{layer}.geojson` atomically and returns its path.
pub fn write_feature_collection(
    dir: &Path,
    layer: &str,
    records: &[FeatureRecord],
    harvested_at: &str,
) -> Result<PathBuf, PersistError> {
    let collection = feature_collection(records, layer, harvested_at);
    let content = serde_json::to_vec(&collection)?;
    AtomicFileWriter::new(dir.to_path_buf()).write(&layer_filename(layer), &content)
}

/// Filesystem-safe `{layer}.geojson`.
pub fn layer_filename(layer: &str) -> String {
    let cleaned: String = layer
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_matches(&['_', ' ', '.'][..]);
    let stem = if cleaned.is_empty() { "layer" } else { cleaned };
    format!("{stem}.geojson")
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}
