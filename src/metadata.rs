use std::fs;
use std::path::Path;

use anyhow::Result;
use log::debug;

use crate::errors::MetadataError;
use crate::record::ImageRecord;

/// A processing run's worth of per-image records, persisted as a JSON array.
pub type MetadataCollection = Vec<ImageRecord>;

/// Load a metadata collection from a JSON file.
///
/// The file must hold a top-level JSON array of records with all mandatory
/// fields present; anything else is a [`MetadataError::Format`].
pub fn load_metadata(path: &Path) -> Result<MetadataCollection> {
    let content = fs::read_to_string(path)?;

    let value: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| MetadataError::format(format!("{} is not valid JSON: {e}", path.display())))?;

    if !value.is_array() {
        return Err(MetadataError::format(format!(
            "{}: top-level value must be a JSON array of image records",
            path.display()
        ))
        .into());
    }

    let records: MetadataCollection = serde_json::from_value(value).map_err(|e| {
        MetadataError::format(format!("{}: malformed image record: {e}", path.display()))
    })?;

    debug!("Loaded {} record(s) from {}", records.len(), path.display());
    Ok(records)
}

/// Save a metadata collection as pretty-printed JSON, overwriting any
/// existing file at `path`.
pub fn save_metadata(collection: &MetadataCollection, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let json = serde_json::to_string_pretty(collection)?;
    fs::write(path, json)?;

    debug!("Saved {} record(s) to {}", collection.len(), path.display());
    Ok(())
}
