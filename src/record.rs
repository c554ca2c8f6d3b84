use std::collections::BTreeMap;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::MetadataError;

/// One detection as it comes back from the detector collaborator, before
/// per-image counts are assembled.
#[derive(Debug, Clone)]
pub struct RawDetection {
    pub class: String,
    pub confidence: f32,
    /// Corner coordinates: x1, y1, x2, y2 in original image pixels.
    pub bbox: [f32; 4],
}

impl RawDetection {
    pub fn area(&self) -> f32 {
        let [x1, y1, x2, y2] = self.bbox;
        (x2 - x1) * (y2 - y1)
    }

    pub fn intersection_area(&self, other: &RawDetection) -> f32 {
        let x1 = self.bbox[0].max(other.bbox[0]);
        let y1 = self.bbox[1].max(other.bbox[1]);
        let x2 = self.bbox[2].min(other.bbox[2]);
        let y2 = self.bbox[3].min(other.bbox[3]);

        if x2 > x1 && y2 > y1 {
            (x2 - x1) * (y2 - y1)
        } else {
            0.0
        }
    }

    pub fn iou(&self, other: &RawDetection) -> f32 {
        let intersection = self.intersection_area(other);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

/// One located object instance, as persisted in the metadata file.
///
/// `count` is the number of detections of this class in the same image,
/// duplicated onto every detection of that class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Detection {
    pub class: String,
    pub confidence: f32,
    pub bbox: [f32; 4],
    pub count: u32,
}

/// One processed image: the detections plus derived per-class summaries.
///
/// Invariant: for every detection `d`, `class_counts[d.class] == d.count`
/// equals the number of detections of that class in `detections`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageRecord {
    pub image_path: String,
    pub detections: Vec<Detection>,
    pub total_objects: usize,
    pub unique_class: Vec<String>,
    pub class_counts: BTreeMap<String, u32>,
}

fn validate_raw(raw: &RawDetection) -> Result<(), MetadataError> {
    if raw.class.trim().is_empty() {
        return Err(MetadataError::validation("detection has an empty class label"));
    }
    if !raw.confidence.is_finite() || !(0.0..=1.0).contains(&raw.confidence) {
        return Err(MetadataError::validation(format!(
            "confidence {} for class '{}' is outside [0, 1]",
            raw.confidence, raw.class
        )));
    }
    let [x1, y1, x2, y2] = raw.bbox;
    if !(x1 < x2 && y1 < y2) {
        return Err(MetadataError::validation(format!(
            "degenerate bbox [{x1}, {y1}, {x2}, {y2}] for class '{}'",
            raw.class
        )));
    }
    Ok(())
}

/// Assemble an [`ImageRecord`] from raw detector output.
///
/// Pure and idempotent: the same raw detections always yield the same record.
/// Rejects malformed raw detections (empty class, out-of-range confidence,
/// degenerate box) instead of persisting them.
pub fn build_record(
    raw_detections: &[RawDetection],
    image_path: &str,
) -> Result<ImageRecord, MetadataError> {
    let mut class_counts: HashMap<String, u32> = HashMap::new();
    let mut unique_class = Vec::new();

    for raw in raw_detections {
        validate_raw(raw)?;
        let entry = class_counts.entry(raw.class.clone()).or_insert(0);
        if *entry == 0 {
            unique_class.push(raw.class.clone());
        }
        *entry += 1;
    }

    // Backfill each detection with its class total, mirroring the two-pass
    // assembly the detector output goes through upstream.
    let detections = raw_detections
        .iter()
        .map(|raw| Detection {
            class: raw.class.clone(),
            confidence: raw.confidence,
            bbox: raw.bbox,
            count: class_counts[&raw.class],
        })
        .collect::<Vec<_>>();

    Ok(ImageRecord {
        image_path: image_path.to_string(),
        total_objects: detections.len(),
        detections,
        unique_class,
        class_counts: class_counts.into_iter().collect(),
    })
}
