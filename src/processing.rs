//! Batch processing run: drive a detector over a set of images and build
//! the metadata collection.

use anyhow::Result;
use std::path::Path;
use std::time::Instant;

use crate::color_utils::symbols;
use crate::config::DetectionConfig;
use crate::image_input::{collect_images_from_sources, ImageInputConfig};
use crate::metadata::MetadataCollection;
use crate::record::{build_record, RawDetection};

/// The seam to the external detection collaborator: anything that can turn
/// an image file into raw detections.
pub trait Detector {
    fn detect_image(&mut self, image_path: &Path) -> Result<Vec<RawDetection>>;
}

/// Outcome of a batch run.
#[derive(Debug)]
pub struct RunSummary {
    pub collection: MetadataCollection,
    pub successful: usize,
    pub failed: usize,
}

/// Process every image the config's sources resolve to.
///
/// Per-image failures (unreadable file, inference error, malformed detector
/// output) are logged and skipped; they never abort the rest of the run. The
/// returned collection holds one record per successfully processed image, in
/// input order.
pub fn run_detection<D: Detector>(detector: &mut D, config: &DetectionConfig) -> Result<RunSummary> {
    let run_start = Instant::now();

    let image_config = ImageInputConfig::from_strict_flag(config.strict);
    let image_files = collect_images_from_sources(&config.sources, &image_config)?;

    if image_files.is_empty() {
        log::warn!("No valid images found to process");
        return Ok(RunSummary {
            collection: Vec::new(),
            successful: 0,
            failed: 0,
        });
    }

    log::info!(
        "{} Found {} image(s) to process",
        symbols::resources_found(),
        image_files.len()
    );

    let progress = crate::color_utils::progress::create_batch_progress_bar(image_files.len());

    let mut collection: MetadataCollection = Vec::new();
    let mut failed = 0;

    for (index, image_path) in image_files.iter().enumerate() {
        if let Some(pb) = &progress {
            pb.set_message(
                image_path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
            );
        }

        let image_start = Instant::now();
        let result = detector
            .detect_image(image_path)
            .and_then(|raw| Ok(build_record(&raw, &image_path.to_string_lossy())?));

        match result {
            Ok(record) => {
                log::info!(
                    "{} Processed {} ({}/{}) in {:.1}ms: {} object(s)",
                    symbols::completed_successfully(),
                    image_path.display(),
                    index + 1,
                    image_files.len(),
                    image_start.elapsed().as_secs_f64() * 1000.0,
                    record.total_objects
                );
                collection.push(record);
            }
            Err(e) => {
                failed += 1;
                log::warn!(
                    "{} Failed to process {} ({}/{}): {}",
                    symbols::warning(),
                    image_path.display(),
                    index + 1,
                    image_files.len(),
                    e
                );
            }
        }

        if let Some(pb) = &progress {
            pb.inc(1);
        }
    }

    if let Some(pb) = &progress {
        pb.finish_and_clear();
        crate::progress::remove_progress_bar(pb);
    }

    let successful = collection.len();
    if successful > 0 {
        log::info!(
            "{} Processed {} images in {:.1}s",
            symbols::completed_successfully(),
            successful,
            run_start.elapsed().as_secs_f64()
        );
    }
    if failed > 0 {
        log::warn!(
            "{} {} of {} images failed to process",
            symbols::warning(),
            failed,
            image_files.len()
        );
    }

    Ok(RunSummary {
        collection,
        successful,
        failed,
    })
}
