//! YOLO-family ONNX detector: preprocessing, output decoding, and NMS.
//!
//! Works with models exporting the usual `[1, 4 + num_classes, num_boxes]`
//! output layout. Class labels default to the COCO-80 set and can be
//! overridden with a newline-separated label file.

use anyhow::Result;
use image::{DynamicImage, GenericImageView};
use log::debug;
use ndarray::Array;
use ort::{session::Session, value::Value};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::processing::Detector;
use crate::record::RawDetection;

/// Default label set for models trained on COCO.
pub const COCO_CLASSES: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

/// Load class labels from a newline-separated file, skipping blank lines.
pub fn load_labels(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    let labels: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();

    if labels.is_empty() {
        anyhow::bail!("Label file contains no labels: {}", path.display());
    }
    Ok(labels)
}

/// Letterbox an image to `target_size` x `target_size` and convert it to a
/// normalized NCHW tensor.
pub fn preprocess_image(img: &DynamicImage, target_size: u32) -> Result<Array<f32, ndarray::IxDyn>> {
    let rgb_img = img.to_rgb8();
    let (orig_width, orig_height) = rgb_img.dimensions();

    let max_dim = orig_width.max(orig_height);
    let scale = (target_size as f32) / (max_dim as f32);
    let new_width = (orig_width as f32 * scale) as u32;
    let new_height = (orig_height as f32 * scale) as u32;

    let resized = image::imageops::resize(
        &rgb_img,
        new_width,
        new_height,
        image::imageops::FilterType::Lanczos3,
    );

    // Gray padding (114, 114, 114) around the centered resize, YOLO-style.
    let mut letterboxed = image::RgbImage::new(target_size, target_size);
    for pixel in letterboxed.pixels_mut() {
        *pixel = image::Rgb([114, 114, 114]);
    }

    let x_offset = (target_size - new_width) / 2;
    let y_offset = (target_size - new_height) / 2;
    for y in 0..new_height {
        for x in 0..new_width {
            letterboxed.put_pixel(x + x_offset, y + y_offset, *resized.get_pixel(x, y));
        }
    }

    let mut input_data = Vec::with_capacity((3 * target_size * target_size) as usize);
    for c in 0..3 {
        for y in 0..target_size {
            for x in 0..target_size {
                input_data.push(letterboxed.get_pixel(x, y)[c] as f32 / 255.0);
            }
        }
    }

    let input = Array::from_shape_vec(
        ndarray::IxDyn(&[1, 3, target_size as usize, target_size as usize]),
        input_data,
    )?;

    Ok(input)
}

/// Per-class non-maximum suppression.
pub fn nms(detections: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    if detections.is_empty() {
        return detections;
    }

    let mut class_groups: HashMap<String, Vec<RawDetection>> = HashMap::new();
    for detection in detections {
        class_groups
            .entry(detection.class.clone())
            .or_default()
            .push(detection);
    }

    let mut all_results = Vec::new();

    for (_, mut class_detections) in class_groups {
        class_detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let mut suppressed = vec![false; class_detections.len()];
        for i in 0..class_detections.len() {
            if suppressed[i] {
                continue;
            }
            for j in (i + 1)..class_detections.len() {
                if !suppressed[j] && class_detections[i].iou(&class_detections[j]) > iou_threshold {
                    suppressed[j] = true;
                }
            }
        }

        all_results.extend(
            class_detections
                .into_iter()
                .zip(suppressed)
                .filter(|(_, s)| !*s)
                .map(|(d, _)| d),
        );
    }

    all_results
}

/// Decode raw model output of shape `[1, 4 + num_classes, num_boxes]` into
/// detections in original-image coordinates, then apply NMS.
pub fn postprocess_output(
    output: &Array<f32, ndarray::IxDyn>,
    labels: &[String],
    confidence_threshold: f32,
    iou_threshold: f32,
    img_width: u32,
    img_height: u32,
    model_size: u32,
) -> Result<Vec<RawDetection>> {
    let shape = output.shape();
    if shape.len() != 3 {
        anyhow::bail!("Expected 3D model output, got {}D", shape.len());
    }
    let num_classes = shape[1].saturating_sub(4);
    if num_classes == 0 {
        anyhow::bail!("Model output has no class channels (shape {shape:?})");
    }
    let num_boxes = shape[2];

    // The letterbox is centered, so undo the pad before scaling back.
    let max_dim = img_width.max(img_height) as f32;
    let scale = max_dim / model_size as f32;
    let pad_x = (model_size as f32 - img_width as f32 / scale) / 2.0;
    let pad_y = (model_size as f32 - img_height as f32 / scale) / 2.0;

    let mut detections = Vec::new();

    for i in 0..num_boxes {
        let mut max_confidence = 0.0_f32;
        let mut best_class = 0;
        for class_idx in 0..num_classes {
            let class_confidence = output[[0, 4 + class_idx, i]];
            if class_confidence > max_confidence {
                max_confidence = class_confidence;
                best_class = class_idx;
            }
        }

        if max_confidence <= confidence_threshold {
            continue;
        }

        let x_center = output[[0, 0, i]];
        let y_center = output[[0, 1, i]];
        let width = output[[0, 2, i]];
        let height = output[[0, 3, i]];

        let x1 = ((x_center - width / 2.0) - pad_x) * scale;
        let y1 = ((y_center - height / 2.0) - pad_y) * scale;
        let x2 = ((x_center + width / 2.0) - pad_x) * scale;
        let y2 = ((y_center + height / 2.0) - pad_y) * scale;

        // Clamp to the image; drop boxes that collapse entirely.
        let x1 = x1.clamp(0.0, img_width as f32);
        let y1 = y1.clamp(0.0, img_height as f32);
        let x2 = x2.clamp(0.0, img_width as f32);
        let y2 = y2.clamp(0.0, img_height as f32);
        if x2 <= x1 || y2 <= y1 {
            continue;
        }

        let class = labels
            .get(best_class)
            .cloned()
            .unwrap_or_else(|| format!("class_{best_class}"));

        detections.push(RawDetection {
            class,
            confidence: max_confidence.min(1.0),
            bbox: [x1, y1, x2, y2],
        });
    }

    let mut detections = nms(detections, iou_threshold);
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    Ok(detections)
}

/// An ONNX YOLO model behind the [`Detector`] seam.
pub struct YoloDetector {
    session: Session,
    labels: Vec<String>,
    confidence: f32,
    iou_threshold: f32,
}

impl YoloDetector {
    pub fn new(
        session: Session,
        labels: Vec<String>,
        confidence: f32,
        iou_threshold: f32,
    ) -> Self {
        Self {
            session,
            labels,
            confidence,
            iou_threshold,
        }
    }

    /// Query the model's square input size from session metadata, defaulting
    /// to 640 when the shape is not a plain static tensor.
    fn model_input_size(&self) -> u32 {
        let input_md = &self.session.inputs[0];
        let dimensions = match &input_md.input_type {
            ort::value::ValueType::Tensor {
                ty: _,
                shape,
                dimension_symbols: _,
            } => shape.to_vec(),
            _ => {
                debug!(
                    "Unexpected input type: {:?}. Defaulting to 640x640",
                    input_md.input_type
                );
                return 640;
            }
        };

        if dimensions.len() == 4 && dimensions[3] > 0 {
            dimensions[3] as u32
        } else {
            640
        }
    }
}

impl Detector for YoloDetector {
    fn detect_image(&mut self, image_path: &Path) -> Result<Vec<RawDetection>> {
        let img = image::open(image_path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", image_path.display(), e))?;
        let (orig_width, orig_height) = img.dimensions();

        debug!(
            "📷 Processing {}: {}x{}",
            image_path.display(),
            orig_width,
            orig_height
        );

        let model_size = self.model_input_size();
        let input_name = self.session.inputs[0].name.clone();
        let output_name = self.session.outputs[0].name.clone();

        let input_tensor = preprocess_image(&img, model_size)?;
        let input_value = Value::from_array(input_tensor)
            .map_err(|e| anyhow::anyhow!("Failed to create input value: {}", e))?;

        let inference_start = std::time::Instant::now();
        let outputs = self
            .session
            .run(ort::inputs![input_name.as_str() => &input_value])
            .map_err(|e| anyhow::anyhow!("Failed to run inference: {}", e))?;
        debug!(
            "⚡ Inference completed in {:.1} ms",
            inference_start.elapsed().as_secs_f64() * 1000.0
        );

        let output_view = outputs[output_name.as_str()]
            .try_extract_array::<f32>()
            .map_err(|e| anyhow::anyhow!("Failed to extract output array: {}", e))?;
        let output_array =
            Array::from_shape_vec(output_view.shape(), output_view.iter().cloned().collect())?;

        postprocess_output(
            &output_array,
            &self.labels,
            self.confidence,
            self.iou_threshold,
            orig_width,
            orig_height,
            model_size,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(class: &str, confidence: f32, bbox: [f32; 4]) -> RawDetection {
        RawDetection {
            class: class.to_string(),
            confidence,
            bbox,
        }
    }

    #[test]
    fn test_nms_suppresses_overlapping_same_class() {
        let detections = vec![
            raw("car", 0.9, [0.0, 0.0, 100.0, 100.0]),
            raw("car", 0.8, [5.0, 5.0, 105.0, 105.0]),
            raw("car", 0.7, [300.0, 300.0, 400.0, 400.0]),
        ];

        let kept = nms(detections, 0.45);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().any(|d| (d.confidence - 0.9).abs() < 1e-6));
        assert!(kept.iter().any(|d| (d.confidence - 0.7).abs() < 1e-6));
    }

    #[test]
    fn test_nms_keeps_overlapping_different_classes() {
        let detections = vec![
            raw("car", 0.9, [0.0, 0.0, 100.0, 100.0]),
            raw("person", 0.8, [5.0, 5.0, 105.0, 105.0]),
        ];

        let kept = nms(detections, 0.45);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_postprocess_decodes_and_scales_boxes() {
        // One candidate box centered in a 640 model space, square 640x640
        // image (no letterbox pad): 2 classes, second one wins.
        let num_boxes = 1;
        let mut data = vec![0.0_f32; 6 * num_boxes];
        data[0] = 320.0; // x_center
        data[1] = 320.0; // y_center
        data[2] = 100.0; // width
        data[3] = 200.0; // height
        data[4] = 0.1; // class 0 score
        data[5] = 0.9; // class 1 score

        let output = Array::from_shape_vec(ndarray::IxDyn(&[1, 6, num_boxes]), data).unwrap();
        let labels = vec!["cat".to_string(), "dog".to_string()];

        let detections =
            postprocess_output(&output, &labels, 0.5, 0.45, 1280, 1280, 640).unwrap();

        assert_eq!(detections.len(), 1);
        let det = &detections[0];
        assert_eq!(det.class, "dog");
        // 2x scale from 640 model space to the 1280 image.
        assert!((det.bbox[0] - 540.0).abs() < 1.0);
        assert!((det.bbox[1] - 440.0).abs() < 1.0);
        assert!((det.bbox[2] - 740.0).abs() < 1.0);
        assert!((det.bbox[3] - 840.0).abs() < 1.0);
    }

    #[test]
    fn test_postprocess_filters_low_confidence() {
        let output =
            Array::from_shape_vec(ndarray::IxDyn(&[1, 6, 1]), vec![320.0, 320.0, 10.0, 10.0, 0.2, 0.3])
                .unwrap();
        let labels = vec!["cat".to_string(), "dog".to_string()];

        let detections = postprocess_output(&output, &labels, 0.5, 0.45, 640, 640, 640).unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn test_postprocess_rejects_wrong_rank() {
        let output = Array::from_shape_vec(ndarray::IxDyn(&[6, 1]), vec![0.0; 6]).unwrap();
        let labels = vec!["cat".to_string()];
        assert!(postprocess_output(&output, &labels, 0.5, 0.45, 640, 640, 640).is_err());
    }

    #[test]
    fn test_preprocess_produces_normalized_nchw_tensor() {
        let img = DynamicImage::new_rgb8(100, 50);
        let tensor = preprocess_image(&img, 64).unwrap();

        assert_eq!(tensor.shape(), &[1, 3, 64, 64]);
        assert!(tensor.iter().all(|&v| (0.0..=1.0).contains(&v)));
        // Padding rows hold the gray fill value.
        assert!((tensor[[0, 0, 0, 0]] - 114.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_load_labels_skips_blank_lines() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("labels.txt");
        std::fs::write(&path, "car\n\nperson\n  \ndog\n").unwrap();

        let labels = load_labels(&path).unwrap();
        assert_eq!(labels, vec!["car", "person", "dog"]);
    }

    #[test]
    fn test_load_labels_rejects_empty_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("labels.txt");
        std::fs::write(&path, "\n\n").unwrap();
        assert!(load_labels(&path).is_err());
    }

    #[test]
    fn test_coco_class_table_is_complete() {
        assert_eq!(COCO_CLASSES.len(), 80);
        assert_eq!(COCO_CLASSES[0], "person");
        assert_eq!(COCO_CLASSES[2], "car");
    }
}
