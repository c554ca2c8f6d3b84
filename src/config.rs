//! Configuration layer separating CLI arguments from internal configs.
//!
//! CLI structs own argument parsing and help text; `from_args` conversions
//! produce the internal configurations the processing and search code runs
//! on, validating user input along the way.

use clap::Parser;
use clap_verbosity_flag::Verbosity;
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::errors::MetadataError;
use crate::search::{SearchMode, SearchParameters, Threshold};

/// Parse probability value (must be between 0.0 and 1.0)
pub fn parse_probability(s: &str) -> Result<f32, String> {
    let val = s
        .parse::<f32>()
        .map_err(|_| format!("Invalid number: '{s}'"))?;
    if !(0.0..=1.0).contains(&val) {
        return Err(format!("Must be between 0.0 and 1.0, got {val}"));
    }
    Ok(val)
}

/// Parse a comma-separated class selection into a set of labels.
pub fn parse_selected_classes(s: &str) -> Result<BTreeSet<String>, MetadataError> {
    let classes: BTreeSet<String> = s
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();

    if classes.is_empty() {
        return Err(MetadataError::validation(
            "class selection is empty (expected a comma-separated list of labels)",
        ));
    }
    Ok(classes)
}

/// Global CLI arguments that apply to all spotter commands
#[derive(Parser, Debug, Clone)]
pub struct GlobalArgs {
    /// Verbosity level (-q/--quiet, -v/-vv/-vvv for info/debug/trace)
    #[command(flatten)]
    pub verbosity: Verbosity,

    /// Use permissive mode for input validation (warn instead of error for
    /// unsupported files)
    #[arg(long, global = true)]
    pub permissive: bool,

    /// Device to use for inference (auto, cpu, coreml)
    #[arg(long, default_value = "auto", global = true)]
    pub device: String,

    /// Disable colored output (also respects NO_COLOR and SPOTTER_NO_COLOR)
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// CLI command for running detection over a batch of images
#[derive(Parser, Debug, Clone)]
pub struct DetectCommand {
    /// Path(s) to input images or directories. Supports glob patterns like *.jpg
    #[arg(value_name = "IMAGES_OR_DIRS", required = true)]
    pub sources: Vec<String>,

    /// Path to the ONNX detection model
    #[arg(short, long, value_name = "MODEL")]
    pub model: PathBuf,

    /// Confidence threshold for detections (0.0-1.0)
    #[arg(short, long, default_value = "0.5", value_parser = parse_probability)]
    pub confidence: f32,

    /// IoU threshold for non-maximum suppression (0.0-1.0)
    #[arg(long, default_value = "0.45", value_parser = parse_probability)]
    pub iou_threshold: f32,

    /// Newline-separated class label file (defaults to the COCO-80 labels)
    #[arg(long, value_name = "FILE")]
    pub labels: Option<PathBuf>,

    /// Where to write the metadata collection
    #[arg(short, long, default_value = "metadata.json")]
    pub output: PathBuf,
}

/// CLI command for listing the search facets of a metadata file
#[derive(Parser, Debug, Clone)]
pub struct FacetsCommand {
    /// Path to a previously saved metadata file
    #[arg(value_name = "METADATA")]
    pub metadata: PathBuf,
}

/// CLI command for filtering a metadata file
#[derive(Parser, Debug, Clone)]
pub struct SearchCommand {
    /// Path to a previously saved metadata file
    #[arg(value_name = "METADATA")]
    pub metadata: PathBuf,

    /// Comma-separated class labels to search for
    #[arg(long, value_name = "CLASSES", required = true)]
    pub classes: String,

    /// How class predicates combine: 'any' (OR) or 'all' (AND)
    #[arg(long, default_value = "any")]
    pub mode: String,

    /// Upper bound on the per-image count for a class, as CLASS=N.
    /// Classes without a bound match when present at least once.
    #[arg(long, value_name = "CLASS=N")]
    pub max_count: Vec<String>,
}

/// Internal configuration for a detection run
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    pub sources: Vec<String>,
    pub model_path: PathBuf,
    pub labels_path: Option<PathBuf>,
    pub confidence: f32,
    pub iou_threshold: f32,
    pub output: PathBuf,
    pub device: String,
    pub strict: bool,
}

impl DetectionConfig {
    pub fn from_args(global: &GlobalArgs, cmd: DetectCommand) -> Self {
        Self {
            sources: cmd.sources,
            model_path: cmd.model,
            labels_path: cmd.labels,
            confidence: cmd.confidence,
            iou_threshold: cmd.iou_threshold,
            output: cmd.output,
            device: global.device.clone(),
            strict: !global.permissive,
        }
    }
}

/// Internal configuration for a search invocation
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub metadata_path: PathBuf,
    pub params: SearchParameters,
}

impl SearchConfig {
    /// Validate and convert the CLI arguments. Any malformed part (mode,
    /// class list, count bound) rejects the whole query before evaluation.
    pub fn from_args(cmd: SearchCommand) -> Result<Self, MetadataError> {
        let mode: SearchMode = cmd.mode.parse()?;
        let selected_classes = parse_selected_classes(&cmd.classes)?;

        let mut params = SearchParameters::new(mode, selected_classes);
        for spec in &cmd.max_count {
            let (class, threshold) = Threshold::parse_spec(spec)?;
            params.thresholds.insert(class, threshold);
        }

        Ok(Self {
            metadata_path: cmd.metadata,
            params,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global() -> GlobalArgs {
        GlobalArgs {
            verbosity: Verbosity::new(0, 0),
            permissive: false,
            device: "auto".to_string(),
            no_color: false,
        }
    }

    #[test]
    fn test_parse_probability() {
        assert_eq!(parse_probability("0.0"), Ok(0.0));
        assert_eq!(parse_probability("0.5"), Ok(0.5));
        assert_eq!(parse_probability("1.0"), Ok(1.0));

        assert!(parse_probability("-0.5").is_err());
        assert!(parse_probability("2.0").is_err());
        assert!(parse_probability("invalid").is_err());
    }

    #[test]
    fn test_parse_selected_classes() {
        let classes = parse_selected_classes("car, person,dog").unwrap();
        assert_eq!(classes.len(), 3);
        assert!(classes.contains("car"));
        assert!(classes.contains("person"));

        assert!(parse_selected_classes("").is_err());
        assert!(parse_selected_classes(" , ,").is_err());
    }

    #[test]
    fn test_detect_command_conversion() {
        let cmd = DetectCommand {
            sources: vec!["imgs/".to_string()],
            model: PathBuf::from("yolo.onnx"),
            confidence: 0.8,
            iou_threshold: 0.45,
            labels: None,
            output: PathBuf::from("out.json"),
        };

        let config = DetectionConfig::from_args(&global(), cmd);

        assert_eq!(config.sources, vec!["imgs/"]);
        assert_eq!(config.model_path, PathBuf::from("yolo.onnx"));
        assert_eq!(config.confidence, 0.8);
        assert!(config.strict); // permissive=false -> strict=true
        assert_eq!(config.device, "auto");
    }

    #[test]
    fn test_search_command_conversion() {
        let cmd = SearchCommand {
            metadata: PathBuf::from("metadata.json"),
            classes: "car,person".to_string(),
            mode: "all".to_string(),
            max_count: vec!["car=2".to_string()],
        };

        let config = SearchConfig::from_args(cmd).unwrap();
        assert_eq!(config.params.mode, SearchMode::All);
        assert_eq!(config.params.selected_classes.len(), 2);
        assert_eq!(
            config.params.thresholds.get("car"),
            Some(&Threshold::UpperBound(2))
        );
        assert!(!config.params.thresholds.contains_key("person"));
    }

    #[test]
    fn test_search_command_rejects_bad_mode() {
        let cmd = SearchCommand {
            metadata: PathBuf::from("metadata.json"),
            classes: "car".to_string(),
            mode: "sometimes".to_string(),
            max_count: vec![],
        };

        let err = SearchConfig::from_args(cmd).unwrap_err();
        assert!(matches!(err, MetadataError::Validation(_)));
    }

    #[test]
    fn test_search_command_rejects_bad_bound() {
        let cmd = SearchCommand {
            metadata: PathBuf::from("metadata.json"),
            classes: "car".to_string(),
            mode: "any".to_string(),
            max_count: vec!["car=two".to_string()],
        };

        let err = SearchConfig::from_args(cmd).unwrap_err();
        assert!(matches!(err, MetadataError::Validation(_)));
    }
}
