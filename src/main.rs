use anyhow::Result;
use clap::Parser;
use env_logger::Builder;
use env_logger::Env;
use log::{error, info, Level};

mod color_utils;
mod config;
mod errors;
mod facets;
mod image_input;
mod metadata;
mod onnx_session;
mod processing;
mod progress;
mod record;
mod search;
mod yolo;

use colored::*;
use config::{
    DetectCommand, DetectionConfig, FacetsCommand, GlobalArgs, SearchCommand, SearchConfig,
};
use std::io::Write;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Detect objects in images and write per-image metadata
    Detect(DetectCommand),

    /// List the classes and count values present in a metadata file
    Facets(FacetsCommand),

    /// Filter a metadata file by class and per-class count bounds
    Search(SearchCommand),

    /// Show version information
    Version,
}

#[derive(Parser)]
#[command(name = "spotter")]
#[command(about = "Batch object detection with searchable metadata")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

fn get_log_level_from_verbosity(verbosity: &clap_verbosity_flag::Verbosity) -> log::LevelFilter {
    let adjusted_level = match verbosity.log_level_filter() {
        log::LevelFilter::Off => log::LevelFilter::Off,
        log::LevelFilter::Error => log::LevelFilter::Warn, // default -> WARN
        log::LevelFilter::Warn => log::LevelFilter::Info,  // -v -> INFO
        log::LevelFilter::Info => log::LevelFilter::Debug, // -vv -> DEBUG
        log::LevelFilter::Debug => log::LevelFilter::Trace, // -vvv -> TRACE
        log::LevelFilter::Trace => log::LevelFilter::Trace,
    };

    // clap-verbosity-flag can't distinguish default from -q, so check quiet
    // directly.
    if verbosity.is_silent() {
        log::LevelFilter::Error
    } else {
        adjusted_level
    }
}

fn init_logger(cli: &Cli) {
    // If user didn't pass -v/-q and RUST_LOG is set, honor the env var.
    let use_env = !cli.global.verbosity.is_present() && std::env::var_os("RUST_LOG").is_some();

    let mut logger = if use_env {
        Builder::from_env(Env::default())
    } else {
        let mut b = Builder::new();
        b.filter_level(get_log_level_from_verbosity(&cli.global.verbosity));
        b
    };

    logger
        .format(|buf, record| {
            let level_str = match record.level() {
                Level::Error => "ERROR".red().bold().to_string(),
                Level::Warn => "WARN".yellow().to_string(),
                Level::Info => "INFO".green().to_string(),
                Level::Debug => "DEBUG".blue().to_string(),
                Level::Trace => "TRACE".magenta().to_string(),
            };
            writeln!(buf, "[{}] {}", level_str, record.args())
        })
        .init();
}

/// Run a detection batch and persist the resulting collection.
fn run_detect(config: DetectionConfig) -> Result<()> {
    let device_selection = onnx_session::determine_optimal_device(&config.device);
    info!(
        "Device: {} ({})",
        device_selection.device, device_selection.reason
    );

    let labels = match &config.labels_path {
        Some(path) => yolo::load_labels(path)?,
        None => yolo::COCO_CLASSES.iter().map(|s| s.to_string()).collect(),
    };

    let (session, _load_ms) =
        onnx_session::create_onnx_session(&config.model_path, &device_selection.device)?;
    let mut detector =
        yolo::YoloDetector::new(session, labels, config.confidence, config.iou_threshold);

    let summary = processing::run_detection(&mut detector, &config)?;
    metadata::save_metadata(&summary.collection, &config.output)?;

    info!(
        "{} Wrote {} record(s) to {}",
        color_utils::symbols::completed_successfully(),
        summary.collection.len(),
        config.output.display()
    );
    Ok(())
}

fn run_facets(cmd: FacetsCommand) -> Result<()> {
    let collection = metadata::load_metadata(&cmd.metadata)?;
    let facets = facets::extract_facets(&collection);

    println!(
        "{} image(s), {} class(es)",
        collection.len(),
        facets.unique_classes.len()
    );
    for class in &facets.unique_classes {
        let counts = facets.count_options[class]
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        println!("  {class}: counts [{counts}]");
    }
    Ok(())
}

fn run_search(cmd: SearchCommand) -> Result<()> {
    let config = SearchConfig::from_args(cmd)?;
    let collection = metadata::load_metadata(&config.metadata_path)?;
    let matches = search::search(&config.params, &collection);

    println!("{} match(es)", matches.len());
    for record in matches {
        let summary = config
            .params
            .selected_classes
            .iter()
            .map(|class| {
                let n = record.class_counts.get(class).copied().unwrap_or(0);
                format!("{class}={n}")
            })
            .collect::<Vec<_>>()
            .join(", ");
        println!("{}  [{summary}]", record.image_path);
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    init_logger(&cli);
    color_utils::init_color_config(cli.global.no_color);

    match cli.command {
        Some(Commands::Detect(detect_cmd)) => {
            let sources_desc = if detect_cmd.sources.len() == 1 {
                detect_cmd.sources[0].clone()
            } else {
                format!("{} inputs", detect_cmd.sources.len())
            };
            info!(
                "{} Detection: {} | conf: {} | IoU: {} | device: {}",
                color_utils::symbols::detection_start(),
                sources_desc,
                detect_cmd.confidence,
                detect_cmd.iou_threshold,
                cli.global.device
            );

            let config = DetectionConfig::from_args(&cli.global, detect_cmd);
            if let Err(e) = run_detect(config) {
                error!(
                    "{} Detection failed: {e}",
                    color_utils::symbols::operation_failed()
                );
                std::process::exit(1);
            }
        }
        Some(Commands::Facets(facets_cmd)) => {
            if let Err(e) = run_facets(facets_cmd) {
                error!(
                    "{} Facet listing failed: {e}",
                    color_utils::symbols::operation_failed()
                );
                std::process::exit(1);
            }
        }
        Some(Commands::Search(search_cmd)) => {
            if let Err(e) = run_search(search_cmd) {
                error!(
                    "{} Search failed: {e}",
                    color_utils::symbols::operation_failed()
                );
                std::process::exit(1);
            }
        }
        Some(Commands::Version) => {
            println!("spotter v{}", env!("CARGO_PKG_VERSION"));
        }
        None => {
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            cmd.print_help().unwrap();
        }
    }
}
