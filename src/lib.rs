pub mod color_utils;
pub mod config;
pub mod errors;
pub mod facets;
pub mod image_input;
pub mod metadata;
pub mod onnx_session;
pub mod processing;
pub mod progress;
pub mod record;
pub mod search;
pub mod yolo;
