//! fontpreview - headless driver for the font preview pipeline
//!
//! This crate wires `preview-core` to a JSON font list on disk, a scanned
//! system font surface and the out-of-process rendering helper:
//! - Render plans for every font in a list
//! - Helper catalog inspection
//! - Batched bitmap previews written as image files

pub mod constants;
pub mod driver;
pub mod error;
pub mod host_file;
pub mod logger;

// Re-export main types for convenience
pub use driver::{PlanRow, PreviewOptions, PreviewSummary};
pub use error::{AppError, AppResult};
pub use host_file::JsonFileHost;
