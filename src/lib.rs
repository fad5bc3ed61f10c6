// regionchonk - fixed-region PDF text extraction with OCR fallback
pub mod config;
pub mod output;
pub mod pdf_extraction;
pub mod runner;
pub mod types;

pub use config::{ConfigFile, Region, RunConfig, ToolPaths};
pub use types::{ExtractionResult, OutputFormat, Rect, RegionError, Result, Source};
