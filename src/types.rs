// Core types for regionchonk
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Rectangle in PDF points, top-left origin.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    pub const fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f64 {
        (self.x1 - self.x0).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.y1 - self.y0).max(0.0)
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn is_valid(&self) -> bool {
        [self.x0, self.y0, self.x1, self.y1].iter().all(|v| v.is_finite())
            && self.x0 < self.x1
            && self.y0 < self.y1
    }

    /// Overlapping rectangle, if the two share any area.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let r = Rect::new(
            self.x0.max(other.x0),
            self.y0.max(other.y0),
            self.x1.min(other.x1),
            self.y1.min(other.y1),
        );
        if r.x0 < r.x1 && r.y0 < r.y1 {
            Some(r)
        } else {
            None
        }
    }

    pub fn scaled(&self, factor: f64) -> Rect {
        Rect::new(self.x0 * factor, self.y0 * factor, self.x1 * factor, self.y1 * factor)
    }
}

impl From<[f64; 4]> for Rect {
    fn from([x0, y0, x1, y1]: [f64; 4]) -> Self {
        Self { x0, y0, x1, y1 }
    }
}

impl From<Rect> for [f64; 4] {
    fn from(r: Rect) -> [f64; 4] {
        [r.x0, r.y0, r.x1, r.y1]
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1}, {:.1}, {:.1})", self.x0, self.y0, self.x1, self.y1)
    }
}

// Where a region's text came from
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Direct,
    Ocr,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Direct => f.write_str("direct"),
            Source::Ocr => f.write_str("ocr"),
        }
    }
}

/// One row of output: exactly one per configured region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub region_name: String,
    pub page_index: usize,
    pub text: String,
    pub source: Source,
}

impl ExtractionResult {
    pub fn new(region_name: impl Into<String>, page_index: usize, text: impl Into<String>, source: Source) -> Self {
        Self {
            region_name: region_name.into(),
            page_index,
            text: text.into(),
            source,
        }
    }

    pub fn empty(region_name: impl Into<String>, page_index: usize) -> Self {
        Self::new(region_name, page_index, String::new(), Source::Ocr)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }

    pub fn from_extension(path: &std::path::Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(OutputFormat::Csv),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }
}

// Error types
#[derive(Debug, thiserror::Error)]
pub enum RegionError {
    #[error("cannot open document {path}: {reason}")]
    Document { path: PathBuf, reason: String },

    #[error("page {page} could not be rendered: {reason}")]
    PageRender { page: usize, reason: String },

    #[error("text layout unavailable for page {page}: {reason}")]
    Layout { page: usize, reason: String },

    #[error("OCR engine error: {0}")]
    OcrEngine(String),

    #[error("cannot write output to {path}: {reason}")]
    OutputWrite { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("required tool `{0}` is not installed or not on PATH")]
    MissingTool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RegionError>;
