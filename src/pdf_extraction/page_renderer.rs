// Page rasterization using pdftoppm
use super::document::PdfDocument;
use crate::types::{RegionError, Result};
use image::DynamicImage;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;
use tracing::debug;

/// Rasterizes one page of a document at a given resolution.
pub trait PageRenderer {
    fn render(&self, document: &PdfDocument, page_index: usize, dpi: u32) -> Result<DynamicImage>;
}

pub struct PdftoppmRenderer {
    program: PathBuf,
}

impl PdftoppmRenderer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl PageRenderer for PdftoppmRenderer {
    fn render(&self, document: &PdfDocument, page_index: usize, dpi: u32) -> Result<DynamicImage> {
        if page_index >= document.page_count() {
            return Err(RegionError::PageRender {
                page: page_index,
                reason: format!("document has {} pages", document.page_count()),
            });
        }

        let render_err = |reason: String| RegionError::PageRender {
            page: page_index,
            reason,
        };

        let temp_dir = TempDir::new()?;
        let output_prefix = temp_dir.path().join("page");

        // page_index is 0-based in our code but pdftoppm uses 1-based
        let page = (page_index + 1).to_string();
        debug!("pdftoppm: rendering page {} at {} dpi", page, dpi);

        let output = Command::new(&self.program)
            .args(["-png", "-singlefile", "-r", &dpi.to_string(), "-f", &page, "-l", &page])
            .arg(document.path())
            .arg(&output_prefix)
            .output()
            .map_err(|e| render_err(format!("failed to run {}: {}", self.program.display(), e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(render_err(format!("pdftoppm failed: {}", stderr.trim())));
        }

        // -singlefile writes exactly <prefix>.png
        let output_file = output_prefix.with_extension("png");
        if !output_file.exists() {
            return Err(render_err(format!("output file not found at {:?}", output_file)));
        }

        let image = image::open(&output_file).map_err(|e| render_err(e.to_string()))?;
        debug!("Page {} rendered: {}x{}", page_index, image.width(), image.height());
        Ok(image)
    }
}
