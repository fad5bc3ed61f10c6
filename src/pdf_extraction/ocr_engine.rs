// OCR fallback: crop, preprocess and recognize with Tesseract
use super::locator::{parse_tsv, OcrWord};
use crate::config::OcrSettings;
use crate::types::{Rect, RegionError, Result};
use image::DynamicImage;
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::filter::median_filter;
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

const POINTS_PER_INCH: f64 = 72.0;

/// Recognizes the text in an already cropped image.
pub trait OcrEngine {
    fn recognize(&self, image: &DynamicImage) -> Result<String>;
}

pub struct TesseractEngine {
    program: PathBuf,
    languages: String,
    psm: u8,
    dpi: u32,
    join_lines: bool,
}

impl TesseractEngine {
    pub fn new(program: impl Into<PathBuf>, languages: &[String], settings: &OcrSettings, dpi: u32) -> Self {
        Self {
            program: program.into(),
            languages: languages.join("+"),
            psm: settings.psm,
            dpi,
            join_lines: settings.join_lines,
        }
    }
}

impl TesseractEngine {
    // Runs tesseract on a temporary PNG of `image`; `config` names an output config such as `tsv`
    fn run(&self, image: &DynamicImage, config: Option<&str>) -> Result<String> {
        let input = tempfile::Builder::new()
            .prefix("region-")
            .suffix(".png")
            .tempfile()?;
        image
            .save_with_format(input.path(), image::ImageFormat::Png)
            .map_err(|e| RegionError::OcrEngine(format!("cannot write OCR input: {}", e)))?;

        let output = Command::new(&self.program)
            .arg(input.path())
            .arg("stdout")
            .args(["-l", &self.languages])
            .args(["--psm", &self.psm.to_string()])
            .args(["--dpi", &self.dpi.to_string()])
            .args(config)
            .output()
            .map_err(|e| RegionError::OcrEngine(format!("failed to run {}: {}", self.program.display(), e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RegionError::OcrEngine(format!("tesseract failed: {}", stderr.trim())));
        }

        let raw = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("tesseract returned {} bytes", raw.len());
        Ok(raw)
    }

    /// Every recognized word of `image` with its pixel box.
    pub fn recognize_words(&self, image: &DynamicImage) -> Result<Vec<OcrWord>> {
        let tsv = self.run(image, Some("tsv"))?;
        parse_tsv(&tsv)
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, image: &DynamicImage) -> Result<String> {
        let raw = self.run(image, None)?;
        Ok(clean_ocr_text(&raw, self.join_lines))
    }
}

/// Pixel crop of `rect` (in points) from a page rendered at `dpi`.
///
/// Returns `None` when the rectangle falls entirely outside the image.
pub fn crop_region(page: &DynamicImage, rect: &Rect, dpi: u32) -> Option<DynamicImage> {
    let px = rect.scaled(dpi as f64 / POINTS_PER_INCH);
    let (w, h) = (page.width() as f64, page.height() as f64);

    let x0 = px.x0.floor().clamp(0.0, w) as u32;
    let y0 = px.y0.floor().clamp(0.0, h) as u32;
    let x1 = px.x1.ceil().clamp(0.0, w) as u32;
    let y1 = px.y1.ceil().clamp(0.0, h) as u32;

    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(page.crop_imm(x0, y0, x1 - x0, y1 - y0))
}

pub fn preprocess(image: DynamicImage, settings: &OcrSettings) -> DynamicImage {
    if !(settings.grayscale || settings.denoise || settings.binarize) {
        return image;
    }

    let mut gray = image.to_luma8();
    if settings.denoise {
        // 3x3 window
        gray = median_filter(&gray, 1, 1);
    }
    if settings.binarize {
        let level = otsu_level(&gray);
        gray = threshold(&gray, level, ThresholdType::Binary);
    }
    DynamicImage::ImageLuma8(gray)
}

/// Trim engine output; optionally rejoin hyphenated breaks and fold lines.
pub fn clean_ocr_text(raw: &str, join_lines: bool) -> String {
    let text = raw.replace("\r\n", "\n").replace('\u{c}', "");
    if !join_lines {
        return text.trim().to_string();
    }
    text.replace("-\n", "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
