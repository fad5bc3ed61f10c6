// Text layer with word positions via `pdftotext -bbox`
//
// pdftotext reports every word as
//   <word xMin="72.000000" yMin="71.8" xMax="125.3" yMax="85.1">Invoice</word>
// in PDF points with a top-left origin, which is the coordinate space regions use.

use super::document::PdfDocument;
use crate::types::{Rect, RegionError, Result};
use regex::Regex;
use std::path::PathBuf;
use std::process::Command;
use std::sync::OnceLock;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub bbox: Rect,
}

impl TextRun {
    pub fn new(text: impl Into<String>, bbox: Rect) -> Self {
        Self {
            text: text.into(),
            bbox,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    pub runs: Vec<TextRun>,
}

/// Supplies the positioned text of one page.
pub trait TextLayoutSource {
    fn page_layout(&self, document: &PdfDocument, page_index: usize) -> Result<PageLayout>;
}

pub struct PdfToTextLayout {
    program: PathBuf,
}

impl PdfToTextLayout {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl TextLayoutSource for PdfToTextLayout {
    fn page_layout(&self, document: &PdfDocument, page_index: usize) -> Result<PageLayout> {
        // page_index is 0-based, pdftotext is 1-based
        let page = (page_index + 1).to_string();
        let output = Command::new(&self.program)
            .args(["-bbox", "-enc", "UTF-8", "-f", &page, "-l", &page])
            .arg(document.path())
            .arg("-")
            .output()
            .map_err(|e| RegionError::Layout {
                page: page_index,
                reason: format!("failed to run {}: {}", self.program.display(), e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RegionError::Layout {
                page: page_index,
                reason: format!("pdftotext failed: {}", stderr.trim()),
            });
        }

        let layout = parse_bbox_html(&String::from_utf8_lossy(&output.stdout));
        debug!("Page {} layout: {} runs", page_index, layout.runs.len());
        Ok(layout)
    }
}

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"<word xMin="([-0-9.]+)" yMin="([-0-9.]+)" xMax="([-0-9.]+)" yMax="([-0-9.]+)">(.*?)</word>"#,
        )
        .expect("valid word regex")
    })
}

/// Parse the XHTML written by `pdftotext -bbox` for a single page.
pub fn parse_bbox_html(html: &str) -> PageLayout {
    let mut layout = PageLayout::default();

    for caps in word_re().captures_iter(html) {
        let coords: Option<Vec<f64>> = (1..=4).map(|i| caps[i].parse().ok()).collect();
        let Some(c) = coords else { continue };
        let text = unescape_xml(&caps[5]);
        if text.trim().is_empty() {
            continue;
        }
        layout.runs.push(TextRun::new(text, Rect::new(c[0], c[1], c[2], c[3])));
    }

    layout
}

fn unescape_xml(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
