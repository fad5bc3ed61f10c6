// Finding region coordinates on scanned pages from OCR word boxes
//
// `tesseract <img> stdout tsv` reports one row per layout element:
//   level page_num block_num par_num line_num word_num left top width height conf text
// Level 5 rows are words; boxes are in pixels of the recognized image.

use crate::types::{Rect, RegionError, Result};
use image::{DynamicImage, Rgb};
use imageproc::drawing::draw_hollow_rect_mut;
use serde::Deserialize;
use std::path::Path;

const WORD_LEVEL: u32 = 5;
const POINTS_PER_INCH: f64 = 72.0;

/// Minimum similarity for a word window to count as the searched phrase.
pub const MATCH_RATIO: f64 = 0.9;

// Longest run of consecutive words joined into one candidate
const MAX_WINDOW: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct OcrWord {
    pub text: String,
    pub bbox: Rect,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhraseMatch {
    /// Recognized words of the window, space separated.
    pub text: String,
    pub bbox: Rect,
    pub ratio: f64,
}

#[derive(Debug, Deserialize)]
struct TsvRow {
    level: u32,
    left: f64,
    top: f64,
    width: f64,
    height: f64,
    #[serde(default)]
    text: String,
}

/// Parse tesseract's TSV output into word boxes, skipping empty words.
pub fn parse_tsv(tsv: &str) -> Result<Vec<OcrWord>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .quoting(false)
        .flexible(true)
        .from_reader(tsv.as_bytes());

    let mut words = Vec::new();
    for row in reader.deserialize::<TsvRow>() {
        let row = row.map_err(|e| RegionError::OcrEngine(format!("unreadable tesseract TSV: {}", e)))?;
        let text = row.text.trim();
        if row.level != WORD_LEVEL || text.is_empty() {
            continue;
        }
        words.push(OcrWord {
            text: text.to_string(),
            bbox: Rect::new(row.left, row.top, row.left + row.width, row.top + row.height),
        });
    }
    Ok(words)
}

// Case, spaces and hyphens differ freely between OCR output and what users type
fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// First window of one to three consecutive words resembling `needle`.
pub fn find_phrase(words: &[OcrWord], needle: &str) -> Option<PhraseMatch> {
    let target = normalize(needle);
    if target.is_empty() {
        return None;
    }
    let normalized = words.iter().map(|w| normalize(&w.text)).collect::<Vec<_>>();

    for start in 0..words.len() {
        for len in 1..=MAX_WINDOW {
            let end = start + len;
            if end > words.len() {
                break;
            }
            let joined = normalized[start..end].concat();
            let ratio = strsim::normalized_levenshtein(&joined, &target);
            if ratio > MATCH_RATIO {
                let window = &words[start..end];
                return Some(PhraseMatch {
                    text: window.iter().map(|w| w.text.as_str()).collect::<Vec<_>>().join(" "),
                    bbox: union(window),
                    ratio,
                });
            }
        }
    }
    None
}

fn union(words: &[OcrWord]) -> Rect {
    words.iter().skip(1).fold(words[0].bbox, |acc, w| {
        Rect::new(
            acc.x0.min(w.bbox.x0),
            acc.y0.min(w.bbox.y0),
            acc.x1.max(w.bbox.x1),
            acc.y1.max(w.bbox.y1),
        )
    })
}

/// Convert a pixel box from a page rendered at `dpi` to points, grown by
/// `padding` points on every side and kept inside `page` when known.
pub fn pixel_box_to_points(bbox: &Rect, dpi: u32, padding: f64, page: Option<&Rect>) -> Rect {
    let pts = bbox.scaled(POINTS_PER_INCH / dpi as f64);
    let padded = Rect::new(pts.x0 - padding, pts.y0 - padding, pts.x1 + padding, pts.y1 + padding);
    match page {
        Some(page) => page.intersection(&padded).unwrap_or(padded),
        None => padded,
    }
}

/// Save `page` with `bbox` (pixels) outlined in red.
pub fn save_match_image(page: &DynamicImage, bbox: &Rect, path: &Path) -> Result<()> {
    let mut canvas = page.to_rgb8();
    let x = bbox.x0.floor() as i32;
    let y = bbox.y0.floor() as i32;
    let w = bbox.width().ceil().max(1.0) as u32;
    let h = bbox.height().ceil().max(1.0) as u32;

    for t in 0..2 {
        let outline = imageproc::rect::Rect::at(x - t, y - t).of_size(w + 2 * t as u32, h + 2 * t as u32);
        draw_hollow_rect_mut(&mut canvas, outline, Rgb([255, 0, 0]));
    }

    canvas.save(path).map_err(|e| RegionError::OutputWrite {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use rstest::rstest;

    const TSV: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t2550\t3300\t-1\t
2\t1\t1\t0\t0\t0\t300\t500\t900\t120\t-1\t
4\t1\t1\t1\t1\t0\t300\t500\t900\t120\t-1\t
5\t1\t1\t1\t1\t1\t300\t500\t420\t100\t96.1\tRechnungs-
5\t1\t1\t1\t1\t2\t740\t505\t300\t95\t95.4\tnummcr:
5\t1\t1\t1\t1\t3\t1060\t502\t140\t98\t91.0\t\"42\"
5\t1\t1\t1\t1\t4\t1220\t500\t10\t100\t12.0\t
";

    fn words() -> Vec<OcrWord> {
        parse_tsv(TSV).unwrap()
    }

    #[test]
    fn parses_word_rows_only() {
        let words = words();
        assert_eq!(words.len(), 3);
        assert_eq!(words[0].text, "Rechnungs-");
        assert_eq!(words[1].bbox, Rect::new(740.0, 505.0, 1040.0, 600.0));
        // Quotes are literal text in TSV
        assert_eq!(words[2].text, "\"42\"");
    }

    #[test]
    fn header_only_tsv_has_no_words() {
        let header = TSV.lines().next().unwrap();
        assert!(parse_tsv(header).unwrap().is_empty());
    }

    #[rstest]
    #[case("Rechnungsnummer:", "Rechnungs- nummcr:")]
    #[case("RECHNUNGS-NUMMER:", "Rechnungs- nummcr:")]
    #[case("\"42\"", "\"42\"")]
    fn window_matches_despite_ocr_noise(#[case] needle: &str, #[case] expected: &str) {
        let found = find_phrase(&words(), needle).unwrap();
        assert_eq!(found.text, expected);
        assert!(found.ratio > MATCH_RATIO);
    }

    #[test]
    fn window_box_spans_its_words() {
        let found = find_phrase(&words(), "Rechnungsnummer:").unwrap();
        assert_eq!(found.bbox, Rect::new(300.0, 500.0, 1040.0, 600.0));
    }

    #[rstest]
    #[case("Lieferschein")]
    #[case("")]
    #[case(" - ")]
    fn unmatched_phrase_is_none(#[case] needle: &str) {
        assert!(find_phrase(&words(), needle).is_none());
    }

    #[test]
    fn pixel_box_becomes_padded_points() {
        let page = Rect::new(0.0, 0.0, 612.0, 792.0);
        let pts = pixel_box_to_points(&Rect::new(300.0, 500.0, 1040.0, 600.0), 300, 2.0, Some(&page));
        let expected = [70.0, 118.0, 251.6, 146.0];
        for (got, want) in <[f64; 4]>::from(pts).iter().zip(expected) {
            assert!((got - want).abs() < 1e-9, "{} != {}", got, want);
        }

        let clamped = pixel_box_to_points(&Rect::new(0.0, 0.0, 100.0, 100.0), 300, 2.0, Some(&page));
        assert_eq!((clamped.x0, clamped.y0), (0.0, 0.0));
    }

    #[test]
    fn match_image_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("match.png");
        let page = DynamicImage::ImageLuma8(GrayImage::from_pixel(50, 40, Luma([255])));
        save_match_image(&page, &Rect::new(10.0, 10.0, 30.0, 20.0), &path).unwrap();

        let saved = image::open(&path).unwrap().to_rgb8();
        assert_eq!(saved.get_pixel(10, 10), &Rgb([255, 0, 0]));
        assert_eq!(saved.get_pixel(20, 15), &Rgb([255, 255, 255]));
    }
}
