// Direct-then-OCR extraction over configured regions
use super::document::PdfDocument;
use super::ocr_engine::{crop_region, preprocess, OcrEngine};
use super::page_renderer::PageRenderer;
use super::region_extractor::extract_text;
use super::text_layout::{PageLayout, TextLayoutSource};
use crate::config::{ExtractionSettings, Region};
use crate::types::{ExtractionResult, Source};
use image::DynamicImage;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// One run over one document.
///
/// Owns the external tool handles and the per-page caches for the
/// duration of the run; every region yields exactly one result and a
/// failing region never aborts the others.
pub struct ExtractionPipeline<'a> {
    document: &'a PdfDocument,
    layout_source: Box<dyn TextLayoutSource + 'a>,
    renderer: Box<dyn PageRenderer + 'a>,
    ocr: Box<dyn OcrEngine + 'a>,
    settings: ExtractionSettings,
    debug_dir: Option<PathBuf>,
    layouts: HashMap<usize, Option<Rc<PageLayout>>>,
    page_images: HashMap<usize, Option<Rc<DynamicImage>>>,
}

impl<'a> ExtractionPipeline<'a> {
    pub fn new(
        document: &'a PdfDocument,
        layout_source: Box<dyn TextLayoutSource + 'a>,
        renderer: Box<dyn PageRenderer + 'a>,
        ocr: Box<dyn OcrEngine + 'a>,
        settings: ExtractionSettings,
    ) -> Self {
        Self {
            document,
            layout_source,
            renderer,
            ocr,
            settings,
            debug_dir: None,
            layouts: HashMap::new(),
            page_images: HashMap::new(),
        }
    }

    /// Save every OCR crop under `dir` for inspection.
    pub fn with_debug_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_dir = Some(dir.into());
        self
    }

    pub fn run(&mut self, regions: &[Region]) -> Vec<ExtractionResult> {
        regions.iter().map(|region| self.extract_region(region)).collect()
    }

    pub fn extract_region(&mut self, region: &Region) -> ExtractionResult {
        if region.page >= self.document.page_count() {
            warn!(
                "Region '{}' is on page {} but {} has {} pages",
                region.name,
                region.page,
                self.document.path().display(),
                self.document.page_count()
            );
            return ExtractionResult::empty(&region.name, region.page);
        }

        if let Some(text) = self.try_direct(region) {
            info!("Region '{}' (page {}): direct text", region.name, region.page);
            return ExtractionResult::new(&region.name, region.page, text, Source::Direct);
        }

        debug!("Region '{}': falling back to OCR", region.name);
        let text = self.try_ocr(region).unwrap_or_default();
        if text.is_empty() {
            warn!("Region '{}' (page {}): no text found", region.name, region.page);
        } else {
            info!("Region '{}' (page {}): OCR text", region.name, region.page);
        }
        ExtractionResult::new(&region.name, region.page, text, Source::Ocr)
    }

    fn try_direct(&mut self, region: &Region) -> Option<String> {
        let layout = self.layout(region.page)?;
        let min_len = self.settings.min_text_len.max(1);

        region.candidates().find_map(|rect| {
            let text = extract_text(&layout, rect, self.settings.overlap_threshold);
            let text = text.trim();
            if text.chars().count() < min_len {
                return None;
            }
            if !region.accepts(text) {
                debug!("Region '{}': direct text {:?} rejected by pattern", region.name, text);
                return None;
            }
            Some(text.to_string())
        })
    }

    fn try_ocr(&mut self, region: &Region) -> Option<String> {
        // Boxes entirely off the MediaBox have nothing to read; skip them before rendering
        let bounds = self.document.page_bounds(region.page);
        let on_page = region
            .candidates()
            .enumerate()
            .filter(|(_, rect)| match &bounds {
                Some(page) if page.intersection(rect).is_none() => {
                    warn!("Region '{}': box {} lies outside page {} {}", region.name, rect, region.page, page);
                    false
                }
                _ => true,
            })
            .collect::<Vec<_>>();
        if on_page.is_empty() {
            return None;
        }

        let page_image = self.page_image(region.page)?;
        let dpi = self.settings.dpi;

        let mut first_text: Option<String> = None;
        for (i, rect) in on_page {
            let Some(crop) = crop_region(&page_image, rect, dpi) else {
                warn!("Region '{}': box {} lies outside the rendered page", region.name, rect);
                continue;
            };
            let crop = preprocess(crop, &self.settings.ocr);
            self.save_debug_crop(region, i, &crop);

            let text = match self.ocr.recognize(&crop) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Region '{}': {}", region.name, e);
                    continue;
                }
            };
            if text.is_empty() {
                continue;
            }
            if region.accepts(&text) {
                return Some(text);
            }
            first_text.get_or_insert(text);
        }

        // Nothing matched the pattern; keep the first thing the engine read
        first_text
    }

    fn layout(&mut self, page: usize) -> Option<Rc<PageLayout>> {
        if let Some(cached) = self.layouts.get(&page) {
            return cached.clone();
        }
        let layout = match self.layout_source.page_layout(self.document, page) {
            Ok(layout) => Some(Rc::new(layout)),
            Err(e) => {
                warn!("{}", e);
                None
            }
        };
        self.layouts.insert(page, layout.clone());
        layout
    }

    // Each page is rendered at most once per run, failures included
    fn page_image(&mut self, page: usize) -> Option<Rc<DynamicImage>> {
        if let Some(cached) = self.page_images.get(&page) {
            return cached.clone();
        }
        let image = match self.renderer.render(self.document, page, self.settings.dpi) {
            Ok(image) => Some(Rc::new(image)),
            Err(e) => {
                warn!("{}", e);
                None
            }
        };
        self.page_images.insert(page, image.clone());
        image
    }

    fn save_debug_crop(&self, region: &Region, candidate: usize, crop: &DynamicImage) {
        let Some(dir) = &self.debug_dir else { return };
        let name = format!(
            "{}_{}_p{}_{}.png",
            self.document.stem(),
            sanitize(&region.name),
            region.page,
            candidate
        );
        let path = dir.join(name);
        if let Err(e) = std::fs::create_dir_all(dir).map_err(|e| e.to_string()).and_then(|_| {
            crop.save(&path).map_err(|e| e.to_string())
        }) {
            warn!("Could not save debug crop {}: {}", path.display(), e);
        }
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
