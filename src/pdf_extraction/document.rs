// Document loading - pure Rust via lopdf
use crate::types::{Rect, RegionError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::path::{Path, PathBuf};
use tracing::debug;

// US Letter, used when a page carries no readable MediaBox
const DEFAULT_PAGE_SIZE: (f64, f64) = (612.0, 792.0);

/// An opened PDF: its path and page geometry. Read-only for a run.
#[derive(Debug, Clone)]
pub struct PdfDocument {
    path: PathBuf,
    page_sizes: Vec<(f64, f64)>,
}

impl PdfDocument {
    pub fn open(path: &Path) -> Result<Self> {
        let document = Document::load(path).map_err(|e| RegionError::Document {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let pages = document.get_pages();
        if pages.is_empty() {
            return Err(RegionError::Document {
                path: path.to_path_buf(),
                reason: "document has no pages".into(),
            });
        }

        // get_pages is keyed by 1-based page number, so values come out in page order
        let page_sizes = pages
            .values()
            .map(|id| page_size(&document, *id))
            .collect::<Vec<_>>();

        debug!("Opened {} ({} pages)", path.display(), page_sizes.len());
        Ok(Self {
            path: path.to_path_buf(),
            page_sizes,
        })
    }

    pub fn from_page_sizes(path: impl Into<PathBuf>, page_sizes: Vec<(f64, f64)>) -> Self {
        Self {
            path: path.into(),
            page_sizes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_count(&self) -> usize {
        self.page_sizes.len()
    }

    /// The page's MediaBox as a region-space rectangle at the origin.
    pub fn page_bounds(&self, page_index: usize) -> Option<Rect> {
        self.page_sizes
            .get(page_index)
            .map(|&(width, height)| Rect::new(0.0, 0.0, width, height))
    }

    /// File stem used to name per-document artifacts.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string())
    }
}

fn page_size(document: &Document, page_id: ObjectId) -> (f64, f64) {
    let Ok(page) = document.get_object(page_id).and_then(Object::as_dict) else {
        return DEFAULT_PAGE_SIZE;
    };
    match media_box(document, page) {
        Some([x0, y0, x1, y1]) => ((x1 - x0).abs(), (y1 - y0).abs()),
        None => DEFAULT_PAGE_SIZE,
    }
}

// MediaBox may sit on the page, behind a reference, or on an ancestor Pages node
fn media_box(document: &Document, page: &Dictionary) -> Option<[f64; 4]> {
    let mut current = page;
    for _ in 0..32 {
        if let Ok(obj) = current.get(b"MediaBox") {
            return parse_box(document, obj);
        }
        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = document.get_object(parent).ok()?.as_dict().ok()?;
    }
    None
}

fn parse_box(document: &Document, obj: &Object) -> Option<[f64; 4]> {
    let arr = match obj {
        Object::Reference(id) => document.get_object(*id).ok()?.as_array().ok()?,
        Object::Array(a) => a,
        _ => return None,
    };

    let bounds = arr
        .iter()
        .filter_map(|obj| match obj {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(f) => Some(*f as f64),
            _ => None,
        })
        .collect::<Vec<_>>();
    <[f64; 4]>::try_from(bounds).ok()
}
