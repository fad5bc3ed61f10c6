// Run orchestration: inputs -> pipeline -> output files
use crate::config::{OcrSettings, RunConfig, ToolPaths, DEFAULT_DPI, DEFAULT_LANGUAGE};
use crate::output::write_to_path;
use crate::pdf_extraction::locator::{find_phrase, pixel_box_to_points, save_match_image, PhraseMatch};
use crate::pdf_extraction::preprocess::clean_document;
use crate::pdf_extraction::{
    ExtractionPipeline, PageRenderer, PdfDocument, PdfToTextLayout, PdftoppmRenderer, TesseractEngine,
    TextLayoutSource,
};
use crate::types::{OutputFormat, RegionError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::TempDir;
use tracing::{debug, info, warn};

// Tesseract automatic page segmentation
const FULL_PAGE_PSM: u8 = 3;

#[derive(Debug, Clone)]
pub struct ExtractJob {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub format: Option<OutputFormat>,
    pub clean: bool,
    pub debug_dir: Option<PathBuf>,
    pub tools: ToolPaths,
}

/// Flag, then config file, then output extension, then CSV.
pub fn resolve_format(flag: Option<OutputFormat>, config: Option<OutputFormat>, output: Option<&Path>) -> OutputFormat {
    flag.or(config)
        .or_else(|| output.and_then(OutputFormat::from_extension))
        .unwrap_or_default()
}

/// PDFs to process: the file itself, or the `.pdf` files of a directory in name order.
pub fn collect_inputs(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        return Err(RegionError::Document {
            path: input.to_path_buf(),
            reason: "no such file or directory".into(),
        });
    }

    let mut files = std::fs::read_dir(input)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("pdf"))
                    .unwrap_or(false)
        })
        .collect::<Vec<_>>();
    files.sort();

    if files.is_empty() {
        return Err(RegionError::Document {
            path: input.to_path_buf(),
            reason: "directory contains no PDF files".into(),
        });
    }
    Ok(files)
}

/// Where each input's results go: the output file for a single PDF,
/// `<output dir>/<stem>.<ext>` for a directory of PDFs.
fn destinations(job: &ExtractJob, inputs: &[PathBuf], format: OutputFormat) -> Result<Vec<PathBuf>> {
    if job.input.is_file() {
        let dest = job
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("output.{}", format.extension())));
        return Ok(vec![dest]);
    }

    let dir = job.output.clone().unwrap_or_else(|| PathBuf::from("output"));
    std::fs::create_dir_all(&dir).map_err(|e| RegionError::OutputWrite {
        path: dir.clone(),
        reason: e.to_string(),
    })?;
    Ok(inputs
        .iter()
        .map(|input| {
            let stem = input.file_stem().unwrap_or_default().to_string_lossy();
            dir.join(format!("{}.{}", stem, format.extension()))
        })
        .collect())
}

/// Extract every configured region from every input and write the results.
///
/// Returns the written output paths. A document-level failure stops the
/// batch; outputs written before it are kept and listed in the log.
pub fn run_extraction(job: &ExtractJob, config: &RunConfig) -> Result<Vec<PathBuf>> {
    let inputs = collect_inputs(&job.input)?;
    job.tools.require(job.clean)?;

    let format = resolve_format(job.format, config.output_format, job.output.as_deref());
    let outputs = destinations(job, &inputs, format)?;
    let scratch = TempDir::new()?;

    let mut written: Vec<PathBuf> = Vec::with_capacity(outputs.len());
    for (input, destination) in inputs.iter().zip(&outputs) {
        if let Err(e) = extract_document(job, config, input, destination, format, scratch.path()) {
            if !written.is_empty() {
                let done = written
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                warn!(
                    "Batch stopped at {} after {} of {} documents; complete outputs: {}",
                    input.display(),
                    written.len(),
                    inputs.len(),
                    done
                );
            }
            return Err(e);
        }
        written.push(destination.clone());
    }

    Ok(written)
}

fn extract_document(
    job: &ExtractJob,
    config: &RunConfig,
    input: &Path,
    destination: &Path,
    format: OutputFormat,
    scratch: &Path,
) -> Result<()> {
    let start = Instant::now();
    info!("Processing {}", input.display());

    let source = if job.clean {
        clean_document(&job.tools.ocrmypdf, input, scratch)
    } else {
        input.to_path_buf()
    };
    let document = PdfDocument::open(&source)?;

    let mut pipeline = ExtractionPipeline::new(
        &document,
        Box::new(PdfToTextLayout::new(&job.tools.pdftotext)),
        Box::new(PdftoppmRenderer::new(&job.tools.pdftoppm)),
        Box::new(TesseractEngine::new(
            &job.tools.tesseract,
            &config.settings.ocr_languages,
            &config.settings.ocr,
            config.settings.dpi,
        )),
        config.settings.clone(),
    );
    if let Some(dir) = &job.debug_dir {
        pipeline = pipeline.with_debug_dir(dir);
    }

    let results = pipeline.run(&config.regions);
    write_to_path(results, format, destination)?;
    info!("Finished {} in {:.2}s", input.display(), start.elapsed().as_secs_f64());
    Ok(())
}

/// Print every word of a page with its box, for locating region coordinates.
pub fn dump_words<W: Write>(tools: &ToolPaths, pdf: &Path, page: usize, out: W) -> Result<usize> {
    let document = PdfDocument::open(pdf)?;
    if page >= document.page_count() {
        return Err(RegionError::Layout {
            page,
            reason: format!("document has {} pages", document.page_count()),
        });
    }

    let layout = PdfToTextLayout::new(&tools.pdftotext).page_layout(&document, page)?;
    let csv_err = |e: csv::Error| RegionError::OutputWrite {
        path: PathBuf::from("<stdout>"),
        reason: e.to_string(),
    };

    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["text", "x0", "top", "x1", "bottom"]).map_err(csv_err)?;
    for run in &layout.runs {
        writer
            .write_record([
                run.text.clone(),
                format!("{:.2}", run.bbox.x0),
                format!("{:.2}", run.bbox.y0),
                format!("{:.2}", run.bbox.x1),
                format!("{:.2}", run.bbox.y1),
            ])
            .map_err(csv_err)?;
    }
    writer.flush()?;
    Ok(layout.runs.len())
}

/// Options for finding a phrase on a page by OCR.
#[derive(Debug, Clone)]
pub struct LocateOptions {
    pub dpi: u32,
    pub languages: Vec<String>,
    /// Points added on every side of the matched box.
    pub padding: f64,
    /// Save the rendered page with the match outlined here.
    pub debug_dir: Option<PathBuf>,
}

impl Default for LocateOptions {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            languages: vec![DEFAULT_LANGUAGE.to_string()],
            padding: 1.0,
            debug_dir: None,
        }
    }
}

/// Find `needle` on a page with OCR and return its box in points.
///
/// Works on scanned pages, where `dump_words` has nothing to list.
pub fn locate_text(
    tools: &ToolPaths,
    pdf: &Path,
    page: usize,
    needle: &str,
    options: &LocateOptions,
) -> Result<Option<PhraseMatch>> {
    let document = PdfDocument::open(pdf)?;
    let image = PdftoppmRenderer::new(&tools.pdftoppm).render(&document, page, options.dpi)?;

    // Whole page: let tesseract find the text blocks itself
    let settings = OcrSettings {
        psm: FULL_PAGE_PSM,
        ..OcrSettings::default()
    };
    let engine = TesseractEngine::new(&tools.tesseract, &options.languages, &settings, options.dpi);
    let words = engine.recognize_words(&image)?;
    debug!("OCR found {} words on page {}", words.len(), page);

    let Some(found) = find_phrase(&words, needle) else {
        return Ok(None);
    };
    info!("'{}' matched '{}' ({:.2})", needle, found.text, found.ratio);

    if let Some(dir) = &options.debug_dir {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}_page{}_locate.png", document.stem(), page));
        save_match_image(&image, &found.bbox, &path)?;
        info!("Saved match image {}", path.display());
    }

    let bounds = document.page_bounds(page);
    Ok(Some(PhraseMatch {
        bbox: pixel_box_to_points(&found.bbox, options.dpi, options.padding, bounds.as_ref()),
        ..found
    }))
}
