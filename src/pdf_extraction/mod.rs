// PDF extraction module
pub mod document;
pub mod locator;
pub mod ocr_engine;
pub mod page_renderer;
pub mod pipeline;
pub mod preprocess;
pub mod region_extractor;
pub mod text_layout;

pub use document::PdfDocument;
pub use locator::{OcrWord, PhraseMatch};
pub use ocr_engine::{OcrEngine, TesseractEngine};
pub use page_renderer::{PageRenderer, PdftoppmRenderer};
pub use pipeline::ExtractionPipeline;
pub use text_layout::{PageLayout, PdfToTextLayout, TextLayoutSource, TextRun};
