// regionchonk - pull text out of fixed PDF regions, OCR when the text layer is empty
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use regionchonk::config::{ConfigFile, ToolPaths, DEFAULT_DPI};
use regionchonk::runner::{dump_words, locate_text, run_extraction, ExtractJob, LocateOptions};
use regionchonk::types::OutputFormat;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Fixed-region PDF text extraction with OCR fallback")]
struct Args {
    /// More logging (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract configured regions from a PDF or a directory of PDFs
    ///
    /// With a directory, an unreadable PDF stops the batch. Results already
    /// written for earlier PDFs stay in the output directory and are listed
    /// in the log.
    Extract {
        /// PDF file or directory containing PDFs
        input: PathBuf,

        /// Region configuration (TOML, or JSON by extension)
        #[arg(short, long)]
        config: PathBuf,

        /// Output file (single PDF) or directory (directory input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Rendering resolution for OCR
        #[arg(long)]
        dpi: Option<u32>,

        /// OCR language, repeatable (replaces the config's list)
        #[arg(short, long = "lang")]
        lang: Vec<String>,

        /// Clean and deskew each PDF with ocrmypdf first
        #[arg(long)]
        clean: bool,

        /// Save every OCR crop as PNG here
        #[arg(long)]
        debug_dir: Option<PathBuf>,
    },

    /// List the words of a page with their coordinates (CSV on stdout)
    Words {
        pdf: PathBuf,

        /// 0-based page index
        #[arg(short, long, default_value_t = 0)]
        page: usize,
    },

    /// Find a phrase on a scanned page with OCR and print its rect in points
    Locate {
        pdf: PathBuf,

        /// Text to look for; case, spaces and hyphens are ignored
        text: String,

        /// 0-based page index
        #[arg(short, long, default_value_t = 0)]
        page: usize,

        #[arg(long, default_value_t = DEFAULT_DPI)]
        dpi: u32,

        /// OCR language, repeatable
        #[arg(short, long = "lang")]
        lang: Vec<String>,

        /// Points added around the match
        #[arg(long, default_value_t = 1.0)]
        padding: f64,

        /// Save the page with the match outlined here
        #[arg(long)]
        debug_dir: Option<PathBuf>,
    },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);
    let tools = ToolPaths::from_env();

    match args.command {
        Commands::Extract {
            input,
            config,
            output,
            format,
            dpi,
            lang,
            clean,
            debug_dir,
        } => {
            let mut file = ConfigFile::load(&config)
                .with_context(|| format!("loading region config {}", config.display()))?;
            if let Some(dpi) = dpi {
                file.dpi = dpi;
            }
            if !lang.is_empty() {
                file.ocr_languages = lang;
            }
            let run_config = file.validate().context("validating region config")?;

            let job = ExtractJob {
                input,
                output,
                format,
                clean,
                debug_dir,
                tools,
            };
            let written = run_extraction(&job, &run_config)
                .with_context(|| format!("extracting regions from {}", job.input.display()))?;
            for path in written {
                info!("Results saved to {}", path.display());
            }
        }
        Commands::Words { pdf, page } => {
            let stdout = std::io::stdout();
            let count = dump_words(&tools, &pdf, page, stdout.lock())
                .with_context(|| format!("listing words of {}", pdf.display()))?;
            info!("{} words on page {}", count, page);
        }
        Commands::Locate {
            pdf,
            text,
            page,
            dpi,
            lang,
            padding,
            debug_dir,
        } => {
            let mut options = LocateOptions {
                dpi,
                padding,
                debug_dir,
                ..LocateOptions::default()
            };
            if !lang.is_empty() {
                options.languages = lang;
            }
            let found = locate_text(&tools, &pdf, page, &text, &options)
                .with_context(|| format!("locating text in {}", pdf.display()))?;
            let Some(found) = found else {
                bail!("'{}' not found on page {} of {}", text, page, pdf.display());
            };
            let r = found.bbox;
            println!("rect = [{:.1}, {:.1}, {:.1}, {:.1}]", r.x0, r.y0, r.x1, r.y1);
        }
    }

    Ok(())
}
