// Whole-document clean/deskew through ocrmypdf
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{info, warn};

/// Run ocrmypdf over `input`, writing `<stem>_cleaned.pdf` into `scratch`.
///
/// A failed cleanup is not fatal: the original file is returned instead.
pub fn clean_document(ocrmypdf: &Path, input: &Path, scratch: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let output_path = scratch.join(format!("{}_cleaned.pdf", stem));

    info!("Preprocessing {} with ocrmypdf", input.display());
    let result = Command::new(ocrmypdf)
        .args(["--deskew", "--clean", "--quiet"])
        .arg(input)
        .arg(&output_path)
        .output();

    match result {
        Ok(output) if output.status.success() && output_path.exists() => output_path,
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("Failed to preprocess {}: {}", input.display(), stderr.trim());
            input.to_path_buf()
        }
        Err(e) => {
            warn!("Failed to preprocess {}: {}", input.display(), e);
            input.to_path_buf()
        }
    }
}
