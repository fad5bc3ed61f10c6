// CSV / JSON result writers
use crate::types::{ExtractionResult, OutputFormat, RegionError, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

const CSV_HEADER: [&str; 4] = ["region_name", "page_index", "text", "source"];

/// Serialize `results` into `out`. Header row for CSV, a single array for JSON.
pub fn write_results<W: Write>(results: Vec<ExtractionResult>, format: OutputFormat, out: W) -> std::result::Result<(), String> {
    match format {
        OutputFormat::Csv => {
            let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(out);
            writer.write_record(CSV_HEADER).map_err(|e| e.to_string())?;
            for result in &results {
                writer.serialize(result).map_err(|e| e.to_string())?;
            }
            writer.flush().map_err(|e| e.to_string())
        }
        OutputFormat::Json => {
            let mut out = out;
            serde_json::to_writer(&mut out, &results).map_err(|e| e.to_string())?;
            out.write_all(b"\n").map_err(|e| e.to_string())?;
            out.flush().map_err(|e| e.to_string())
        }
    }
}

/// Write results to `destination`, replacing any existing file.
pub fn write_to_path(results: Vec<ExtractionResult>, format: OutputFormat, destination: &Path) -> Result<()> {
    let output_err = |reason: String| RegionError::OutputWrite {
        path: destination.to_path_buf(),
        reason,
    };

    let count = results.len();
    let file = File::create(destination).map_err(|e| output_err(e.to_string()))?;
    write_results(results, format, BufWriter::new(file)).map_err(output_err)?;

    info!("Wrote {} results to {}", count, destination.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Source;

    fn tricky_results() -> Vec<ExtractionResult> {
        vec![
            ExtractionResult::new("title", 0, "Invoice #42", Source::Direct),
            ExtractionResult::new("address", 0, "Main St. 1, \"Suite\" 5\nBerlin; DE", Source::Direct),
            ExtractionResult::new("stamp", 1, "PAID", Source::Ocr),
            ExtractionResult::empty("missing", 3),
            ExtractionResult::new("ümlaut", 2, "Größe\t€", Source::Ocr),
        ]
    }

    #[test]
    fn csv_round_trip_preserves_tuples() {
        let mut buf = Vec::new();
        write_results(tricky_results(), OutputFormat::Csv, &mut buf).unwrap();

        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("region_name,page_index,text,source\n"));

        let mut reader = csv::Reader::from_reader(buf.as_slice());
        let parsed: Vec<ExtractionResult> = reader.deserialize().collect::<std::result::Result<_, _>>().unwrap();
        assert_eq!(parsed, tricky_results());
    }

    #[test]
    fn json_round_trip_preserves_tuples() {
        let mut buf = Vec::new();
        write_results(tricky_results(), OutputFormat::Json, &mut buf).unwrap();
        let parsed: Vec<ExtractionResult> = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed, tricky_results());
        // UTF-8 text is written as-is, not \u-escaped
        assert!(String::from_utf8(buf).unwrap().contains("Größe"));
    }

    #[test]
    fn empty_results_write_valid_output() {
        let mut buf = Vec::new();
        write_results(Vec::new(), OutputFormat::Json, &mut buf).unwrap();
        assert_eq!(buf, b"[]\n");
    }

    #[test]
    fn empty_results_still_write_csv_header() {
        let mut buf = Vec::new();
        write_results(Vec::new(), OutputFormat::Csv, &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "region_name,page_index,text,source\n");
    }

    #[test]
    fn writes_file_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_to_path(tricky_results(), OutputFormat::Csv, &path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("stamp,1,PAID,ocr"));
    }

    #[test]
    fn unwritable_destination_is_an_output_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("out.json");
        let err = write_to_path(tricky_results(), OutputFormat::Json, &path).unwrap_err();
        assert!(matches!(err, RegionError::OutputWrite { .. }));
    }
}
