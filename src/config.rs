// Configuration for regionchonk
use crate::types::{OutputFormat, Rect, RegionError, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

pub const DEFAULT_DPI: u32 = 300;
pub const DEFAULT_LANGUAGE: &str = "eng";
pub const DEFAULT_PSM: u8 = 6;

const MIN_DPI: u32 = 72;
const MAX_DPI: u32 = 1200;
const POINTS_PER_INCH: f64 = 72.0;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateUnit {
    #[default]
    Points,
    Pixels,
}

/// OCR preprocessing and engine options.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OcrSettings {
    /// Tesseract page segmentation mode; 6 treats the crop as one block of text.
    pub psm: u8,
    pub grayscale: bool,
    pub denoise: bool,
    pub binarize: bool,
    /// Join hyphenated line breaks and fold remaining newlines into spaces.
    pub join_lines: bool,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            psm: DEFAULT_PSM,
            grayscale: true,
            denoise: false,
            binarize: false,
            join_lines: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegionSpec {
    pub name: String,
    pub page: usize,
    pub rect: Rect,
    #[serde(default)]
    pub alternates: Vec<Rect>,
    #[serde(default)]
    pub pattern: Option<String>,
}

/// Region config file as written by the user, before validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub dpi: u32,
    pub ocr_languages: Vec<String>,
    pub overlap_threshold: f64,
    pub min_text_len: usize,
    pub output_format: Option<OutputFormat>,
    pub units: CoordinateUnit,
    pub coordinate_dpi: Option<u32>,
    pub ocr: OcrSettings,
    pub regions: Vec<RegionSpec>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            ocr_languages: vec![DEFAULT_LANGUAGE.to_string()],
            overlap_threshold: 0.0,
            min_text_len: 0,
            output_format: None,
            units: CoordinateUnit::Points,
            coordinate_dpi: None,
            ocr: OcrSettings::default(),
            regions: Vec::new(),
        }
    }
}

impl ConfigFile {
    /// Load a TOML config, or JSON when the file ends in `.json`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| RegionError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            Self::from_json_str(&raw)
        } else {
            Self::from_toml_str(&raw)
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| RegionError::Config(e.to_string()))
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| RegionError::Config(e.to_string()))
    }

    /// Check every option once and turn region specs into point-space regions.
    pub fn validate(self) -> Result<RunConfig> {
        if !(MIN_DPI..=MAX_DPI).contains(&self.dpi) {
            return Err(RegionError::Config(format!(
                "dpi must be between {} and {}, got {}",
                MIN_DPI, MAX_DPI, self.dpi
            )));
        }
        if self.ocr_languages.is_empty() {
            return Err(RegionError::Config("ocr_languages must not be empty".into()));
        }
        for lang in &self.ocr_languages {
            let ok = !lang.is_empty() && lang.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !ok {
                return Err(RegionError::Config(format!("invalid OCR language code '{}'", lang)));
            }
        }
        if !(0.0..=1.0).contains(&self.overlap_threshold) {
            return Err(RegionError::Config(format!(
                "overlap_threshold must be within [0, 1], got {}",
                self.overlap_threshold
            )));
        }
        if self.ocr.psm > 13 {
            return Err(RegionError::Config(format!("ocr.psm must be 0-13, got {}", self.ocr.psm)));
        }

        let scale = match self.units {
            CoordinateUnit::Points => 1.0,
            CoordinateUnit::Pixels => match self.coordinate_dpi {
                Some(dpi) if dpi > 0 => POINTS_PER_INCH / dpi as f64,
                _ => {
                    return Err(RegionError::Config(
                        "units = \"pixels\" requires a positive coordinate_dpi".into(),
                    ))
                }
            },
        };

        if self.regions.is_empty() {
            return Err(RegionError::Config("no regions configured".into()));
        }

        let mut seen = HashSet::new();
        let mut regions = Vec::with_capacity(self.regions.len());
        for spec in self.regions {
            if spec.name.trim().is_empty() {
                return Err(RegionError::Config("region name must not be empty".into()));
            }
            if !seen.insert(spec.name.clone()) {
                return Err(RegionError::Config(format!("duplicate region name '{}'", spec.name)));
            }
            for rect in std::iter::once(&spec.rect).chain(spec.alternates.iter()) {
                if !rect.is_valid() {
                    return Err(RegionError::Config(format!(
                        "region '{}' has an invalid rectangle {}",
                        spec.name, rect
                    )));
                }
            }
            let pattern = match &spec.pattern {
                Some(p) => Some(Regex::new(&format!("^(?:{})$", p)).map_err(|e| {
                    RegionError::Config(format!("region '{}' has an invalid pattern: {}", spec.name, e))
                })?),
                None => None,
            };
            regions.push(Region {
                name: spec.name,
                page: spec.page,
                rect: spec.rect.scaled(scale),
                alternates: spec.alternates.iter().map(|r| r.scaled(scale)).collect(),
                pattern,
            });
        }

        Ok(RunConfig {
            settings: ExtractionSettings {
                dpi: self.dpi,
                ocr_languages: self.ocr_languages,
                overlap_threshold: self.overlap_threshold,
                min_text_len: self.min_text_len,
                ocr: self.ocr,
            },
            output_format: self.output_format,
            regions,
        })
    }
}

/// A named rectangle (plus fallback boxes) on one page, in PDF points.
#[derive(Debug, Clone)]
pub struct Region {
    pub name: String,
    pub page: usize,
    pub rect: Rect,
    pub alternates: Vec<Rect>,
    pub pattern: Option<Regex>,
}

impl Region {
    pub fn new(name: impl Into<String>, page: usize, rect: Rect) -> Self {
        Self {
            name: name.into(),
            page,
            rect,
            alternates: Vec::new(),
            pattern: None,
        }
    }

    /// Primary rectangle first, then alternates in configured order.
    pub fn candidates(&self) -> impl Iterator<Item = &Rect> {
        std::iter::once(&self.rect).chain(self.alternates.iter())
    }

    pub fn accepts(&self, text: &str) -> bool {
        match &self.pattern {
            Some(re) => re.is_match(text),
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionSettings {
    pub dpi: u32,
    pub ocr_languages: Vec<String>,
    pub overlap_threshold: f64,
    pub min_text_len: usize,
    pub ocr: OcrSettings,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        let file = ConfigFile::default();
        Self {
            dpi: file.dpi,
            ocr_languages: file.ocr_languages,
            overlap_threshold: file.overlap_threshold,
            min_text_len: file.min_text_len,
            ocr: file.ocr,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub settings: ExtractionSettings,
    pub output_format: Option<OutputFormat>,
    pub regions: Vec<Region>,
}

/// External programs, overridable through the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub pdftotext: PathBuf,
    pub pdftoppm: PathBuf,
    pub tesseract: PathBuf,
    pub ocrmypdf: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            pdftotext: "pdftotext".into(),
            pdftoppm: "pdftoppm".into(),
            tesseract: "tesseract".into(),
            ocrmypdf: "ocrmypdf".into(),
        }
    }
}

impl ToolPaths {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let pick = |var: &str, fallback: PathBuf| -> PathBuf {
            env::var_os(var).map(PathBuf::from).unwrap_or(fallback)
        };
        Self {
            pdftotext: pick("REGIONCHONK_PDFTOTEXT", defaults.pdftotext),
            pdftoppm: pick("REGIONCHONK_PDFTOPPM", defaults.pdftoppm),
            tesseract: pick("REGIONCHONK_TESSERACT", defaults.tesseract),
            ocrmypdf: pick("REGIONCHONK_OCRMYPDF", defaults.ocrmypdf),
        }
    }

    /// Fail fast when a program the run depends on cannot be started.
    pub fn require(&self, with_ocrmypdf: bool) -> Result<()> {
        let mut needed = vec![
            (&self.pdftotext, "-v"),
            (&self.pdftoppm, "-v"),
            (&self.tesseract, "--version"),
        ];
        if with_ocrmypdf {
            needed.push((&self.ocrmypdf, "--version"));
        }
        for (program, version_arg) in needed {
            if !command_available(program, version_arg) {
                return Err(RegionError::MissingTool(program.display().to_string()));
            }
        }
        Ok(())
    }
}

pub fn command_available(program: &Path, version_arg: &str) -> bool {
    Command::new(program)
        .arg(version_arg)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
dpi = 200
ocr_languages = ["eng", "deu"]
output_format = "json"

[ocr]
binarize = true

[[regions]]
name = "title"
page = 0
rect = [72.0, 60.0, 300.0, 90.0]
alternates = [[72.0, 90.0, 300.0, 120.0]]
pattern = "Invoice #\\d+"

[[regions]]
name = "stamp"
page = 1
rect = [400, 700, 550, 760]
"#;

    #[test]
    fn parses_and_validates_toml() {
        let cfg = ConfigFile::from_toml_str(SAMPLE).unwrap().validate().unwrap();
        assert_eq!(cfg.settings.dpi, 200);
        assert_eq!(cfg.settings.ocr_languages, vec!["eng", "deu"]);
        assert_eq!(cfg.output_format, Some(OutputFormat::Json));
        assert!(cfg.settings.ocr.binarize);
        assert!(cfg.settings.ocr.grayscale);
        assert_eq!(cfg.regions.len(), 2);
        assert_eq!(cfg.regions[0].candidates().count(), 2);
        assert!(cfg.regions[0].accepts("Invoice #42"));
        assert!(!cfg.regions[0].accepts("Invoice #42 extra"));
        assert!(cfg.regions[1].accepts("anything"));
    }

    #[test]
    fn defaults_apply_when_options_are_missing() {
        let cfg = ConfigFile::from_toml_str(
            "[[regions]]\nname = \"a\"\npage = 0\nrect = [0, 0, 10, 10]\n",
        )
        .unwrap()
        .validate()
        .unwrap();
        assert_eq!(cfg.settings, ExtractionSettings::default());
        assert_eq!(cfg.settings.dpi, DEFAULT_DPI);
        assert_eq!(cfg.output_format, None);
    }

    #[test]
    fn json_config_is_accepted() {
        let raw = r#"{"regions":[{"name":"a","page":2,"rect":[1,2,3,4]}],"min_text_len":3}"#;
        let cfg = ConfigFile::from_json_str(raw).unwrap().validate().unwrap();
        assert_eq!(cfg.settings.min_text_len, 3);
        assert_eq!(cfg.regions[0].page, 2);
        assert_eq!(cfg.regions[0].rect, Rect::new(1.0, 2.0, 3.0, 4.0));
    }

    #[test]
    fn pixel_coordinates_convert_to_points() {
        let raw = "units = \"pixels\"\ncoordinate_dpi = 144\n[[regions]]\nname = \"a\"\npage = 0\nrect = [144, 288, 288, 432]\n";
        let cfg = ConfigFile::from_toml_str(raw).unwrap().validate().unwrap();
        assert_eq!(cfg.regions[0].rect, Rect::new(72.0, 144.0, 144.0, 216.0));
    }

    #[test]
    fn pixel_units_need_a_dpi() {
        let raw = "units = \"pixels\"\n[[regions]]\nname = \"a\"\npage = 0\nrect = [0, 0, 1, 1]\n";
        let err = ConfigFile::from_toml_str(raw).unwrap().validate().unwrap_err();
        assert!(matches!(err, RegionError::Config(_)));
    }

    #[test]
    fn rejects_bad_configs() {
        let cases = [
            "dpi = 10\n[[regions]]\nname = \"a\"\npage = 0\nrect = [0, 0, 1, 1]\n",
            "overlap_threshold = 1.5\n[[regions]]\nname = \"a\"\npage = 0\nrect = [0, 0, 1, 1]\n",
            "ocr_languages = []\n[[regions]]\nname = \"a\"\npage = 0\nrect = [0, 0, 1, 1]\n",
            "ocr_languages = [\"eng;rm\"]\n[[regions]]\nname = \"a\"\npage = 0\nrect = [0, 0, 1, 1]\n",
            "[[regions]]\nname = \"a\"\npage = 0\nrect = [5, 0, 1, 1]\n",
            "[[regions]]\nname = \"a\"\npage = 0\nrect = [0, 0, 1, 1]\npattern = \"(\"\n",
            "[[regions]]\nname = \"a\"\npage = 0\nrect = [0, 0, 1, 1]\n[[regions]]\nname = \"a\"\npage = 1\nrect = [0, 0, 1, 1]\n",
            "dpi = 300\n",
        ];
        for raw in cases {
            let result = ConfigFile::from_toml_str(raw).and_then(ConfigFile::validate);
            assert!(result.is_err(), "expected rejection for:\n{}", raw);
        }
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(ConfigFile::from_toml_str("colour = \"red\"\n").is_err());
    }

    #[test]
    fn missing_tool_is_reported() {
        let tools = ToolPaths {
            tesseract: "/nonexistent/regionchonk-tesseract".into(),
            pdftotext: "/nonexistent/regionchonk-pdftotext".into(),
            ..ToolPaths::default()
        };
        assert!(matches!(tools.require(false), Err(RegionError::MissingTool(_))));
    }
}
