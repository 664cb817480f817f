//! Book configuration.
//!
//! Settings come from three layers, each overriding the previous one:
//!
//! ```text
//! stock defaults  →  cookbook.toml  →  command-line flags
//! ```
//!
//! ## Config File
//!
//! `cookbook.toml` lives in the working directory (or wherever `--settings`
//! points). It is optional and sparse: override only the values you need.
//!
//! ```toml
//! [book]
//! title = "My Cookbook"
//! author = "Author"
//! language = "english"      # babel language name
//!
//! [labels]
//! ingredients = "Ingredients"
//! steps = "Steps"
//! missing = "n/a"           # printed for empty ingredients/steps/attributes
//!
//! [paths]
//! tex = "tex"               # holds preamble.tex and pictures/
//! database = "Recipes.csv"
//! order = "Config.csv"      # optional; ignored when the file does not exist
//! output = "Recipes.pdf"
//!
//! [pictures]
//! quality = 90              # JPEG quality for transcoded imports
//!
//! [compiler]
//! program = "pdflatex"
//! args = ["-interaction=nonstopmode"]
//! passes = 2
//!
//! [processing]
//! max_processes = 4         # omit for auto = CPU cores
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Default settings file name.
pub const CONFIG_FILENAME: &str = "cookbook.toml";

/// All settings for one cookbook build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BookConfig {
    /// Values substituted into the preamble.
    pub book: BookMeta,
    /// Headings and filler text used in the rendered body.
    pub labels: Labels,
    /// Input and output locations.
    pub paths: PathsConfig,
    /// Picture import settings.
    pub pictures: PicturesConfig,
    /// External LaTeX compiler invocation.
    pub compiler: CompilerConfig,
    /// Parallel file operation settings.
    pub processing: ProcessingConfig,
}

impl BookConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.compiler.passes == 0 {
            return Err(ConfigError::Validation(
                "compiler.passes must be at least 1".into(),
            ));
        }
        if self.compiler.program.trim().is_empty() {
            return Err(ConfigError::Validation(
                "compiler.program must not be empty".into(),
            ));
        }
        if self.pictures.quality == 0 || self.pictures.quality > 100 {
            return Err(ConfigError::Validation(
                "pictures.quality must be 1-100".into(),
            ));
        }
        if self.labels.ingredients.is_empty() || self.labels.steps.is_empty() {
            return Err(ConfigError::Validation(
                "labels.ingredients and labels.steps must not be empty".into(),
            ));
        }
        if self.paths.output.extension().and_then(|e| e.to_str()) != Some("pdf") {
            return Err(ConfigError::Validation(
                "paths.output must name a .pdf file".into(),
            ));
        }
        Ok(())
    }

    /// Output name without the `.pdf` extension; also the stem of the `.tex` file.
    pub fn document_stem(&self) -> String {
        self.paths
            .output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Recipes".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BookMeta {
    pub title: String,
    pub author: String,
    /// Babel language name, e.g. `english`, `spanish`.
    pub language: String,
}

impl Default for BookMeta {
    fn default() -> Self {
        Self {
            title: "My Cookbook".to_string(),
            author: "Author".to_string(),
            language: "english".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Labels {
    /// Heading above the ingredient list.
    pub ingredients: String,
    /// Heading above the step list.
    pub steps: String,
    /// Text printed in place of an empty cell.
    pub missing: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            ingredients: "Ingredients".to_string(),
            steps: "Steps".to_string(),
            missing: "n/a".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// LaTeX directory holding `preamble.tex` and `pictures/`.
    pub tex: PathBuf,
    /// Recipe table.
    pub database: PathBuf,
    /// Optional order table.
    pub order: PathBuf,
    /// Final PDF.
    pub output: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            tex: PathBuf::from("tex"),
            database: PathBuf::from("Recipes.csv"),
            order: PathBuf::from("Config.csv"),
            output: PathBuf::from("Recipes.pdf"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PicturesConfig {
    /// JPEG quality used when a non-JPEG source is transcoded on import.
    pub quality: u32,
}

impl Default for PicturesConfig {
    fn default() -> Self {
        Self { quality: 90 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    pub program: String,
    /// Arguments placed before the `.tex` file name.
    pub args: Vec<String>,
    /// Number of runs; two resolve the table of contents.
    pub passes: u32,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            program: "pdflatex".to_string(),
            args: vec!["-interaction=nonstopmode".to_string()],
            passes: 2,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel file workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Values given on the command line. `None` keeps the configured value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub title: Option<String>,
    pub author: Option<String>,
    pub language: Option<String>,
    pub ingredients: Option<String>,
    pub steps: Option<String>,
    pub tex: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub order: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

impl Overrides {
    pub fn apply(self, mut config: BookConfig) -> BookConfig {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(v) = value {
                *slot = v;
            }
        }
        set(&mut config.book.title, self.title);
        set(&mut config.book.author, self.author);
        set(&mut config.book.language, self.language);
        set(&mut config.labels.ingredients, self.ingredients);
        set(&mut config.labels.steps, self.steps);
        set(&mut config.paths.tex, self.tex);
        set(&mut config.paths.database, self.database);
        set(&mut config.paths.order, self.order);
        set(&mut config.paths.output, self.output);
        config
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(BookConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a settings file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<BookConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: BookConfig = merged.try_into()?;
    Ok(config)
}

/// Load settings from `path`, layered over the stock defaults.
///
/// Validation is left to the caller because command-line overrides are
/// applied on top first.
pub fn load_config(path: &Path) -> Result<BookConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `cookbook.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Cookbook Configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Command-line flags override them.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Book metadata, substituted into tex/preamble.tex
# ---------------------------------------------------------------------------
[book]
title = "My Cookbook"
author = "Author"
# babel language name (english, spanish, french, ...)
language = "english"

# ---------------------------------------------------------------------------
# Text used in every recipe
# ---------------------------------------------------------------------------
[labels]
ingredients = "Ingredients"
steps = "Steps"
# Printed where the table has an empty ingredients, steps or attribute cell.
missing = "n/a"

# ---------------------------------------------------------------------------
# Locations
# ---------------------------------------------------------------------------
[paths]
# Holds preamble.tex, the generated .tex file and pictures/.
tex = "tex"
# Recipe table (.csv, .tsv or .xlsx).
database = "Recipes.csv"
# Section/subsection order table. Ignored if the file does not exist.
order = "Config.csv"
# Final PDF.
output = "Recipes.pdf"

# ---------------------------------------------------------------------------
# Picture import
# ---------------------------------------------------------------------------
[pictures]
# JPEG quality (1-100) used when a PNG, TIFF or WebP source is converted.
quality = 90

# ---------------------------------------------------------------------------
# LaTeX compiler
# ---------------------------------------------------------------------------
[compiler]
program = "pdflatex"
args = ["-interaction=nonstopmode"]
# Two passes resolve the table of contents.
passes = 2

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for picture moves.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
