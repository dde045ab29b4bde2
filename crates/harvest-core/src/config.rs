//! Run configuration: defaults, TOML file, and `HARVEST_*` environment overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::clean::dedup::DedupKeyMode;
use crate::clean::filter::LineCountMode;
use crate::errors::{HarvestError, HarvestResult};

// Cleaning bounds
pub const DEFAULT_MIN_LINES: usize = 3;
pub const DEFAULT_MAX_LINES: usize = 100;

// Crawl limits
pub const DEFAULT_MAX_FILES_PER_REPO: usize = 1_000;
pub const DEFAULT_MAX_SAMPLES: usize = 30_000;
pub const DEFAULT_WORKERS: usize = 1;
pub const DEFAULT_FILE_EXTENSION: &str = ".java";

pub const DEFAULT_ALLOWED_LICENSES: &[&str] = &["mit", "apache-2.0", "bsd-2-clause", "bsd-3-clause"];

const ENV_PREFIX: &str = "HARVEST_";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarvestConfig {
    pub min_lines: usize,
    pub max_lines: usize,
    pub line_count_mode: LineCountMode,
    pub dedup_key: DedupKeyMode,
    pub include_constructors: bool,
    pub max_files_per_repo: usize,
    /// Stop once this many rows have been written. `None` means unbounded.
    pub max_samples: Option<usize>,
    pub allowed_licenses: Vec<String>,
    pub file_extension: String,
    pub workers: usize,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            min_lines: DEFAULT_MIN_LINES,
            max_lines: DEFAULT_MAX_LINES,
            line_count_mode: LineCountMode::default(),
            dedup_key: DedupKeyMode::default(),
            include_constructors: false,
            max_files_per_repo: DEFAULT_MAX_FILES_PER_REPO,
            max_samples: Some(DEFAULT_MAX_SAMPLES),
            allowed_licenses: DEFAULT_ALLOWED_LICENSES
                .iter()
                .map(|l| l.to_string())
                .collect(),
            file_extension: DEFAULT_FILE_EXTENSION.to_string(),
            workers: DEFAULT_WORKERS,
        }
    }
}

impl HarvestConfig {
    pub fn from_toml_str(raw: &str) -> HarvestResult<Self> {
        let config: HarvestConfig = toml::from_str(raw)?;
        Ok(config)
    }

    /// Defaults, then the optional TOML file, then the process environment.
    pub fn load(path: Option<&Path>) -> HarvestResult<Self> {
        let mut config = match path {
            Some(p) => Self::from_toml_str(&std::fs::read_to_string(p)?)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `HARVEST_*` overrides read through `lookup`.
    ///
    /// `HARVEST_MAX_SAMPLES=0` (or `none`) lifts the sample cap.
    pub fn apply_env<F>(&mut self, lookup: F) -> HarvestResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get("MIN_LINES") {
            self.min_lines = parse_usize("MIN_LINES", &v)?;
        }
        if let Some(v) = get("MAX_LINES") {
            self.max_lines = parse_usize("MAX_LINES", &v)?;
        }
        if let Some(v) = get("LINE_COUNT_MODE") {
            self.line_count_mode = v.parse().map_err(HarvestError::Config)?;
        }
        if let Some(v) = get("DEDUP_KEY") {
            self.dedup_key = v.parse().map_err(HarvestError::Config)?;
        }
        if let Some(v) = get("INCLUDE_CONSTRUCTORS") {
            self.include_constructors = parse_flag(&v);
        }
        if let Some(v) = get("MAX_FILES_PER_REPO") {
            self.max_files_per_repo = parse_usize("MAX_FILES_PER_REPO", &v)?;
        }
        if let Some(v) = get("MAX_SAMPLES") {
            self.max_samples = if v.eq_ignore_ascii_case("none") {
                None
            } else {
                match parse_usize("MAX_SAMPLES", &v)? {
                    0 => None,
                    n => Some(n),
                }
            };
        }
        if let Some(v) = get("ALLOWED_LICENSES") {
            self.allowed_licenses = v
                .split(',')
                .map(|l| l.trim().to_lowercase())
                .filter(|l| !l.is_empty())
                .collect();
        }
        if let Some(v) = get("FILE_EXTENSION") {
            self.file_extension = v;
        }
        if let Some(v) = get("WORKERS") {
            self.workers = parse_usize("WORKERS", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> HarvestResult<()> {
        if self.min_lines == 0 {
            return Err(HarvestError::Config("min_lines must be at least 1".into()));
        }
        if self.min_lines > self.max_lines {
            return Err(HarvestError::Config(format!(
                "min_lines ({}) exceeds max_lines ({})",
                self.min_lines, self.max_lines
            )));
        }
        if self.workers == 0 {
            return Err(HarvestError::Config("workers must be at least 1".into()));
        }
        if self.file_extension.trim().is_empty() {
            return Err(HarvestError::Config("file_extension is empty".into()));
        }
        Ok(())
    }
}

fn parse_usize(name: &str, value: &str) -> HarvestResult<usize> {
    value
        .parse::<usize>()
        .map_err(|e| HarvestError::Config(format!("{ENV_PREFIX}{name}={value:?}: {e}")))
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.to_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}
