//! Scan options.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// Default number of leading bytes read for content classification.
pub const DEFAULT_SNIFF_LEN: usize = 8192;

/// Default gzip level used for compression estimates.
pub const DEFAULT_GZIP_LEVEL: u32 = 6;

/// Options controlling a scan.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanOptions {
    /// Compute text and gzip sizes for files not already compressed.
    #[builder(default = "false")]
    #[serde(default)]
    pub compute_estimates: bool,

    /// Number of workers for top-level subdirectories (1 = no parallelism).
    #[builder(default = "1")]
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Number of leading bytes read to classify a file.
    #[builder(default = "DEFAULT_SNIFF_LEN")]
    #[serde(default = "default_sniff_len")]
    pub sniff_len: usize,

    /// Gzip compression level for estimates (0-9).
    #[builder(default = "DEFAULT_GZIP_LEVEL")]
    #[serde(default = "default_gzip_level")]
    pub gzip_level: u32,
}

fn default_workers() -> usize {
    1
}

fn default_sniff_len() -> usize {
    DEFAULT_SNIFF_LEN
}

fn default_gzip_level() -> u32 {
    DEFAULT_GZIP_LEVEL
}

impl ScanOptionsBuilder {
    fn validate(&self) -> Result<(), String> {
        check(self.workers, self.sniff_len, self.gzip_level)
    }
}

fn check(workers: Option<usize>, sniff_len: Option<usize>, gzip_level: Option<u32>) -> Result<(), String> {
    if workers == Some(0) {
        return Err("Worker count must be at least 1".to_string());
    }
    if sniff_len == Some(0) {
        return Err("Sniff length must be greater than zero".to_string());
    }
    if let Some(level) = gzip_level.filter(|level| *level > 9) {
        return Err(format!("Gzip level must be between 0 and 9, got {level}"));
    }
    Ok(())
}

impl ScanOptions {
    /// Create a new options builder.
    pub fn builder() -> ScanOptionsBuilder {
        ScanOptionsBuilder::default()
    }

    /// Options with compression estimates switched on or off.
    pub fn with_estimates(compute_estimates: bool) -> Self {
        Self {
            compute_estimates,
            ..Self::default()
        }
    }

    /// Validate options that did not come through the builder, e.g. from JSON.
    pub fn validate(&self) -> Result<(), ScanError> {
        check(Some(self.workers), Some(self.sniff_len), Some(self.gzip_level))
            .map_err(|message| ScanError::InvalidOptions { message })
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            compute_estimates: false,
            workers: 1,
            sniff_len: DEFAULT_SNIFF_LEN,
            gzip_level: DEFAULT_GZIP_LEVEL,
        }
    }
}

impl From<ScanOptionsBuilderError> for ScanError {
    fn from(err: ScanOptionsBuilderError) -> Self {
        ScanError::InvalidOptions {
            message: err.to_string(),
        }
    }
}
