use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::EcLevel;
use crate::error::Result;
use crate::frame::{FORMAT_VERSION, MIN_SUPPORTED_VERSION};
use crate::preprocess::Variant;
use crate::serializer::DEFAULT_MAX_REGION_CELLS;

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV: &str = "QRLINK_CONFIG";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub output_dir: PathBuf,
    pub format_version: u32,
    pub min_supported_version: u32,
    /// Largest input accepted by `serialize_file`, in bytes.
    pub max_file_size: usize,
    /// Largest spreadsheet region accepted by `serialize_excel`, in cells.
    pub max_region_cells: u64,
    pub encoder: EncoderConfig,
    pub scan: ScanConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub max_symbol_capacity: usize,
    pub error_correction: EcLevel,
    pub module_px: u32,
    pub quiet_zone: u32,
    /// Smallest raw slice the shrink-and-retry loop may try.
    pub min_raw_chunk: usize,
    pub annotate: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Every Nth frame is decoded.
    pub sampling_interval: u64,
    pub variants: Vec<Variant>,
    pub contrast_alpha: f32,
    pub brightness_beta: f32,
    pub binary_threshold: u8,
    pub progress_every: u64,
    pub max_read_errors: usize,
    pub budget_secs: Option<u64>,
    pub debug_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("data/qrfiles"),
            format_version: FORMAT_VERSION,
            min_supported_version: MIN_SUPPORTED_VERSION,
            max_file_size: 10 * 1024 * 1024,
            max_region_cells: DEFAULT_MAX_REGION_CELLS,
            encoder: EncoderConfig::default(),
            scan: ScanConfig::default(),
        }
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            max_symbol_capacity: EcLevel::Low.nominal_capacity(),
            error_correction: EcLevel::Low,
            module_px: 10,
            quiet_zone: 4,
            min_raw_chunk: 16,
            annotate: true,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            sampling_interval: 2,
            variants: Variant::ALL.to_vec(),
            contrast_alpha: 1.5,
            brightness_beta: 10.0,
            binary_threshold: 150,
            progress_every: 100,
            max_read_errors: 32,
            budget_secs: None,
            debug_dir: None,
        }
    }
}

impl ScanConfig {
    pub fn budget(&self) -> Option<Duration> {
        self.budget_secs.map(Duration::from_secs)
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read(path.as_ref())?;
        let config: Config = serde_json::from_slice(&raw)?;
        Ok(config)
    }

    /// Loads the file named by `QRLINK_CONFIG`, or defaults when unset.
    /// An unreadable file is reported and replaced by defaults.
    pub fn from_env() -> Self {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(&path).unwrap_or_else(|e| {
                log::warn!("cannot load config {:?}: {}, using defaults", path, e);
                Self::default()
            }),
            None => Self::default(),
        }
    }
}

pub fn config() -> &'static Config {
    static CONFIG: LazyLock<Config> = LazyLock::new(Config::from_env);
    &CONFIG
}
