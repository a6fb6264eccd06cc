use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Smallest comparison edge the SSIM window fits into.
pub const MIN_COMPARE_EDGE: u32 = 7;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Tunables of the deduplication core. Threaded explicitly into the selector.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SelectionConfig {
    /// A frame is a duplicate only when its score is strictly above this.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_compare_width")]
    pub compare_width: u32,
    #[serde(default = "default_compare_height")]
    pub compare_height: u32,
    /// Frames decoded and preprocessed concurrently before the sequential pass.
    #[serde(default = "default_prepare_window")]
    pub prepare_window: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplingConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: f64,
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
    #[serde(default = "default_image_ext")]
    pub image_ext: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default)]
    pub keep_intermediate: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            compare_width: default_compare_width(),
            compare_height: default_compare_height(),
            prepare_window: default_prepare_window(),
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            ffmpeg: default_ffmpeg(),
            image_ext: default_image_ext(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            output_dir: default_output_dir(),
            jpeg_quality: default_jpeg_quality(),
            keep_intermediate: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl SelectionConfig {
    pub fn compare_size(&self) -> (u32, u32) {
        (self.compare_width, self.compare_height)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(-1.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::Invalid(format!(
                "selection.threshold must be within [-1, 1], got {}",
                self.threshold
            )));
        }
        if self.compare_width < MIN_COMPARE_EDGE || self.compare_height < MIN_COMPARE_EDGE {
            return Err(ConfigError::Invalid(format!(
                "comparison resolution must be at least {MIN_COMPARE_EDGE}x{MIN_COMPARE_EDGE}, got {}x{}",
                self.compare_width, self.compare_height
            )));
        }
        if self.prepare_window == 0 {
            return Err(ConfigError::Invalid(
                "selection.prepare_window must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        Self::parse(&content)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!(path = %path.display(), "no config file, using defaults");
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }
        Self::load(path)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.selection.validate()?;
        if !(self.sampling.interval_secs > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "sampling.interval_secs must be positive, got {}",
                self.sampling.interval_secs
            )));
        }
        if !(1..=100).contains(&self.output.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "output.jpeg_quality must be within 1..=100, got {}",
                self.output.jpeg_quality
            )));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// Default value functions
fn default_threshold() -> f64 {
    0.90
}
fn default_compare_width() -> u32 {
    800
}
fn default_compare_height() -> u32 {
    600
}
fn default_prepare_window() -> usize {
    8
}
fn default_interval_secs() -> f64 {
    1.0
}
fn default_ffmpeg() -> String {
    "ffmpeg".into()
}
fn default_image_ext() -> String {
    "jpg".into()
}
fn default_work_dir() -> PathBuf {
    PathBuf::from("work")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_jpeg_quality() -> u8 {
    90
}
fn default_log_level() -> String {
    "info".into()
}
