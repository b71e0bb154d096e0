//! ---
//! cosim_section: "01-bridge-runtime"
//! cosim_subsection: "module"
//! cosim_type: "source"
//! cosim_scope: "code"
//! cosim_description: "Configuration model for the co-simulation bridge."
//! cosim_version: "v0.1.0"
//! cosim_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_case_label() -> String {
    "ieee39_htb".to_owned()
}

fn default_tf() -> f64 {
    20.0
}

fn default_ti() -> f64 {
    1.0
}

fn default_t_step() -> f64 {
    0.05
}

fn default_load_injection() -> bool {
    true
}

fn default_agc_enabled() -> bool {
    true
}

fn default_agc_interval() -> f64 {
    1.0
}

fn default_kp() -> f64 {
    0.005
}

fn default_ki() -> f64 {
    0.001
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_read_file() -> String {
    "htb_to_ltb.txt".to_owned()
}

fn default_write_file() -> String {
    "ltb_to_htb.txt".to_owned()
}

fn default_scale() -> f64 {
    1.0e4
}

fn default_bias() -> f64 {
    -2.0
}

fn default_counter_default() -> i64 {
    -4
}

fn default_bootstrap_counter() -> i64 {
    11
}

fn default_wrap_high() -> i64 {
    199
}

fn default_wrap_base() -> i64 {
    10
}

fn default_max_attempts() -> u32 {
    20
}

fn default_retry_delay() -> Duration {
    Duration::from_millis(5)
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("target/cosim")
}

fn default_output_prefix() -> String {
    "cosim".to_owned()
}

fn default_synthetic_seed() -> u64 {
    0xC0517u64
}

fn default_noise_std() -> f64 {
    2.0e-4
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

/// Primary configuration object for a bridge run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BridgeConfig {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub agc: AgcConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub synthetic: SyntheticConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where a [`BridgeConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedBridgeConfig {
    pub config: BridgeConfig,
    pub source: PathBuf,
}

impl BridgeConfig {
    pub const ENV_CONFIG_PATH: &str = "R_COSIM_CONFIG";

    /// Load configuration from disk, respecting the `R_COSIM_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedBridgeConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedBridgeConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedBridgeConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    /// Load and validate a specific configuration file.
    pub fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<BridgeConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants across all sections.
    pub fn validate(&self) -> Result<()> {
        self.run.validate()?;
        self.agc.validate(self.run.t_step)?;
        self.channel.validate()?;
        self.retry.validate()?;
        self.output.validate()?;
        self.synthetic.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for BridgeConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: BridgeConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Run horizon and cadence for the bridge loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Opaque label for the simulated case; passed through to logs and reports.
    #[serde(default = "default_case_label")]
    pub case_label: String,
    /// Simulation end time in seconds.
    #[serde(default = "default_tf")]
    pub tf: f64,
    /// Settle horizon in seconds run before the handshake starts.
    #[serde(default = "default_ti")]
    pub ti: f64,
    /// Simulation step size in seconds; also the handshake cadence.
    #[serde(default = "default_t_step")]
    pub t_step: f64,
    /// When set, handshake waits are forced to succeed on the first read.
    #[serde(default)]
    pub test_mode: bool,
    /// When false, decoded hardware power is observed but not injected.
    #[serde(default = "default_load_injection")]
    pub load_injection: bool,
}

impl RunConfig {
    /// Number of handshake steps the run will attempt, `ceil(tf / t_step)`.
    pub fn steps_total(&self) -> u64 {
        (self.tf / self.t_step).ceil() as u64
    }

    pub fn validate(&self) -> Result<()> {
        if self.case_label.trim().is_empty() {
            return Err(anyhow!("run.case_label must not be empty"));
        }
        if !(self.t_step > 0.0) {
            return Err(anyhow!("run.t_step must be positive, got {}", self.t_step));
        }
        if !(self.tf >= self.t_step) {
            return Err(anyhow!(
                "run.tf ({}) must be at least one step ({})",
                self.tf,
                self.t_step
            ));
        }
        if self.ti < 0.0 {
            return Err(anyhow!("run.ti must not be negative, got {}", self.ti));
        }
        Ok(())
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            case_label: default_case_label(),
            tf: default_tf(),
            ti: default_ti(),
            t_step: default_t_step(),
            test_mode: false,
            load_injection: default_load_injection(),
        }
    }
}

/// Automatic generation control cadence and PI gains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgcConfig {
    /// Gates application of the controller output, not its state updates.
    #[serde(default = "default_agc_enabled")]
    pub enabled: bool,
    /// Controller update interval in simulated seconds.
    #[serde(default = "default_agc_interval")]
    pub interval: f64,
    #[serde(default = "default_kp")]
    pub kp: f64,
    #[serde(default = "default_ki")]
    pub ki: f64,
    /// Integral seed carried into the controller at construction.
    #[serde(default)]
    pub integral0: f64,
}

impl AgcConfig {
    /// Controller cadence in whole simulation steps.
    pub fn steps_per_interval(&self, t_step: f64) -> u64 {
        (self.interval / t_step).round() as u64
    }

    pub fn validate(&self, t_step: f64) -> Result<()> {
        if !(self.interval > 0.0) {
            return Err(anyhow!(
                "agc.interval must be positive, got {}",
                self.interval
            ));
        }
        if self.steps_per_interval(t_step) == 0 {
            return Err(anyhow!(
                "agc.interval ({}) rounds to zero steps at t_step {}",
                self.interval,
                t_step
            ));
        }
        Ok(())
    }
}

impl Default for AgcConfig {
    fn default() -> Self {
        Self {
            enabled: default_agc_enabled(),
            interval: default_agc_interval(),
            kp: default_kp(),
            ki: default_ki(),
            integral0: 0.0,
        }
    }
}

/// Integer radix used for the three tokens on the read channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CounterRadix {
    #[default]
    Dec,
    Hex,
}

impl CounterRadix {
    pub fn base(&self) -> u32 {
        match self {
            CounterRadix::Dec => 10,
            CounterRadix::Hex => 16,
        }
    }
}

/// File channel endpoints, wire transform, and handshake counter ranges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Directory shared with the hardware side; both channel files live here.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// File written by the hardware, read by the bridge.
    #[serde(default = "default_read_file")]
    pub read_file: String,
    /// File written by the bridge, read by the hardware.
    #[serde(default = "default_write_file")]
    pub write_file: String,
    /// Affine scale applied to raw integer power tokens.
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Affine bias added after scaling on the read side.
    #[serde(default = "default_bias")]
    pub bias: f64,
    #[serde(default)]
    pub counter_radix: CounterRadix,
    /// Counter substituted when a read cannot be decoded.
    #[serde(default = "default_counter_default")]
    pub counter_default: i64,
    /// Initial power substituted until the first well-formed read.
    #[serde(default)]
    pub p_default: f64,
    #[serde(default)]
    pub q_default: f64,
    /// First counter value of a fresh hardware session.
    #[serde(default = "default_bootstrap_counter")]
    pub bootstrap_counter: i64,
    /// Highest counter value before the sequence wraps.
    #[serde(default = "default_wrap_high")]
    pub wrap_high: i64,
    /// Base the expectation resets to after a wrap; next expected is base + 1.
    #[serde(default = "default_wrap_base")]
    pub wrap_base: i64,
}

impl ChannelConfig {
    pub fn read_path(&self) -> PathBuf {
        self.data_dir.join(&self.read_file)
    }

    pub fn write_path(&self) -> PathBuf {
        self.data_dir.join(&self.write_file)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.scale.is_finite() && self.scale != 0.0) {
            return Err(anyhow!(
                "channel.scale must be finite and non-zero, got {}",
                self.scale
            ));
        }
        if !self.bias.is_finite() {
            return Err(anyhow!("channel.bias must be finite, got {}", self.bias));
        }
        if self.read_file == self.write_file {
            return Err(anyhow!(
                "channel.read_file and channel.write_file must differ ('{}')",
                self.read_file
            ));
        }
        if self.wrap_base >= self.wrap_high {
            return Err(anyhow!(
                "channel.wrap_base ({}) must be below channel.wrap_high ({})",
                self.wrap_base,
                self.wrap_high
            ));
        }
        if self.bootstrap_counter <= self.wrap_base || self.bootstrap_counter > self.wrap_high {
            return Err(anyhow!(
                "channel.bootstrap_counter ({}) must lie in ({}, {}]",
                self.bootstrap_counter,
                self.wrap_base,
                self.wrap_high
            ));
        }
        // A defaulted reading must never satisfy a sequence expectation.
        if self.counter_default > self.wrap_base && self.counter_default <= self.wrap_high {
            return Err(anyhow!(
                "channel.counter_default ({}) must lie outside the handshake range ({}, {}]",
                self.counter_default,
                self.wrap_base,
                self.wrap_high
            ));
        }
        Ok(())
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            read_file: default_read_file(),
            write_file: default_write_file(),
            scale: default_scale(),
            bias: default_bias(),
            counter_radix: CounterRadix::default(),
            counter_default: default_counter_default(),
            p_default: 0.0,
            q_default: 0.0,
            bootstrap_counter: default_bootstrap_counter(),
            wrap_high: default_wrap_high(),
            wrap_base: default_wrap_base(),
        }
    }
}

/// Bounded-retry discipline for handshake reads.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Read attempts per step before falling back to last-good power.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed pause between attempts, in milliseconds. Zero busy-polls.
    #[serde(default = "default_retry_delay")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub delay: Duration,
}

impl RetryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(anyhow!("retry.max_attempts must be at least 1"));
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay: default_retry_delay(),
        }
    }
}

/// Where the status table and run summary land.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_output_prefix")]
    pub file_prefix: String,
}

impl OutputConfig {
    pub fn validate(&self) -> Result<()> {
        if self.file_prefix.trim().is_empty() {
            return Err(anyhow!("output.file_prefix must not be empty"));
        }
        Ok(())
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            file_prefix: default_output_prefix(),
        }
    }
}

/// Deterministic synthetic-grid backend knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticConfig {
    #[serde(default = "default_synthetic_seed")]
    pub seed: u64,
    /// Standard deviation of the per-step frequency noise, in per-unit.
    #[serde(default = "default_noise_std")]
    pub noise_std: f64,
    /// When set, the backend reports a non-zero exit code on this step.
    #[serde(default)]
    pub fail_at_step: Option<u64>,
}

impl SyntheticConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.noise_std.is_finite() || self.noise_std < 0.0 {
            return Err(anyhow!(
                "synthetic.noise_std must be finite and non-negative, got {}",
                self.noise_std
            ));
        }
        Ok(())
    }
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            seed: default_synthetic_seed(),
            noise_std: default_noise_std(),
            fail_at_step: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}
