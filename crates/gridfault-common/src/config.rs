//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared configuration and logging primitives."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_nominal_voltage_kv() -> f64 {
    20.0
}

fn default_source_vm_pu() -> f64 {
    1.0
}

fn default_transformer_vk_percent() -> f64 {
    6.0
}

fn default_base_mva() -> f64 {
    100.0
}

fn default_voltage_factor() -> f64 {
    1.1
}

fn default_source_sc_mva() -> f64 {
    1000.0
}

fn default_source_rx_ratio() -> f64 {
    0.1
}

fn default_source_z0_z1_ratio() -> f64 {
    1.0
}

fn default_line_zero_sequence_factor() -> f64 {
    3.0
}

fn default_transformer_z0_z1_ratio() -> f64 {
    1.0
}

fn default_solver_timeout() -> Option<Duration> {
    Some(Duration::from_secs(5))
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

/// Primary configuration object for network construction and fault evaluation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where an [`EngineConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedEngineConfig {
    pub config: EngineConfig,
    pub source: Option<PathBuf>,
}

impl EngineConfig {
    pub const ENV_CONFIG_PATH: &str = "GRIDFAULT_CONFIG";

    /// Load configuration from disk, respecting the `GRIDFAULT_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration together with the effective source path.
    ///
    /// Unlike daemon configuration, a missing file is not an error: the built-in
    /// defaults describe the representative network parameters.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedEngineConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedEngineConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedEngineConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        debug!("no configuration file found, using defaults");
        Ok(LoadedEngineConfig {
            config: EngineConfig::default(),
            source: None,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        contents
            .parse::<EngineConfig>()
            .with_context(|| format!("failed to load config file {}", path.display()))
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.network.validate()?;
        self.solver.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for EngineConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: EngineConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Voltage level assigned to every bus created from a node record.
    #[serde(default = "default_nominal_voltage_kv")]
    pub nominal_voltage_kv: f64,
    #[serde(default = "default_source_vm_pu")]
    pub source_vm_pu: f64,
    /// Short-circuit impedance used for every transformer, absent better data.
    #[serde(default = "default_transformer_vk_percent")]
    pub transformer_vk_percent: f64,
    #[serde(default)]
    pub transformer_fallback: TransformerFallbackConfig,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            nominal_voltage_kv: default_nominal_voltage_kv(),
            source_vm_pu: default_source_vm_pu(),
            transformer_vk_percent: default_transformer_vk_percent(),
            transformer_fallback: TransformerFallbackConfig::default(),
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.nominal_voltage_kv > 0.0) {
            return Err(anyhow!(
                "network.nominal_voltage_kv must be positive, got {}",
                self.nominal_voltage_kv
            ));
        }
        if !(self.source_vm_pu > 0.0) {
            return Err(anyhow!(
                "network.source_vm_pu must be positive, got {}",
                self.source_vm_pu
            ));
        }
        if !(self.transformer_vk_percent > 0.0) {
            return Err(anyhow!(
                "network.transformer_vk_percent must be positive, got {}",
                self.transformer_vk_percent
            ));
        }
        self.transformer_fallback.validate()
    }
}

/// Representative transformer parameters substituted when a record cannot be parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformerFallbackConfig {
    pub sn_mva: f64,
    pub vn_hv_kv: f64,
    pub vn_lv_kv: f64,
    pub vk_percent: f64,
    pub vkr_percent: f64,
    pub pfe_kw: f64,
    pub i0_percent: f64,
}

impl Default for TransformerFallbackConfig {
    fn default() -> Self {
        Self {
            sn_mva: 20.0,
            vn_hv_kv: 110.0,
            vn_lv_kv: 21.0,
            vk_percent: 6.0,
            vkr_percent: 0.5,
            pfe_kw: 1.0,
            i0_percent: 0.1,
        }
    }
}

impl TransformerFallbackConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.sn_mva > 0.0 && self.vn_hv_kv > 0.0 && self.vn_lv_kv > 0.0) {
            return Err(anyhow!(
                "network.transformer_fallback ratings must be positive"
            ));
        }
        if !(self.vk_percent > 0.0) || self.vkr_percent < 0.0 {
            return Err(anyhow!(
                "network.transformer_fallback impedance percentages are invalid"
            ));
        }
        Ok(())
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    #[serde(default = "default_base_mva")]
    pub base_mva: f64,
    /// IEC 60909 voltage factor `c` applied to the pre-fault voltage.
    #[serde(default = "default_voltage_factor")]
    pub voltage_factor: f64,
    /// Short-circuit power of every external grid feed-in.
    #[serde(default = "default_source_sc_mva")]
    pub source_sc_mva: f64,
    #[serde(default = "default_source_rx_ratio")]
    pub source_rx_ratio: f64,
    #[serde(default = "default_source_z0_z1_ratio")]
    pub source_z0_z1_ratio: f64,
    #[serde(default = "default_line_zero_sequence_factor")]
    pub line_zero_sequence_factor: f64,
    #[serde(default = "default_transformer_z0_z1_ratio")]
    pub transformer_z0_z1_ratio: f64,
    #[serde(default = "default_solver_timeout")]
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    pub timeout: Option<Duration>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            base_mva: default_base_mva(),
            voltage_factor: default_voltage_factor(),
            source_sc_mva: default_source_sc_mva(),
            source_rx_ratio: default_source_rx_ratio(),
            source_z0_z1_ratio: default_source_z0_z1_ratio(),
            line_zero_sequence_factor: default_line_zero_sequence_factor(),
            transformer_z0_z1_ratio: default_transformer_z0_z1_ratio(),
            timeout: default_solver_timeout(),
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.base_mva > 0.0) {
            return Err(anyhow!("solver.base_mva must be positive"));
        }
        if !(0.9..=1.2).contains(&self.voltage_factor) {
            return Err(anyhow!(
                "solver.voltage_factor must lie within [0.9, 1.2], got {}",
                self.voltage_factor
            ));
        }
        if !(self.source_sc_mva > 0.0) {
            return Err(anyhow!("solver.source_sc_mva must be positive"));
        }
        for (name, value) in [
            ("source_rx_ratio", self.source_rx_ratio),
            ("source_z0_z1_ratio", self.source_z0_z1_ratio),
            ("line_zero_sequence_factor", self.line_zero_sequence_factor),
            ("transformer_z0_z1_ratio", self.transformer_z0_z1_ratio),
        ] {
            if !(value >= 0.0) {
                return Err(anyhow!("solver.{} must be non-negative", name));
            }
        }
        Ok(())
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config: EngineConfig = "".parse().expect("defaults parse");
        assert_eq!(config.network.nominal_voltage_kv, 20.0);
        assert_eq!(config.network.transformer_vk_percent, 6.0);
        assert_eq!(config.network.transformer_fallback.sn_mva, 20.0);
        assert_eq!(config.solver.voltage_factor, 1.1);
        assert_eq!(config.solver.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn overrides_are_applied() {
        let config: EngineConfig = r#"
            [network]
            nominal_voltage_kv = 10.0

            [solver]
            source_sc_mva = 250.0
            timeout = 1500

            [logging]
            format = "pretty"
        "#
        .parse()
        .expect("config parses");
        assert_eq!(config.network.nominal_voltage_kv, 10.0);
        assert_eq!(config.solver.source_sc_mva, 250.0);
        assert_eq!(config.solver.timeout, Some(Duration::from_millis(1500)));
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn invalid_voltage_factor_is_rejected() {
        let err = "[solver]\nvoltage_factor = 2.0\n"
            .parse::<EngineConfig>()
            .unwrap_err();
        assert!(err.to_string().contains("voltage_factor"));
    }

    #[test]
    fn missing_candidates_fall_back_to_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let loaded = EngineConfig::load_with_source(&[dir.path().join("absent.toml")])
            .expect("defaults");
        if std::env::var(EngineConfig::ENV_CONFIG_PATH).is_err() {
            assert!(loaded.source.is_none());
        }
    }

    #[test]
    fn candidate_file_is_loaded() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("gridfault.toml");
        fs::write(&path, "[network]\nsource_vm_pu = 1.02\n").expect("write config");
        let config = EngineConfig::from_path(&path).expect("config loads");
        assert_eq!(config.network.source_vm_pu, 1.02);
    }
}
