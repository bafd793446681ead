//! Supervisor thresholds, all defaults recovered from `super_config.py`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CasesConfig {
    pub power_on_temp_c: f64,
    pub power_off_temp_c: f64,
}

impl Default for CasesConfig {
    fn default() -> Self {
        Self {
            power_on_temp_c: 45.0,
            power_off_temp_c: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct HfConfig {
    pub power_on_temp_c: f64,
    pub power_off_temp_c: f64,
    /// Quadratic tone-mark coefficients `(c2, c1, c0)` against fluxgate
    /// electronics temperature. Placeholder values: the original never
    /// shipped a dedicated HF tone-frequency module (see DESIGN.md).
    pub tone_coeffs: (f64, f64, f64),
}

impl Default for HfConfig {
    fn default() -> Self {
        Self {
            power_on_temp_c: 45.0,
            power_off_temp_c: 50.0,
            tone_coeffs: (0.0, -0.02, 5.0),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct GpsConfig {
    pub max_sync_age_s: u64,
}

impl Default for GpsConfig {
    fn default() -> Self {
        Self { max_sync_age_s: 3600 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TempConfig {
    pub setpoint_c: f64,
    pub hysteresis_c: f64,
}

impl Default for TempConfig {
    fn default() -> Self {
        Self {
            setpoint_c: -25.0,
            hysteresis_c: 0.25,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ModemConfig {
    pub data_xfer_timeout_s: u64,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            data_xfer_timeout_s: 300,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CommMonitorConfig {
    pub max_init_time_s: u64,
    pub max_up_time_s: u64,
    pub max_down_time_s: u64,
}

impl Default for CommMonitorConfig {
    fn default() -> Self {
        Self {
            max_init_time_s: 6480,
            max_up_time_s: 43200,
            max_down_time_s: 7200,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub cases: CasesConfig,
    pub hf: HfConfig,
    pub gps: GpsConfig,
    pub temp: TempConfig,
    pub modem: ModemConfig,
    pub comm: CommMonitorConfig,
    pub tick_interval_s: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            cases: CasesConfig::default(),
            hf: HfConfig::default(),
            gps: GpsConfig::default(),
            temp: TempConfig::default(),
            modem: ModemConfig::default(),
            comm: CommMonitorConfig::default(),
            tick_interval_s: 15,
        }
    }
}

impl SupervisorConfig {
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}
