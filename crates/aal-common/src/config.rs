//! Per-process configuration: base ports, filesystem paths, timeouts.
//!
//! Defaults mirror the original fleet's `*_config.py` modules. Every field
//! can be overridden by a TOML file (`Config::load`) and the base port can
//! additionally be overridden via an `AAL_<PROC>_BASE_PORT` environment
//! variable, matching how the original deployed different base ports per
//! field site.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Base port for a process; console/client ports are `base_port + 0`,
/// and the RPC port is `base_port + 40` for every process except
/// `modem_svr`, whose RPC port is `base_port + 1`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PortScheme {
    pub base_port: u16,
    pub rpc_offset: u16,
}

impl PortScheme {
    pub const fn rpc_port(&self) -> u16 {
        self.base_port + self.rpc_offset
    }

    pub const fn console_port(&self) -> u16 {
        self.base_port
    }
}

pub const SUPER_PORTS: PortScheme = PortScheme {
    base_port: 9000,
    rpc_offset: 40,
};
pub const SVR_PROXY_PORTS: PortScheme = PortScheme {
    base_port: 9100,
    rpc_offset: 40,
};
pub const MODEM_SVR_PORTS: PortScheme = PortScheme {
    base_port: 9200,
    rpc_offset: 1,
};
pub const HW_MGR_PORTS: PortScheme = PortScheme {
    base_port: 9300,
    rpc_offset: 40,
};
pub const CASES_MGR_PORTS: PortScheme = PortScheme {
    base_port: 9400,
    rpc_offset: 40,
};
pub const FG_MGR_PORTS: PortScheme = PortScheme {
    base_port: 9500,
    rpc_offset: 40,
};
pub const HF_MGR_PORTS: PortScheme = PortScheme {
    base_port: 9600,
    rpc_offset: 40,
};

/// Loads a base port override from `AAL_<PROC>_BASE_PORT`, falling back to
/// `default` when unset or unparseable.
pub fn base_port_override(proc_name: &str, default: u16) -> u16 {
    std::env::var(format!("AAL_{}_BASE_PORT", proc_name.to_uppercase()))
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Filesystem paths shared by more than one process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub log_dir: PathBuf,
    pub flag_dir: PathBuf,
    pub hskp_temp_dir: PathBuf,
    pub usb_data_dir: PathBuf,
    pub golden_code_dir: PathBuf,
    pub install_dir: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            log_dir: "/var/log".into(),
            flag_dir: "/var/log".into(),
            hskp_temp_dir: "/tmp/hskp".into(),
            usb_data_dir: "/mnt/usbflash/data".into(),
            golden_code_dir: "/golden_code".into(),
            install_dir: "/install".into(),
        }
    }
}

impl Paths {
    pub fn connect_time_file(&self) -> PathBuf {
        self.flag_dir.join("connect_time")
    }

    pub fn disconnect_time_file(&self) -> PathBuf {
        self.flag_dir.join("disconnect_time")
    }
}

/// Common timeouts, in seconds unless noted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub rpc_transport_s: u64,
    pub tunnel_rx_inactivity_s: u64,
    pub hw_mgr_startup_wait_s: u64,
    pub data_xfer_timeout_s: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            rpc_transport_s: 10,
            tunnel_rx_inactivity_s: 90,
            hw_mgr_startup_wait_s: 10,
            data_xfer_timeout_s: 300,
        }
    }
}

/// Whether a process should shut down gracefully on SIGINT or ignore it,
/// matching the original's per-process `accept_sigint` flag.
pub fn shutdown_on_sigint_default() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub paths: Paths,
    pub timeouts: Timeouts,
    pub shutdown_on_sigint: bool,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            paths: Paths::default(),
            timeouts: Timeouts::default(),
            shutdown_on_sigint: shutdown_on_sigint_default(),
        }
    }
}

impl FleetConfig {
    /// Loads configuration from a TOML file, falling back to defaults for
    /// any field the file omits. Returns defaults outright if `path` does
    /// not exist.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_scheme_offsets() {
        assert_eq!(SUPER_PORTS.rpc_port(), 9040);
        assert_eq!(MODEM_SVR_PORTS.rpc_port(), 9201);
        assert_eq!(SVR_PROXY_PORTS.rpc_port(), 9140);
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let cfg = FleetConfig::default();
        let text = toml::to_string(&cfg).unwrap();
        let parsed: FleetConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.timeouts.rpc_transport_s, cfg.timeouts.rpc_transport_s);
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let cfg = FleetConfig::load(std::path::Path::new("/nonexistent/aal.toml")).unwrap();
        assert_eq!(cfg.timeouts.data_xfer_timeout_s, 300);
    }
}
