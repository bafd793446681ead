//! The hardware-manager RPC contract, shared by `aal-hwmgr` (the server)
//! and every process that controls power or reads status (the supervisor,
//! chiefly).

use aal_common::status::HwStatus;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::RpcClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Device {
    Irid,
    Fg,
    Sc,
    Cases,
    Hf,
    Htr,
    Gps,
    Ethernet,
    Usb,
    Pc104,
    Rs232,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SetPowerRequest {
    pub device: Device,
    pub on: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetStatusRequest {
    pub field: String,
}

/// Thin typed wrapper over [`RpcClient`] exposing the hardware manager's
/// five operations by name, mirroring the original's `hw_mgr` XMLRPC
/// surface (`set_power_state`, `reset_overcurrent`, `refresh`,
/// `get_hw_status`, `get_full_hw_status`).
pub struct HwMgrClient {
    rpc: RpcClient,
}

impl HwMgrClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            rpc: RpcClient::new(base_url, timeout),
        }
    }

    pub fn set_power(&self, device: Device, on: bool) -> Option<()> {
        self.rpc
            .call::<_, serde_json::Value>("set_power", &SetPowerRequest { device, on })
            .map(|_| ())
    }

    pub fn reset_overcurrent(&self) -> Option<()> {
        self.rpc
            .call_unit::<serde_json::Value>("reset_overcurrent")
            .map(|_| ())
    }

    pub fn refresh(&self) -> Option<()> {
        self.rpc
            .call_unit::<serde_json::Value>("refresh")
            .map(|_| ())
    }

    pub fn get_full_status(&self) -> Option<HwStatus> {
        self.rpc.call_unit("get_full_status")
    }
}
