//! `hw-mgr` — serves the fleet's hardware status snapshot and power-switch
//! commands over RPC.

use aal_common::config::HW_MGR_PORTS;
use aal_hwmgr::{Device, HwManager};
use clap::Parser;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
struct Cli {
    #[arg(long, default_value = "/usr/local/bin/sbcctl")]
    sbcctl_path: String,

    #[arg(long, default_value_t = HW_MGR_PORTS.rpc_port())]
    rpc_port: u16,

    #[arg(long, default_value_t = 15)]
    refresh_interval_s: u64,
}

#[derive(Deserialize)]
struct SetPowerRequest {
    device: String,
    on: bool,
}

fn parse_device(name: &str) -> Option<Device> {
    Some(match name.to_lowercase().as_str() {
        "irid" => Device::Irid,
        "fg" => Device::Fg,
        "sc" => Device::Sc,
        "cases" => Device::Cases,
        "hf" => Device::Hf,
        "htr" => Device::Htr,
        "gps" => Device::Gps,
        "ethernet" => Device::Ethernet,
        "usb" => Device::Usb,
        "pc104" => Device::Pc104,
        "rs232" => Device::Rs232,
        _ => return None,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    aal_common::logging::init("hw-mgr");
    let cli = Cli::parse();

    let manager = Arc::new(HwManager::new(cli.sbcctl_path));
    manager.refresh();

    {
        let manager = manager.clone();
        let interval = Duration::from_secs(cli.refresh_interval_s);
        std::thread::spawn(move || loop {
            std::thread::sleep(interval);
            manager.refresh();
        });
    }

    let set_power_mgr = manager.clone();
    let reset_mgr = manager.clone();
    let refresh_mgr = manager.clone();
    let status_mgr = manager.clone();

    let server = aal_rpc::RpcServer::new()
        .method("set_power", move |body: serde_json::Value| {
            let mgr = set_power_mgr.clone();
            async move {
                let req: SetPowerRequest = serde_json::from_value(body).map_err(|e| e.to_string())?;
                let device = parse_device(&req.device).ok_or_else(|| format!("unknown device: {}", req.device))?;
                mgr.set_power(device, req.on);
                Ok(serde_json::Value::Null)
            }
        })
        .method("reset_overcurrent", move |_: serde_json::Value| {
            let mgr = reset_mgr.clone();
            async move {
                mgr.reset_overcurrent();
                Ok(serde_json::Value::Null)
            }
        })
        .method("refresh", move |_: serde_json::Value| {
            let mgr = refresh_mgr.clone();
            async move {
                mgr.refresh();
                Ok(serde_json::Value::Null)
            }
        })
        .method("get_full_status", move |_: serde_json::Value| {
            let mgr = status_mgr.clone();
            async move {
                serde_json::to_value(mgr.get_full_status()).map_err(|e| e.to_string())
            }
        });

    let addr: SocketAddr = ([127, 0, 0, 1], cli.rpc_port).into();
    server.serve(addr).await?;
    Ok(())
}
