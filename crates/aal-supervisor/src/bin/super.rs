//! `super` — the supervisor. Runs the one-time ethernet controller at
//! startup, then a 15-second tick loop driving CASES, GPS, temperature,
//! FG/SC, HF, modem, and the comm monitor in fixed order, emitting one
//! housekeeping CSV row per tick. Exposes `set_temp`/`fg`/`sc`/`hf`/
//! `cases`/`irid` over RPC, mirroring the original's `XMLRPCThread`.

use aal_common::config::{FleetConfig, Paths, HW_MGR_PORTS, SUPER_PORTS, SVR_PROXY_PORTS};
use aal_hwmgr::subprocess;
use aal_rpc::hwmgr::{Device, HwMgrClient};
use aal_rpc::RpcClient;
use aal_supervisor::cases::{CasesAction, CasesController, CasesMode};
use aal_supervisor::comm::{CommAction, CommMonitor};
use aal_supervisor::config::SupervisorConfig;
use aal_supervisor::ethernet;
use aal_supervisor::fgsc::FgScController;
use aal_supervisor::gps::GpsController;
use aal_supervisor::hf::{HfAction, HfController};
use aal_supervisor::housekeeping::HousekeepingWriter;
use aal_supervisor::modem::ModemController;
use aal_supervisor::reboot::reboot_to_golden_image;
use aal_supervisor::temp::TempController;
use aal_tunnel::flags::LinkFlags;
use chrono::{Datelike, Local, Timelike};
use clap::Parser;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Parser)]
struct Cli {
    #[arg(long, default_value = "/etc/aal-pip/super.toml")]
    config: String,

    #[arg(long, default_value = "/etc/aal-pip/fleet.toml")]
    fleet_config: String,

    #[arg(long, default_value_t = SUPER_PORTS.rpc_port())]
    rpc_port: u16,

    #[arg(long, default_value = "127.0.0.1")]
    hw_mgr_host: String,

    #[arg(long, default_value_t = HW_MGR_PORTS.rpc_port())]
    hw_mgr_port: u16,

    #[arg(long, default_value = "127.0.0.1")]
    svr_proxy_host: String,

    #[arg(long, default_value_t = SVR_PROXY_PORTS.rpc_port())]
    svr_proxy_port: u16,
}

struct Controllers {
    cases: CasesController,
    hf: HfController,
    gps: GpsController,
    temp: TempController,
    fgsc: FgScController,
    modem: ModemController,
    comm: CommMonitor,
}

type SharedControllers = Arc<Mutex<Controllers>>;

#[derive(Deserialize)]
struct SetTempRequest {
    setpoint_c: f64,
}

#[derive(Deserialize)]
struct OnOffRequest {
    on: bool,
}

#[derive(Deserialize)]
struct CasesRequest {
    command: String,
}

#[derive(Deserialize)]
struct IridRequest {
    command: String,
}

/// Runs the ethernet interface's one-time startup check: if the cable
/// isn't plugged in, the interface is powered off for good, matching
/// `ControlEthernetPower.py`.
fn run_ethernet_controller(hw_mgr: &HwMgrClient) {
    match subprocess::exec("ifconfig eth0") {
        Ok((out, _)) if ethernet::wants_power_off(&out) => {
            tracing::info!("ethernet link not running, powering interface off");
            hw_mgr.set_power(Device::Ethernet, false);
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "failed to read ethernet link state"),
    }
}

/// Seconds elapsed since `svr-proxy` last saw non-ping traffic, or `0` if
/// `svr-proxy` can't be reached (treated as "recent" so the modem doesn't
/// flap off just because the RPC call itself timed out).
fn seconds_since_last_xfer(svr_proxy: &RpcClient) -> u64 {
    svr_proxy
        .call_unit::<String>("time_of_last_data_xfer")
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
        .map(|t| (chrono::Utc::now() - t.with_timezone(&chrono::Utc)).num_seconds().max(0) as u64)
        .unwrap_or(0)
}

#[allow(clippy::too_many_arguments)]
fn run_tick(
    controllers: &SharedControllers,
    hw_mgr: &HwMgrClient,
    svr_proxy: &RpcClient,
    link_flags: &LinkFlags,
    paths: &Paths,
    housekeeping: &Mutex<HousekeepingWriter>,
    tick_interval_s: u64,
) {
    let status = hw_mgr.get_full_status().unwrap_or_default();
    let now = Local::now();

    if let Ok(mut hk) = housekeeping.lock() {
        if let Err(e) = hk.tick(now.naive_local(), &status) {
            tracing::warn!(error = %e, "housekeeping write failed");
        }
    }

    let mut c = controllers.lock().expect("controllers lock poisoned");

    match c.cases.tick(status.router_temp, now.time(), now.month()) {
        CasesAction::PowerOn => {
            hw_mgr.set_power(Device::Cases, true);
        }
        CasesAction::Halt => tracing::info!("halting cases instrument"),
        CasesAction::PowerOff => {
            hw_mgr.set_power(Device::Cases, false);
        }
        CasesAction::None => {}
    }

    let gps_on = c.gps.wants_power(status.sync_age_s);
    if gps_on != status.gps_pwr.is_on() {
        hw_mgr.set_power(Device::Gps, gps_on);
    }

    let heater_on = c.temp.tick(status.router_temp);
    if heater_on != status.htr_pwr.is_on() {
        hw_mgr.set_power(Device::Htr, heater_on);
    }

    let (fg_on, sc_on) = c.fgsc.tick();
    if fg_on != status.fg_pwr.is_on() {
        hw_mgr.set_power(Device::Fg, fg_on);
    }
    if sc_on != status.sc_pwr.is_on() {
        hw_mgr.set_power(Device::Sc, sc_on);
    }

    match c.hf.tick(status.router_temp, now.time()) {
        HfAction::PowerOn => {
            hw_mgr.set_power(Device::Hf, true);
        }
        HfAction::Halt => tracing::info!("halting hf instrument"),
        HfAction::PowerOff => {
            hw_mgr.set_power(Device::Hf, false);
        }
        HfAction::None => {}
    }

    let modem_on = c.modem.wants_power(seconds_since_last_xfer(svr_proxy));
    if modem_on != status.irid_pwr.is_on() {
        hw_mgr.set_power(Device::Irid, modem_on);
    }

    if c.comm.tick(link_flags.connected(), tick_interval_s) == CommAction::Reboot {
        tracing::error!("comm monitor threshold exceeded, rebooting to golden image");
        if let Err(e) = reboot_to_golden_image(paths) {
            tracing::error!(error = %e, "failed to stage golden image reboot");
        }
    }
}

fn spawn_rpc_server(controllers: SharedControllers, addr: SocketAddr) {
    thread::Builder::new()
        .name("super-rpc".into())
        .spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed to build rpc runtime");
            rt.block_on(async move {
                let set_temp_c = controllers.clone();
                let fg_c = controllers.clone();
                let sc_c = controllers.clone();
                let hf_c = controllers.clone();
                let cases_c = controllers.clone();
                let irid_c = controllers.clone();

                let server = aal_rpc::RpcServer::new()
                    .method("set_temp", move |body: serde_json::Value| {
                        let controllers = set_temp_c.clone();
                        async move {
                            let req: SetTempRequest = serde_json::from_value(body).map_err(|e| e.to_string())?;
                            controllers.lock().expect("controllers lock poisoned").temp.set_setpoint(req.setpoint_c);
                            Ok(serde_json::Value::Null)
                        }
                    })
                    .method("fg", move |body: serde_json::Value| {
                        let controllers = fg_c.clone();
                        async move {
                            let req: OnOffRequest = serde_json::from_value(body).map_err(|e| e.to_string())?;
                            controllers.lock().expect("controllers lock poisoned").fgsc.set_fg_enabled(req.on);
                            Ok(serde_json::Value::Null)
                        }
                    })
                    .method("sc", move |body: serde_json::Value| {
                        let controllers = sc_c.clone();
                        async move {
                            let req: OnOffRequest = serde_json::from_value(body).map_err(|e| e.to_string())?;
                            controllers.lock().expect("controllers lock poisoned").fgsc.set_sc_enabled(req.on);
                            Ok(serde_json::Value::Null)
                        }
                    })
                    .method("hf", move |body: serde_json::Value| {
                        let controllers = hf_c.clone();
                        async move {
                            let req: OnOffRequest = serde_json::from_value(body).map_err(|e| e.to_string())?;
                            controllers.lock().expect("controllers lock poisoned").hf.set_master_enable(req.on);
                            Ok(serde_json::Value::Null)
                        }
                    })
                    .method("cases", move |body: serde_json::Value| {
                        let controllers = cases_c.clone();
                        async move {
                            let req: CasesRequest = serde_json::from_value(body).map_err(|e| e.to_string())?;
                            let mut c = controllers.lock().expect("controllers lock poisoned");
                            match req.command.as_str() {
                                "on" => c.cases.set_master_enable(true),
                                "off" => c.cases.set_master_enable(false),
                                "normal_mode" => c.cases.set_mode(CasesMode::Normal),
                                "storm_mode" => c.cases.set_mode(CasesMode::Storm),
                                "update_mode" => c.cases.set_mode(CasesMode::Update),
                                other => return Err(format!("unknown cases command: {other}")),
                            }
                            Ok(serde_json::Value::Null)
                        }
                    })
                    .method("irid", move |body: serde_json::Value| {
                        let controllers = irid_c.clone();
                        async move {
                            let req: IridRequest = serde_json::from_value(body).map_err(|e| e.to_string())?;
                            let mut c = controllers.lock().expect("controllers lock poisoned");
                            match req.command.as_str() {
                                "on" => c.modem.set_override(true),
                                "off" => c.modem.set_override(false),
                                "auto" => c.modem.clear_override(),
                                other => return Err(format!("unknown irid command: {other}")),
                            }
                            Ok(serde_json::Value::Null)
                        }
                    });

                if let Err(e) = server.serve(addr).await {
                    tracing::error!(error = %e, "rpc server exited");
                }
            });
        })
        .expect("failed to spawn rpc thread");
}

fn main() -> anyhow::Result<()> {
    aal_common::logging::init("super");
    let cli = Cli::parse();

    let fleet_config = FleetConfig::load(std::path::Path::new(&cli.fleet_config))?;
    let config = SupervisorConfig::load(std::path::Path::new(&cli.config))?;
    let paths = fleet_config.paths.clone();

    let hw_mgr = HwMgrClient::new(
        format!("http://{}:{}", cli.hw_mgr_host, cli.hw_mgr_port),
        Duration::from_secs(fleet_config.timeouts.rpc_transport_s),
    );
    let svr_proxy = RpcClient::new(
        format!("http://{}:{}", cli.svr_proxy_host, cli.svr_proxy_port),
        Duration::from_secs(fleet_config.timeouts.rpc_transport_s),
    );
    let link_flags = LinkFlags::new(paths.connect_time_file(), paths.disconnect_time_file());
    let housekeeping = Mutex::new(HousekeepingWriter::new(paths.hskp_temp_dir.clone())?);

    run_ethernet_controller(&hw_mgr);

    let controllers: SharedControllers = Arc::new(Mutex::new(Controllers {
        cases: CasesController::new(config.cases),
        hf: HfController::new(config.hf),
        gps: GpsController::new(config.gps),
        temp: TempController::new(config.temp),
        fgsc: FgScController::new(),
        modem: ModemController::new(config.modem),
        comm: CommMonitor::new(config.comm),
    }));

    spawn_rpc_server(controllers.clone(), ([127, 0, 0, 1], cli.rpc_port).into());

    let tick_interval_s = config.tick_interval_s;
    loop {
        thread::sleep(Duration::from_secs(1));
        if !(Local::now().second() as u64).is_multiple_of(tick_interval_s) {
            continue;
        }
        run_tick(&controllers, &hw_mgr, &svr_proxy, &link_flags, &paths, &housekeeping, tick_interval_s);
    }
}
