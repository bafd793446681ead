//! `comm-watchdog` — a standalone, coarser safety net independent of
//! `super`: re-reads the same link-liveness touch-files on its own polling
//! period and reboots to the golden image if comm has been stuck in one
//! state for too long. Mirrors `comm-watchdog-daemon.py`'s looser
//! thresholds (hours, not minutes) so a bug in the supervisor itself can't
//! also take this watchdog down with it.

use aal_common::config::FleetConfig;
use aal_supervisor::comm::CommMonitor;
use aal_supervisor::config::CommMonitorConfig;
use aal_supervisor::reboot::reboot_to_golden_image;
use aal_tunnel::flags::LinkFlags;
use clap::Parser;
use std::thread;
use std::time::Duration;

#[derive(Parser)]
struct Cli {
    #[arg(long, default_value = "/etc/aal-pip/fleet.toml")]
    fleet_config: String,

    #[arg(long, default_value_t = 20)]
    polling_period_s: u64,

    /// No initial RUDICS connection within this many seconds of startup.
    #[arg(long, default_value_t = 2 * 60 * 60)]
    max_init_time_s: u64,

    /// No RUDICS disconnection during a contiguous window this long.
    #[arg(long, default_value_t = 24 * 60 * 60)]
    max_up_time_s: u64,

    /// No RUDICS connection during a contiguous window this long.
    #[arg(long, default_value_t = 24 * 60 * 60)]
    max_down_time_s: u64,
}

fn main() -> anyhow::Result<()> {
    aal_common::logging::init("comm-watchdog");
    let cli = Cli::parse();

    let fleet_config = FleetConfig::load(std::path::Path::new(&cli.fleet_config))?;
    let paths = fleet_config.paths;
    let link_flags = LinkFlags::new(paths.connect_time_file(), paths.disconnect_time_file());

    let mut monitor = CommMonitor::new(CommMonitorConfig {
        max_init_time_s: cli.max_init_time_s,
        max_up_time_s: cli.max_up_time_s,
        max_down_time_s: cli.max_down_time_s,
    });

    tracing::info!("comm-watchdog: state is init");
    loop {
        let action = monitor.tick(link_flags.connected(), cli.polling_period_s);
        if action == aal_supervisor::comm::CommAction::Reboot {
            tracing::error!(state = ?monitor.state(), "comm-watchdog: rebooting with golden code");
            if let Err(e) = reboot_to_golden_image(&paths) {
                tracing::error!(error = %e, "comm-watchdog: failed to stage golden image reboot");
            }
        }
        thread::sleep(Duration::from_secs(cli.polling_period_s));
    }
}
