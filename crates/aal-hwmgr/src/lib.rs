//! The hardware manager: refreshes and serves the fleet's hardware status
//! snapshot, and dispatches power-switching commands to `sbcctl`.

pub mod sbcctl;
pub mod subprocess;

use aal_common::status::HwStatus;
use std::sync::RwLock;
use std::time::Duration;

/// ADC offset/gain for this board, looked up from `/proc/cpuinfo`'s serial
/// number against a calibration table in the original; since no
/// calibration table ships with this workspace, this implementation uses
/// the original's own fallback of offset=0, gain=1 (an uncalibrated board).
pub const DEFAULT_ADC_OFFSET: f64 = 0.0;
pub const DEFAULT_ADC_GAIN: f64 = 1.0;

pub const OVER_CUR_RESET_DWELL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
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

impl Device {
    /// The `sbcctl` argument string for turning this device on/off, mirroring
    /// the original's `set_power` device dispatch.
    fn sbcctl_cmd(self, on: bool) -> String {
        let state = if on { "on" } else { "off" };
        match self {
            Device::Usb => format!("usb {state}"),
            Device::Ethernet => format!("ethernet {state}"),
            Device::Pc104 => format!("pc104 {state}"),
            Device::Rs232 => format!("rs232 {state}"),
            Device::Irid => format!("setpin DIO1 0 {state}"),
            Device::Fg => format!("setpin DIO1 1 {state}"),
            Device::Sc => format!("setpin DIO1 2 {state}"),
            Device::Cases => format!("setpin DIO1 3 {state}"),
            Device::Hf => format!("setpin DIO1 4 {state}"),
            Device::Htr => format!("setpin DIO1 5 {state}"),
            Device::Gps => format!("setpin DIO1 6 {state}"),
        }
    }

    /// Devices whose power-up draws through the PC-104 bus, which must be
    /// kept powered for USB to keep working — mirrors `_control_PC104_power`.
    fn needs_pc104(self) -> bool {
        matches!(self, Device::Irid | Device::Cases | Device::Hf | Device::Gps)
    }
}

pub struct HwManager {
    sbcctl_path: String,
    status: RwLock<HwStatus>,
}

impl HwManager {
    pub fn new(sbcctl_path: impl Into<String>) -> Self {
        Self {
            sbcctl_path: sbcctl_path.into(),
            status: RwLock::new(HwStatus::default()),
        }
    }

    fn sbcctl(&self, args: &str) {
        let cmd = format!("{} {}", self.sbcctl_path, args);
        if let Err(e) = subprocess::exec(&cmd) {
            tracing::error!(cmd, error = %e, "sbcctl command failed");
        }
    }

    pub fn set_power(&self, device: Device, on: bool) {
        self.sbcctl(&device.sbcctl_cmd(on));
        if device.needs_pc104() && on {
            let pc104_on = self.status.read().expect("status lock poisoned").pc104_pwr.is_on();
            if !pc104_on {
                self.sbcctl("pc104 on");
            }
        }
    }

    pub fn reset_overcurrent(&self) {
        self.sbcctl("setpin DIO2 3 on");
        std::thread::sleep(OVER_CUR_RESET_DWELL);
        self.sbcctl("setpin DIO2 3 off");
    }

    /// Refreshes the status snapshot by shelling out to `sbcctl status` and
    /// parsing `/proc/gps_pps` and `uptime`. Individual sub-refreshes that
    /// fail (missing driver, command error) leave their fields at their
    /// prior value rather than aborting the whole refresh.
    pub fn refresh(&self) {
        let mut next = self.status.read().expect("status lock poisoned").clone();

        let executable = format!("{} status", self.sbcctl_path);
        match subprocess::exec(&executable) {
            Ok((out, _err)) => {
                next = sbcctl::parse_sbcctl_status(&out, DEFAULT_ADC_OFFSET, DEFAULT_ADC_GAIN);
            }
            Err(e) => tracing::error!(error = %e, "sbcctl status failed"),
        }

        if let Ok((out, _err)) = subprocess::exec("cat /proc/gps_pps") {
            apply_gps_pps(&mut next, &out);
        }

        if let Ok((out, _err)) = subprocess::exec("cat /proc/uptime") {
            if let Some(first) = out.split_whitespace().next() {
                next.uptime_s = first.parse::<f64>().ok().map(|v| v as u64);
            }
        }

        if let Ok((out, _err)) = subprocess::exec("uptime") {
            apply_load_averages(&mut next, &out);
        }

        *self.status.write().expect("status lock poisoned") = next;
    }

    pub fn get_full_status(&self) -> HwStatus {
        self.status.read().expect("status lock poisoned").clone()
    }
}

/// Parses `/proc/gps_pps`'s `Sync Age,Sys Time Error,Lat,Long` CSV report
/// into the status snapshot, falling back to an Iridium-epoch sync age
/// when the GPS sync is stale, matching the original's "Iridium Time Fix".
fn apply_gps_pps(status: &mut HwStatus, text: &str) {
    let mut lines = text.lines();
    let Some(header) = lines.next() else { return };
    if !header.starts_with("Sync Age") {
        return;
    }
    let Some(data) = lines.next() else { return };
    let fields: Vec<&str> = data.split(',').collect();
    if fields.len() < 4 {
        return;
    }
    let sync_age: u64 = fields[0].parse().unwrap_or(0);
    status.sync_age_s = Some(sync_age);
    status.sys_time_error_s = fields[1].parse().ok();
    status.lat = fields[2].parse().ok().map(sbcctl::garmin_to_degs);
    status.long = fields[3].parse().ok().map(sbcctl::garmin_to_degs);

    if sync_age > 10_000 {
        // original falls back to the Iridium modem's epoch time here;
        // this workspace has no `/proc/iridium_time` source to sample,
        // so the sync age is left at its GPS-reported (stale) value
        tracing::warn!(sync_age, "GPS sync stale, no Iridium time fallback available");
    }
}

/// Parses the trailing three load-average fields out of `uptime`'s output,
/// matching the original's `fields[last-2:last+1]` slice (after stripping
/// the thousands-separator commas `uptime` inserts into process counts).
fn apply_load_averages(status: &mut HwStatus, text: &str) {
    let cleaned = text.replace(',', "");
    let fields: Vec<&str> = cleaned.split_whitespace().collect();
    if fields.len() < 3 {
        return;
    }
    let n = fields.len();
    status.load_avg_1 = fields[n - 3].parse().ok();
    status.load_avg_5 = fields[n - 2].parse().ok();
    status.load_avg_15 = fields[n - 1].parse().ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_averages_parsed_from_trailing_uptime_fields() {
        let mut status = HwStatus::default();
        apply_load_averages(
            &mut status,
            " 10:15:01 up 3 days, 4:32, 2 users, load average: 0.10, 0.25, 0.30",
        );
        assert_eq!(status.load_avg_1, Some(0.10));
        assert_eq!(status.load_avg_5, Some(0.25));
        assert_eq!(status.load_avg_15, Some(0.30));
    }

    #[test]
    fn sbcctl_cmd_for_bus_devices_uses_named_form() {
        assert_eq!(Device::Usb.sbcctl_cmd(true), "usb on");
        assert_eq!(Device::Ethernet.sbcctl_cmd(false), "ethernet off");
    }

    #[test]
    fn sbcctl_cmd_for_pin_devices_uses_dio1() {
        assert_eq!(Device::Irid.sbcctl_cmd(true), "setpin DIO1 0 on");
        assert_eq!(Device::Gps.sbcctl_cmd(false), "setpin DIO1 6 off");
    }

    #[test]
    fn needs_pc104_matches_original_device_set() {
        assert!(Device::Irid.needs_pc104());
        assert!(Device::Cases.needs_pc104());
        assert!(!Device::Htr.needs_pc104());
        assert!(!Device::Fg.needs_pc104());
    }

    #[test]
    fn gps_pps_parses_valid_report() {
        let mut status = HwStatus::default();
        apply_gps_pps(&mut status, "Sync Age,Sys Time Error,Lat,Long\n60,-0.996319,4217.6544,-08342.6943");
        assert_eq!(status.sync_age_s, Some(60));
        assert!(status.lat.unwrap() > 42.0 && status.lat.unwrap() < 43.0);
    }

    #[test]
    fn gps_pps_ignores_report_when_driver_not_running() {
        let mut status = HwStatus::default();
        status.sync_age_s = Some(5);
        apply_gps_pps(&mut status, "cat: /proc/gps_pps: No such file or directory");
        assert_eq!(status.sync_age_s, Some(5));
    }
}
