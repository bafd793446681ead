//! The hardware status snapshot, refreshed by `aal-hwmgr` and consumed by
//! the supervisor's controllers and the housekeeping emitter.
//!
//! Kept as a typed struct rather than the original's dynamic dict so every
//! controller gets compile-time checked field access.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PowerState {
    Unknown,
    Off,
    On,
}

impl PowerState {
    pub fn is_on(&self) -> bool {
        matches!(self, PowerState::On)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HwStatus {
    pub irid_pwr: PowerState,
    pub fg_pwr: PowerState,
    pub sc_pwr: PowerState,
    pub cases_pwr: PowerState,
    pub hf_pwr: PowerState,
    pub htr_pwr: PowerState,
    pub gps_pwr: PowerState,
    pub ethernet_pwr: PowerState,
    pub usb_pwr: PowerState,
    pub pc104_pwr: PowerState,
    pub rs232_pwr: PowerState,

    pub cpu_temp: Option<f64>,
    pub router_temp: Option<f64>,
    pub batt_1_temp: Option<f64>,
    pub batt_2_temp: Option<f64>,
    pub batt_3_temp: Option<f64>,
    pub fg_elec_temp: Option<f64>,
    pub fg_sensor_temp: Option<f64>,

    pub batt_1_volt: Option<f64>,
    pub batt_2_volt: Option<f64>,
    pub batt_3_volt: Option<f64>,
    pub in_current: Option<f64>,
    pub in_power: Option<f64>,

    pub ovr_cur_status: bool,
    pub ovr_cur_reset: bool,

    pub lat: Option<f64>,
    pub long: Option<f64>,
    pub sync_age_s: Option<u64>,
    pub sys_time_error_s: Option<f64>,

    pub uptime_s: Option<u64>,
    pub load_avg_1: Option<f64>,
    pub load_avg_5: Option<f64>,
    pub load_avg_15: Option<f64>,

    pub jumper_2: bool,
    pub jumper_3: bool,
    pub jumper_4: bool,
    pub jumper_5: bool,
    pub jumper_6: bool,
}

impl Default for HwStatus {
    fn default() -> Self {
        Self {
            irid_pwr: PowerState::Unknown,
            fg_pwr: PowerState::Unknown,
            sc_pwr: PowerState::Unknown,
            cases_pwr: PowerState::Unknown,
            hf_pwr: PowerState::Unknown,
            htr_pwr: PowerState::Unknown,
            gps_pwr: PowerState::Unknown,
            ethernet_pwr: PowerState::Unknown,
            usb_pwr: PowerState::Unknown,
            pc104_pwr: PowerState::Unknown,
            rs232_pwr: PowerState::Unknown,
            cpu_temp: None,
            router_temp: None,
            batt_1_temp: None,
            batt_2_temp: None,
            batt_3_temp: None,
            fg_elec_temp: None,
            fg_sensor_temp: None,
            batt_1_volt: None,
            batt_2_volt: None,
            batt_3_volt: None,
            in_current: None,
            in_power: None,
            ovr_cur_status: false,
            ovr_cur_reset: false,
            lat: None,
            long: None,
            sync_age_s: None,
            sys_time_error_s: None,
            uptime_s: None,
            load_avg_1: None,
            load_avg_5: None,
            load_avg_15: None,
            jumper_2: false,
            jumper_3: false,
            jumper_4: false,
            jumper_5: false,
            jumper_6: false,
        }
    }
}

/// Steinhart-Hart coefficients, identical across router and battery
/// thermistors; only the bridge constant `k` differs.
const SH_A: f64 = 1.404_08e-3;
const SH_B: f64 = 2.368_58e-4;
const SH_C: f64 = 7.105_70e-8;
const SH_D: f64 = 9.561_78e-8;

pub const ROUTER_THERMISTOR_K: f64 = 53_200.0;
pub const BATTERY_THERMISTOR_K: f64 = 549_000.0;

/// Converts a raw ADC voltage reading to a temperature in Celsius via the
/// Steinhart-Hart equation, following the original's `get_router_temp`/
/// `get_batt_temp` formula exactly.
pub fn steinhart_hart_temp_c(v_raw: f64, offset: f64, gain: f64, k: f64) -> f64 {
    // floor matches the original: a corrected voltage of exactly 0 would
    // send ln(R) to -infinity
    let v_corr = ((v_raw - offset) / gain).max(0.001);
    let r = k * v_corr / (5.0 - v_corr);
    let ln_r = r.ln();
    1.0 / (SH_A + SH_B * ln_r + SH_C * ln_r.powi(2) + SH_D * ln_r.powi(3)) - 273.15
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steinhart_hart_clamps_negative_corrected_voltage() {
        // v_raw below offset would otherwise drive v_corr negative and ln(R) to panic-worthy input
        let t = steinhart_hart_temp_c(0.0, 1.0, 1.0, ROUTER_THERMISTOR_K);
        assert!(t.is_finite());
    }

    #[test]
    fn steinhart_hart_room_temperature_is_plausible() {
        // a midpoint voltage should land in a plausible indoor range, not NaN/inf
        let t = steinhart_hart_temp_c(2.5, 0.0, 1.0, ROUTER_THERMISTOR_K);
        assert!(t > -60.0 && t < 80.0);
    }

    #[test]
    fn power_state_is_on() {
        assert!(PowerState::On.is_on());
        assert!(!PowerState::Off.is_on());
        assert!(!PowerState::Unknown.is_on());
    }
}
