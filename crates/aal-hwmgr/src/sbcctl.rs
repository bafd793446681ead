//! Parses the fixed-line-number output of `sbcctl status` into an
//! [`HwStatus`] snapshot, and builds the `sbcctl` argument strings for power
//! switching.
//!
//! The line numbers below are load-bearing: they match the exact layout of
//! the original `sbcctl status` report. A firmware/tool upgrade that
//! reshuffles that report's lines would need this table updated to match.

use aal_common::status::{
    steinhart_hart_temp_c, HwStatus, PowerState, BATTERY_THERMISTOR_K, ROUTER_THERMISTOR_K,
};

fn field_str(line: &str, field: usize) -> Option<&str> {
    line.split_whitespace().nth(field)
}

fn field_int(line: &str, field: usize) -> Option<i64> {
    field_str(line, field)?.parse().ok()
}

fn field_float(line: &str, field: usize) -> Option<f64> {
    field_str(line, field)?.parse().ok()
}

fn power(v: Option<i64>) -> PowerState {
    match v {
        Some(0) => PowerState::Off,
        Some(_) => PowerState::On,
        None => PowerState::Unknown,
    }
}

/// Corrects a raw ADC voltage for this board's offset and gain.
pub fn corrected_adc_v(adc_v: f64, offset: f64, gain: f64) -> f64 {
    ((adc_v - offset).max(0.0)) / gain
}

/// Parses the full `sbcctl status` report, returning a status snapshot
/// with every field this implementation tracks populated. Lines that are
/// missing or malformed leave the corresponding field at its default
/// (`Unknown`/`None`), matching the original's tolerant behavior — a
/// truncated report degrades status, it never panics the process.
pub fn parse_sbcctl_status(output: &str, adc_offset: f64, adc_gain: f64) -> HwStatus {
    let lines: Vec<&str> = output.lines().collect();
    let get = |i: usize| lines.get(i).copied().unwrap_or("");

    let mut status = HwStatus::default();

    status.irid_pwr = power(field_int(get(6), 2));
    status.fg_pwr = power(field_int(get(7), 2));
    status.sc_pwr = power(field_int(get(8), 2));
    status.cases_pwr = power(field_int(get(9), 2));
    status.hf_pwr = power(field_int(get(10), 2));
    status.htr_pwr = power(field_int(get(11), 2));
    status.gps_pwr = power(field_int(get(12), 2));
    status.ethernet_pwr = power(field_int(get(48), 1));
    status.usb_pwr = power(field_int(get(49), 1));
    status.pc104_pwr = power(field_int(get(50), 1));
    status.rs232_pwr = power(field_int(get(51), 1));

    status.cpu_temp = field_float(get(31), 1);

    status.router_temp = field_float(get(45), 1)
        .map(|raw_v| steinhart_hart_temp_c(raw_v, adc_offset, adc_gain, ROUTER_THERMISTOR_K));

    status.batt_1_temp = field_float(get(39), 1)
        .map(|raw_v| steinhart_hart_temp_c(raw_v, adc_offset, adc_gain, BATTERY_THERMISTOR_K));
    status.batt_2_temp = field_float(get(40), 1)
        .map(|raw_v| steinhart_hart_temp_c(raw_v, adc_offset, adc_gain, BATTERY_THERMISTOR_K));
    status.batt_3_temp = field_float(get(41), 1)
        .map(|raw_v| steinhart_hart_temp_c(raw_v, adc_offset, adc_gain, BATTERY_THERMISTOR_K));

    status.batt_1_volt = field_float(get(42), 1).map(|raw| corrected_adc_v(raw, adc_offset, adc_gain) * 4.3887);
    status.batt_2_volt = field_float(get(43), 1).map(|raw| corrected_adc_v(raw, adc_offset, adc_gain) * 4.3887);
    status.batt_3_volt = field_float(get(44), 1).map(|raw| corrected_adc_v(raw, adc_offset, adc_gain) * 4.3887);

    status.in_current = field_float(get(46), 1).map(|raw| corrected_adc_v(raw, adc_offset, adc_gain) * 1.6997);

    if let (Some(i), Some(v1), Some(v2), Some(v3)) = (
        status.in_current,
        status.batt_1_volt,
        status.batt_2_volt,
        status.batt_3_volt,
    ) {
        let v = v1.max(v2).max(v3);
        status.in_power = Some(i * v);
    }

    status.ovr_cur_status = field_int(get(20), 2) != Some(0);
    status.ovr_cur_reset = field_int(get(19), 2) != Some(0);
    status.jumper_2 = field_int(get(25), 1) != Some(0);
    status.jumper_3 = field_int(get(26), 1) != Some(0);
    status.jumper_4 = field_int(get(27), 1) != Some(0);
    status.jumper_5 = field_int(get(28), 1) != Some(0);
    status.jumper_6 = field_int(get(29), 1) != Some(0);

    status
}

/// Converts a Garmin-format packed lat/long (`DDDMM.MMMM`) into decimal
/// degrees.
pub fn garmin_to_degs(garm: f64) -> f64 {
    let sign = if garm < 0.0 { -1.0 } else { 1.0 };
    let garm = garm.abs();
    let degs = (garm / 100.0).floor();
    let minutes = garm - degs * 100.0;
    (degs + minutes / 60.0) * sign
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> String {
        let mut lines = vec![String::new(); 52];
        lines[6] = "irid 2 1".to_string();
        lines[7] = "fg 2 0".to_string();
        lines[8] = "sc 2 1".to_string();
        lines[9] = "cases 2 0".to_string();
        lines[10] = "hf 2 1".to_string();
        lines[11] = "htr 2 0".to_string();
        lines[12] = "gps 2 1".to_string();
        lines[19] = "x x 0".to_string();
        lines[20] = "x x 1".to_string();
        lines[25] = "x 0".to_string();
        lines[26] = "x 1".to_string();
        lines[27] = "x 0".to_string();
        lines[28] = "x 1".to_string();
        lines[29] = "x 0".to_string();
        lines[31] = "cpu 25.5".to_string();
        lines[39] = "batt1 2.0".to_string();
        lines[40] = "batt2 2.1".to_string();
        lines[41] = "batt3 2.2".to_string();
        lines[42] = "v1 2.7".to_string();
        lines[43] = "v2 2.7".to_string();
        lines[44] = "v3 2.7".to_string();
        lines[45] = "router 2.0".to_string();
        lines[46] = "in 0.5".to_string();
        lines[48] = "eth 1".to_string();
        lines[49] = "usb 0".to_string();
        lines[50] = "pc104 1".to_string();
        lines[51] = "rs232 0".to_string();
        lines.join("\n")
    }

    #[test]
    fn parses_power_switches() {
        let status = parse_sbcctl_status(&sample_report(), 0.0, 1.0);
        assert_eq!(status.irid_pwr, PowerState::On);
        assert_eq!(status.fg_pwr, PowerState::Off);
        assert_eq!(status.ethernet_pwr, PowerState::On);
        assert_eq!(status.usb_pwr, PowerState::Off);
    }

    #[test]
    fn parses_temps_and_voltages() {
        let status = parse_sbcctl_status(&sample_report(), 0.0, 1.0);
        assert!(status.cpu_temp.unwrap() > 25.0);
        assert!(status.router_temp.unwrap().is_finite());
        assert!(status.batt_1_volt.unwrap() > 0.0);
        assert!(status.in_power.unwrap() > 0.0);
    }

    #[test]
    fn parses_overcurrent_and_jumpers() {
        let status = parse_sbcctl_status(&sample_report(), 0.0, 1.0);
        assert!(status.ovr_cur_status);
        assert!(!status.ovr_cur_reset);
        assert!(!status.jumper_2);
        assert!(status.jumper_3);
    }

    #[test]
    fn truncated_report_leaves_fields_unknown_instead_of_panicking() {
        let status = parse_sbcctl_status("too short", 0.0, 1.0);
        assert_eq!(status.irid_pwr, PowerState::Unknown);
        assert!(status.cpu_temp.is_none());
    }

    #[test]
    fn garmin_conversion_matches_known_fixture() {
        // 4217.6544 -> 42 deg 17.6544 min north
        let degs = garmin_to_degs(4217.6544);
        assert!((degs - 42.294_24).abs() < 1e-3);
    }

    #[test]
    fn garmin_conversion_handles_negative_longitude() {
        let degs = garmin_to_degs(-8342.6943);
        assert!(degs < 0.0);
        assert!((degs + 83.711_572_5).abs() < 1e-2);
    }
}
