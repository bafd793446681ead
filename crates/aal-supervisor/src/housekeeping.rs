//! Housekeeping CSV emitter: one row per tick, rotated hourly at `:59:45`
//! and handed to the USB manager for storage. Header and field order
//! reproduce the original's `StoreHskp._data_file_hdr_row` exactly.

use aal_common::status::HwStatus;
use chrono::NaiveDateTime;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const HEADER_ROW: &str = "Year,Month,Day,Hour,Minute,Second,Modem_on,FG_on,SC_on,CASES_on,HF_On,Htr_On,Garmin_GPS_on,Overcurrent_status_on,T_batt_1,T_batt_2,T_batt_3,T_FG_electronics,T_FG_sensor,T_router,V_batt_1,V_batt_2,V_batt_3,I_input,P_input,lat,long,sys_time_error_secs,UTC_sync_age_secs,Uptime_secs,CPU_load_1_min,CPU_load_5_min,CPU_load_15_min\n";

/// Renders one CSV data row for `status` at `timestamp`, in the exact
/// column order of [`HEADER_ROW`].
pub fn data_row(timestamp: NaiveDateTime, status: &HwStatus) -> String {
    format!(
        "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{:.3},{:.3},{:.6},{:.6},{:.6},{},{},{:.2},{:.2},{:.2}\n",
        timestamp.format("%Y"),
        timestamp.format("%-m"),
        timestamp.format("%-d"),
        timestamp.format("%-H"),
        timestamp.format("%-M"),
        timestamp.format("%-S"),
        status.irid_pwr.is_on(),
        status.fg_pwr.is_on(),
        status.sc_pwr.is_on(),
        status.cases_pwr.is_on(),
        status.hf_pwr.is_on(),
        status.htr_pwr.is_on(),
        status.gps_pwr.is_on(),
        status.ovr_cur_status,
        status.batt_1_temp.unwrap_or(0.0),
        status.batt_2_temp.unwrap_or(0.0),
        status.batt_3_temp.unwrap_or(0.0),
        status.fg_elec_temp.unwrap_or(0.0),
        status.fg_sensor_temp.unwrap_or(0.0),
        status.router_temp.unwrap_or(0.0),
        status.batt_1_volt.unwrap_or(0.0),
        status.batt_2_volt.unwrap_or(0.0),
        status.batt_3_volt.unwrap_or(0.0),
        status.in_current.unwrap_or(0.0),
        status.in_power.unwrap_or(0.0),
        status.lat.unwrap_or(0.0),
        status.long.unwrap_or(0.0),
        status.sys_time_error_s.unwrap_or(0.0),
        status.sync_age_s.unwrap_or(0),
        status.uptime_s.unwrap_or(0),
        status.load_avg_1.unwrap_or(0.0),
        status.load_avg_5.unwrap_or(0.0),
        status.load_avg_15.unwrap_or(0.0),
    )
}

/// True at the rotation boundary: minute 59, second 45, matching
/// `(time_stamp.minute == 59) and (time_stamp.second == 45)`.
pub fn is_rotation_boundary(timestamp: NaiveDateTime) -> bool {
    use chrono::Timelike;
    timestamp.minute() == 59 && timestamp.second() == 45
}

/// Drives one open CSV file across ticks, rotating at the hourly boundary.
/// Rotation hands the closed file's path to the caller, which is
/// responsible for the USB-manager storage handoff (async, matching
/// `SaveFileThread`).
pub struct HousekeepingWriter {
    dir: PathBuf,
    file: Option<File>,
    current_path: Option<PathBuf>,
}

impl HousekeepingWriter {
    pub fn new(dir: PathBuf) -> std::io::Result<Self> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            file: None,
            current_path: None,
        })
    }

    /// Appends one row for `timestamp`/`status`; opens a new file (with
    /// header) first if none is open. Returns the path of a file that just
    /// rotated out, if this tick crossed the hourly boundary.
    pub fn tick(&mut self, timestamp: NaiveDateTime, status: &HwStatus) -> std::io::Result<Option<PathBuf>> {
        if self.file.is_none() {
            let path = self.dir.join(format!("hskp_{}.dat.csv", timestamp.format("%Y%m%d%H%M%S")));
            let mut file = File::create(&path)?;
            file.write_all(HEADER_ROW.as_bytes())?;
            self.file = Some(file);
            self.current_path = Some(path);
        }

        if let Some(file) = self.file.as_mut() {
            file.write_all(data_row(timestamp, status).as_bytes())?;
        }

        if is_rotation_boundary(timestamp) {
            self.file = None;
            return Ok(self.current_path.take());
        }
        Ok(None)
    }
}

pub fn open_for_append(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 7, 31)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn data_row_has_the_right_column_count() {
        let row = data_row(dt(1, 2, 3), &HwStatus::default());
        assert_eq!(row.trim_end().split(',').count(), HEADER_ROW.trim_end().split(',').count());
    }

    #[test]
    fn rotation_boundary_is_exactly_fifty_nine_forty_five() {
        assert!(is_rotation_boundary(dt(3, 59, 45)));
        assert!(!is_rotation_boundary(dt(3, 59, 44)));
        assert!(!is_rotation_boundary(dt(3, 58, 45)));
    }

    #[test]
    fn writer_opens_writes_header_and_rotates_at_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = HousekeepingWriter::new(dir.path().to_path_buf()).unwrap();

        assert!(w.tick(dt(3, 0, 0), &HwStatus::default()).unwrap().is_none());
        let rotated = w.tick(dt(3, 59, 45), &HwStatus::default()).unwrap();
        assert!(rotated.is_some());

        let contents = std::fs::read_to_string(rotated.unwrap()).unwrap();
        assert!(contents.starts_with(HEADER_ROW));
        assert_eq!(contents.lines().count(), 3); // header + two rows
    }
}
