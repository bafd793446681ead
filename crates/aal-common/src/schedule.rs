//! CASES and HF schedule tables.
//!
//! Defaults reproduce the original fleet's `cases_normal_schedule`,
//! `cases_storm_schedule`, and `hf_schedule` exactly.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CasesScheduleEntry {
    pub start: NaiveTime,
    pub stop: NaiveTime,
    pub data_limit_bytes: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HfScheduleEntry {
    pub start: NaiveTime,
    pub stop: NaiveTime,
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).expect("valid hour/minute")
}

/// Four one-hour daily windows, 4 MB cap each.
pub fn cases_normal_schedule() -> Vec<CasesScheduleEntry> {
    [1, 7, 13, 19]
        .iter()
        .map(|&h| CasesScheduleEntry {
            start: hm(h, 0),
            stop: hm((h + 1) % 24, 0),
            data_limit_bytes: 4_000_000,
        })
        .collect()
}

/// Twelve one-hour daily windows starting on odd hours, 100 MB cap each.
pub fn cases_storm_schedule() -> Vec<CasesScheduleEntry> {
    (0..12)
        .map(|i| {
            let h = 1 + i * 2;
            CasesScheduleEntry {
                start: hm(h, 0),
                stop: hm((h + 1) % 24, 0),
                data_limit_bytes: 100_000_000,
            }
        })
        .collect()
}

/// Months (1-12) during which CASES scheduling is active at all.
pub const CASES_ACTIVE_MONTHS: [u32; 5] = [12, 1, 2, 3, 4];

/// Twelve ten-minute windows every two hours, starting at :30 past even hours.
pub fn hf_schedule() -> Vec<HfScheduleEntry> {
    (0..12)
        .map(|i| {
            let h = i * 2;
            HfScheduleEntry {
                start: hm(h, 30),
                stop: hm(h, 40),
            }
        })
        .collect()
}

/// Returns the schedule entry whose window contains `now`, if any.
pub fn active_cases_entry(
    schedule: &[CasesScheduleEntry],
    now: NaiveTime,
) -> Option<CasesScheduleEntry> {
    schedule.iter().copied().find(|e| in_window(e.start, e.stop, now))
}

pub fn active_hf_entry(schedule: &[HfScheduleEntry], now: NaiveTime) -> Option<HfScheduleEntry> {
    schedule.iter().copied().find(|e| in_window(e.start, e.stop, now))
}

fn in_window(start: NaiveTime, stop: NaiveTime, now: NaiveTime) -> bool {
    if start <= stop {
        now >= start && now < stop
    } else {
        // window wraps midnight
        now >= start || now < stop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_schedule_has_four_windows_with_4mb_cap() {
        let s = cases_normal_schedule();
        assert_eq!(s.len(), 4);
        assert!(s.iter().all(|e| e.data_limit_bytes == 4_000_000));
    }

    #[test]
    fn storm_schedule_has_twelve_windows_with_100mb_cap() {
        let s = cases_storm_schedule();
        assert_eq!(s.len(), 12);
        assert!(s.iter().all(|e| e.data_limit_bytes == 100_000_000));
    }

    #[test]
    fn hf_schedule_has_twelve_ten_minute_windows() {
        let s = hf_schedule();
        assert_eq!(s.len(), 12);
        assert_eq!(s[0].start, hm(0, 30));
        assert_eq!(s[0].stop, hm(0, 40));
    }

    #[test]
    fn active_entry_found_inside_window_and_absent_outside() {
        let s = cases_normal_schedule();
        assert!(active_cases_entry(&s, hm(1, 30)).is_some());
        assert!(active_cases_entry(&s, hm(2, 30)).is_none());
    }

    #[test]
    fn window_wrapping_midnight_is_handled() {
        assert!(in_window(hm(23, 0), hm(1, 0), hm(23, 30)));
        assert!(in_window(hm(23, 0), hm(1, 0), hm(0, 30)));
        assert!(!in_window(hm(23, 0), hm(1, 0), hm(12, 0)));
    }
}
