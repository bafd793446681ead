//! Transfer-activity record: the timestamp of the last non-PING data seen
//! on the tunnel, consulted by the supervisor's modem controller to decide
//! whether the Iridium modem is still needed.

use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone)]
pub struct TransferActivity {
    last: Arc<Mutex<SystemTime>>,
}

impl TransferActivity {
    pub fn new() -> Self {
        Self {
            last: Arc::new(Mutex::new(UNIX_EPOCH)),
        }
    }

    pub fn mark_now(&self) {
        *self.last.lock().expect("transfer activity lock poisoned") = SystemTime::now();
    }

    pub fn last(&self) -> SystemTime {
        *self.last.lock().expect("transfer activity lock poisoned")
    }

    /// Seconds since the last recorded transfer, saturating at 0 if the
    /// clock somehow moved backwards.
    pub fn seconds_since_last(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.last())
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

impl Default for TransferActivity {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fresh_record_reports_a_huge_time_since_last() {
        let xfer = TransferActivity::new();
        assert!(xfer.seconds_since_last() > 60 * 60 * 24 * 365);
    }

    #[test]
    fn marking_now_resets_time_since_last_to_near_zero() {
        let xfer = TransferActivity::new();
        xfer.mark_now();
        assert!(xfer.seconds_since_last() < 2);
    }

    #[test]
    fn time_since_last_grows_after_marking() {
        let xfer = TransferActivity::new();
        xfer.mark_now();
        std::thread::sleep(Duration::from_millis(1100));
        assert!(xfer.seconds_since_last() >= 1);
    }
}
