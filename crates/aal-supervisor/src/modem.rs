//! Modem power controller: keeps the Iridium modem on as long as data has
//! moved across the tunnel recently, unless overridden by an `irid`
//! command forcing it on or off regardless of traffic.

use crate::config::ModemConfig;

pub struct ModemController {
    config: ModemConfig,
    manual_override: Option<bool>,
}

impl ModemController {
    pub fn new(config: ModemConfig) -> Self {
        Self {
            config,
            manual_override: None,
        }
    }

    /// Forces the power decision to `on` regardless of transfer recency,
    /// until cleared with [`Self::clear_override`].
    pub fn set_override(&mut self, on: bool) {
        self.manual_override = Some(on);
    }

    pub fn clear_override(&mut self) {
        self.manual_override = None;
    }

    pub fn wants_power(&self, seconds_since_last_xfer: u64) -> bool {
        if let Some(on) = self.manual_override {
            return on;
        }
        seconds_since_last_xfer <= self.config.data_xfer_timeout_s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_on_within_timeout() {
        let m = ModemController::new(ModemConfig { data_xfer_timeout_s: 300 });
        assert!(m.wants_power(299));
    }

    #[test]
    fn powers_off_past_timeout() {
        let m = ModemController::new(ModemConfig { data_xfer_timeout_s: 300 });
        assert!(!m.wants_power(301));
    }

    #[test]
    fn manual_override_forces_on_past_timeout() {
        let mut m = ModemController::new(ModemConfig { data_xfer_timeout_s: 300 });
        m.set_override(true);
        assert!(m.wants_power(99999));
    }

    #[test]
    fn manual_override_forces_off_within_timeout() {
        let mut m = ModemController::new(ModemConfig { data_xfer_timeout_s: 300 });
        m.set_override(false);
        assert!(!m.wants_power(0));
    }

    #[test]
    fn clearing_override_restores_automatic_behavior() {
        let mut m = ModemController::new(ModemConfig { data_xfer_timeout_s: 300 });
        m.set_override(false);
        m.clear_override();
        assert!(m.wants_power(0));
    }
}
