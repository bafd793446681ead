//! GPS power controller: bang-bang on GPS sync staleness.

use crate::config::GpsConfig;

pub struct GpsController {
    config: GpsConfig,
}

impl GpsController {
    pub fn new(config: GpsConfig) -> Self {
        Self { config }
    }

    /// True if the GPS receiver should be powered on: its sync has gone
    /// stale (or is unknown) and it needs a fresh fix.
    pub fn wants_power(&self, sync_age_s: Option<u64>) -> bool {
        match sync_age_s {
            Some(age) => age > self.config.max_sync_age_s,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn powers_on_when_sync_is_stale() {
        let g = GpsController::new(GpsConfig { max_sync_age_s: 3600 });
        assert!(g.wants_power(Some(3601)));
    }

    #[test]
    fn powers_off_when_sync_is_fresh() {
        let g = GpsController::new(GpsConfig { max_sync_age_s: 3600 });
        assert!(!g.wants_power(Some(10)));
    }

    #[test]
    fn powers_on_when_sync_age_unknown() {
        let g = GpsController::new(GpsConfig { max_sync_age_s: 3600 });
        assert!(g.wants_power(None));
    }
}
