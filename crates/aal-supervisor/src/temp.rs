//! Heater bang-bang controller, keyed off the router board temperature.

use crate::config::TempConfig;

pub struct TempController {
    config: TempConfig,
    heater_on: bool,
}

impl TempController {
    pub fn new(config: TempConfig) -> Self {
        Self {
            config,
            heater_on: false,
        }
    }

    pub fn set_setpoint(&mut self, setpoint_c: f64) {
        self.config.setpoint_c = setpoint_c;
    }

    /// Updates and returns whether the heater should be on, given the
    /// router board temperature. Unknown temperature leaves the heater in
    /// its current state.
    pub fn tick(&mut self, router_temp_c: Option<f64>) -> bool {
        if let Some(t) = router_temp_c {
            if self.heater_on {
                if t > self.config.setpoint_c + self.config.hysteresis_c {
                    self.heater_on = false;
                }
            } else if t < self.config.setpoint_c - self.config.hysteresis_c {
                self.heater_on = true;
            }
        }
        self.heater_on
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> TempConfig {
        TempConfig {
            setpoint_c: -25.0,
            hysteresis_c: 0.25,
        }
    }

    #[test]
    fn heater_turns_on_below_setpoint_minus_hysteresis() {
        let mut t = TempController::new(cfg());
        assert!(!t.tick(Some(-25.0)));
        assert!(t.tick(Some(-25.5)));
    }

    #[test]
    fn heater_turns_off_above_setpoint_plus_hysteresis() {
        let mut t = TempController::new(cfg());
        t.tick(Some(-30.0));
        assert!(t.tick(Some(-25.0)));
        assert!(!t.tick(Some(-24.5)));
    }

    #[test]
    fn unknown_temperature_holds_current_state() {
        let mut t = TempController::new(cfg());
        t.tick(Some(-30.0));
        assert!(t.tick(None));
    }

    #[test]
    fn set_setpoint_changes_the_switch_point() {
        let mut t = TempController::new(cfg());
        t.set_setpoint(0.0);
        assert!(!t.tick(Some(-0.1)));
        assert!(t.tick(Some(-0.5)));
    }
}
