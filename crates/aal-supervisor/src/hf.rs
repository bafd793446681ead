//! HF power controller — a structural mirror of [`crate::cases`] minus the
//! data-limit dimension, plus the tone-mark frequency calculation, per the
//! resolved Open Question (no `ControlHFPower.py` equivalent shipped in the
//! original).

use crate::config::HfConfig;
use aal_common::schedule::{active_hf_entry, hf_schedule};
use chrono::NaiveTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HfState {
    Armed,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HfAction {
    None,
    PowerOn,
    Halt,
    PowerOff,
}

pub struct HfController {
    config: HfConfig,
    state: HfState,
    master_enable: bool,
    power_down_pending: bool,
}

impl HfController {
    pub fn new(config: HfConfig) -> Self {
        Self {
            config,
            state: HfState::Armed,
            master_enable: true,
            power_down_pending: false,
        }
    }

    pub fn state(&self) -> HfState {
        self.state
    }

    pub fn set_master_enable(&mut self, enable: bool) {
        self.master_enable = enable;
    }

    pub fn tick(&mut self, router_temp: Option<f64>, now: NaiveTime) -> HfAction {
        if self.power_down_pending {
            self.power_down_pending = false;
            return HfAction::PowerOff;
        }
        if !self.master_enable {
            return match self.state {
                HfState::Running => {
                    self.state = HfState::Armed;
                    self.power_down_pending = true;
                    HfAction::Halt
                }
                HfState::Armed => HfAction::None,
            };
        }

        let in_window = active_hf_entry(&hf_schedule(), now).is_some();
        let want_running = match self.state {
            HfState::Armed => in_window && router_temp.map(|t| t <= self.config.power_on_temp_c).unwrap_or(false),
            HfState::Running => in_window && router_temp.map(|t| t < self.config.power_off_temp_c).unwrap_or(true),
        };

        match (self.state, want_running) {
            (HfState::Armed, true) => {
                self.state = HfState::Running;
                HfAction::PowerOn
            }
            (HfState::Running, false) => {
                self.state = HfState::Armed;
                self.power_down_pending = true;
                HfAction::Halt
            }
            _ => HfAction::None,
        }
    }

    /// Tone-mark frequency, a quadratic in fluxgate electronics temperature.
    pub fn tone_mark_hz(&self, fg_elec_temp: f64) -> f64 {
        let (c2, c1, c0) = self.config.tone_coeffs;
        c2 * fg_elec_temp * fg_elec_temp + c1 * fg_elec_temp + c0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn armed_powers_on_inside_its_ten_minute_window() {
        let mut c = HfController::new(HfConfig::default());
        assert_eq!(c.tick(Some(40.0), t(0, 35)), HfAction::PowerOn);
    }

    #[test]
    fn armed_stays_armed_outside_any_window() {
        let mut c = HfController::new(HfConfig::default());
        assert_eq!(c.tick(Some(40.0), t(0, 50)), HfAction::None);
    }

    #[test]
    fn master_disable_halts_a_running_unit() {
        let mut c = HfController::new(HfConfig::default());
        c.tick(Some(40.0), t(0, 35));
        c.set_master_enable(false);
        assert_eq!(c.tick(Some(40.0), t(0, 36)), HfAction::Halt);
        assert_eq!(c.tick(Some(40.0), t(0, 37)), HfAction::PowerOff);
    }

    #[test]
    fn tone_mark_is_a_quadratic_in_temperature() {
        let c = HfController::new(HfConfig {
            tone_coeffs: (1.0, 2.0, 3.0),
            ..HfConfig::default()
        });
        assert_eq!(c.tone_mark_hz(2.0), 1.0 * 4.0 + 2.0 * 2.0 + 3.0);
    }
}
