//! CASES power controller: armed/running thermostat gated by a daily
//! schedule, with a deferred power-off matching `_turn_power_on_or_off`/
//! `run()` in the original.

use crate::config::CasesConfig;
use aal_common::schedule::{active_cases_entry, cases_normal_schedule, cases_storm_schedule, CASES_ACTIVE_MONTHS};
use chrono::NaiveTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasesState {
    Armed,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasesMode {
    Normal,
    Storm,
    /// Master-enable only: no scheduled windows, used for firmware updates.
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasesAction {
    None,
    PowerOn,
    /// Send `halt` to `cases_mgr`; the actual power-off is deferred one tick.
    Halt,
    PowerOff,
}

pub struct CasesController {
    config: CasesConfig,
    state: CasesState,
    mode: CasesMode,
    master_enable: bool,
    power_down_pending: bool,
}

impl CasesController {
    pub fn new(config: CasesConfig) -> Self {
        Self {
            config,
            state: CasesState::Armed,
            mode: CasesMode::Normal,
            master_enable: true,
            power_down_pending: false,
        }
    }

    pub fn state(&self) -> CasesState {
        self.state
    }

    pub fn mode(&self) -> CasesMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: CasesMode) {
        self.mode = mode;
    }

    pub fn set_master_enable(&mut self, enable: bool) {
        self.master_enable = enable;
    }

    /// Decides this tick's action given the router board temperature
    /// and current local time/month.
    pub fn tick(&mut self, router_temp: Option<f64>, now: NaiveTime, month: u32) -> CasesAction {
        if self.power_down_pending {
            self.power_down_pending = false;
            return CasesAction::PowerOff;
        }

        if !self.master_enable {
            return match self.state {
                CasesState::Running => {
                    self.state = CasesState::Armed;
                    self.power_down_pending = true;
                    CasesAction::Halt
                }
                CasesState::Armed => CasesAction::None,
            };
        }

        // Update mode drops the scheduled-window requirement entirely —
        // the thermostat alone gates power — matching the original's
        // `cases_should_be_on` omitting `scheduler_votes_yes` in this mode.
        let schedule_says_yes = match self.mode {
            CasesMode::Update => true,
            CasesMode::Normal => {
                CASES_ACTIVE_MONTHS.contains(&month) && active_cases_entry(&cases_normal_schedule(), now).is_some()
            }
            CasesMode::Storm => {
                CASES_ACTIVE_MONTHS.contains(&month) && active_cases_entry(&cases_storm_schedule(), now).is_some()
            }
        };

        let want_running = match self.state {
            CasesState::Armed => {
                schedule_says_yes && router_temp.map(|t| t <= self.config.power_on_temp_c).unwrap_or(false)
            }
            CasesState::Running => {
                schedule_says_yes && router_temp.map(|t| t < self.config.power_off_temp_c).unwrap_or(true)
            }
        };

        match (self.state, want_running) {
            (CasesState::Armed, true) => {
                self.state = CasesState::Running;
                CasesAction::PowerOn
            }
            (CasesState::Running, false) => {
                self.state = CasesState::Armed;
                self.power_down_pending = true;
                CasesAction::Halt
            }
            _ => CasesAction::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn armed_powers_on_when_in_window_and_cool_enough() {
        let mut c = CasesController::new(CasesConfig::default());
        assert_eq!(c.tick(Some(40.0), t(1, 30), 1), CasesAction::PowerOn);
        assert_eq!(c.state(), CasesState::Running);
    }

    #[test]
    fn armed_stays_armed_outside_the_active_season() {
        let mut c = CasesController::new(CasesConfig::default());
        assert_eq!(c.tick(Some(40.0), t(1, 30), 7), CasesAction::None);
        assert_eq!(c.state(), CasesState::Armed);
    }

    #[test]
    fn running_halts_then_powers_off_one_tick_later() {
        let mut c = CasesController::new(CasesConfig::default());
        c.tick(Some(40.0), t(1, 30), 1);
        assert_eq!(c.tick(Some(51.0), t(1, 31), 1), CasesAction::Halt);
        assert_eq!(c.state(), CasesState::Armed);
        assert_eq!(c.tick(Some(10.0), t(1, 32), 1), CasesAction::PowerOff);
    }

    #[test]
    fn running_halts_once_schedule_window_ends() {
        let mut c = CasesController::new(CasesConfig::default());
        c.tick(Some(40.0), t(1, 30), 1);
        assert_eq!(c.tick(Some(40.0), t(2, 30), 1), CasesAction::Halt);
    }

    #[test]
    fn update_mode_lets_the_thermostat_alone_power_cases_on() {
        let mut c = CasesController::new(CasesConfig::default());
        c.set_mode(CasesMode::Update);
        // Month 7 is outside the normal/storm active season, but update
        // mode drops the schedule gate entirely.
        assert_eq!(c.tick(Some(10.0), t(1, 30), 7), CasesAction::PowerOn);
        assert_eq!(c.state(), CasesState::Running);
    }

    #[test]
    fn update_mode_halts_when_the_thermostat_says_off() {
        let mut c = CasesController::new(CasesConfig::default());
        c.set_mode(CasesMode::Update);
        c.tick(Some(10.0), t(1, 30), 7);
        assert_eq!(c.tick(Some(51.0), t(1, 31), 7), CasesAction::Halt);
    }
}
