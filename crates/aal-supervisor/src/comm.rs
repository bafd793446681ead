//! Comm monitor FSM: `init -> starting_up -> connected <-> disconnected`
//! over the tunnel's link-liveness flags, rebooting to the golden image if
//! any state overstays its threshold. Mirrors `MonitorRUDICSComm.py`.
//!
//! Time-in-state is counted in supervisor ticks rather than wall-clock time
//! so this is deterministic to test; the caller always passes the same
//! `tick_interval_s` it uses for its own loop.

use aal_tunnel::flags::CommState;

use crate::config::CommMonitorConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommAction {
    None,
    /// The in-process threshold has been exceeded; reboot to the golden
    /// image. One-shot: further ticks return `None` once latched.
    Reboot,
}

pub struct CommMonitor {
    config: CommMonitorConfig,
    state: CommState,
    ticks_in_state: u64,
    rebooting: bool,
}

impl CommMonitor {
    pub fn new(config: CommMonitorConfig) -> Self {
        Self {
            config,
            state: CommState::Init,
            ticks_in_state: 0,
            rebooting: false,
        }
    }

    pub fn state(&self) -> CommState {
        self.state
    }

    pub fn tick(&mut self, connected: bool, tick_interval_s: u64) -> CommAction {
        if self.rebooting {
            return CommAction::None;
        }

        let next = match self.state {
            CommState::Init => CommState::StartingUp,
            CommState::StartingUp => {
                if connected {
                    CommState::Connected
                } else {
                    CommState::StartingUp
                }
            }
            CommState::Connected => {
                if connected {
                    CommState::Connected
                } else {
                    CommState::Disconnected
                }
            }
            CommState::Disconnected => {
                if connected {
                    CommState::Connected
                } else {
                    CommState::Disconnected
                }
            }
        };

        if next != self.state {
            self.state = next;
            self.ticks_in_state = 0;
        } else {
            self.ticks_in_state += 1;
        }

        let elapsed_s = self.ticks_in_state * tick_interval_s;
        let limit = match self.state {
            CommState::Init | CommState::StartingUp => self.config.max_init_time_s,
            CommState::Connected => self.config.max_up_time_s,
            CommState::Disconnected => self.config.max_down_time_s,
        };

        if elapsed_s > limit {
            self.rebooting = true;
            return CommAction::Reboot;
        }
        CommAction::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_config() -> CommMonitorConfig {
        CommMonitorConfig {
            max_init_time_s: 30,
            max_up_time_s: 30,
            max_down_time_s: 30,
        }
    }

    #[test]
    fn starts_in_init_and_moves_to_starting_up_on_first_tick() {
        let mut m = CommMonitor::new(short_config());
        assert_eq!(m.state(), CommState::Init);
        m.tick(false, 10);
        assert_eq!(m.state(), CommState::StartingUp);
    }

    #[test]
    fn reaches_connected_once_the_link_is_up() {
        let mut m = CommMonitor::new(short_config());
        m.tick(false, 10);
        m.tick(true, 10);
        assert_eq!(m.state(), CommState::Connected);
    }

    #[test]
    fn drops_to_disconnected_once_the_link_goes_down() {
        let mut m = CommMonitor::new(short_config());
        m.tick(false, 10);
        m.tick(true, 10);
        m.tick(false, 10);
        assert_eq!(m.state(), CommState::Disconnected);
    }

    #[test]
    fn reboots_once_stuck_in_starting_up_past_the_init_threshold() {
        let mut m = CommMonitor::new(short_config());
        let mut rebooted = false;
        for _ in 0..6 {
            if m.tick(false, 10) == CommAction::Reboot {
                rebooted = true;
            }
        }
        assert!(rebooted);
    }

    #[test]
    fn reboot_is_one_shot() {
        let mut m = CommMonitor::new(short_config());
        for _ in 0..6 {
            m.tick(false, 10);
        }
        assert_eq!(m.tick(false, 10), CommAction::None);
    }
}
