//! The supervisor: a 15-second tick loop running seven sub-controllers in
//! fixed order, a housekeeping CSV emitter, and the comm watchdog's shared
//! FSM. Binaries: `super` (the supervisor) and `comm-watchdog` (the
//! external, coarser safety net).

pub mod cases;
pub mod comm;
pub mod config;
pub mod ethernet;
pub mod fgsc;
pub mod gps;
pub mod hf;
pub mod housekeeping;
pub mod modem;
pub mod reboot;
pub mod temp;
