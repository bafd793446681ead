//! Shared types for the AAL-PIP fleet.
//!
//! This crate contains:
//! - **Status** — the hardware status snapshot shared by every process
//! - **Config** — per-process port/path/timeout defaults, loadable from TOML
//! - **Schedule** — CASES/HF schedule entries and the built-in default tables
//! - **Error** — the typed error kinds used across the RPC and tunnel layers
//! - **Logging** — the tracing-subscriber bootstrap shared by every binary

pub mod config;
pub mod error;
pub mod logging;
pub mod schedule;
pub mod status;

pub use error::AalError;
pub use status::HwStatus;
