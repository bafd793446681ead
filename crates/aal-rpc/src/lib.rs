//! RPC layer shared by every AAL-PIP process.
//!
//! Server: one JSON route per registered method, `POST /rpc/<method>`.
//! Client: a lock-serialized, two-attempt-then-sentinel wrapper around a
//! blocking HTTP client, matching the original fleet's
//! `get_XMLRPC_server_proxy` / `set_power_state` / `get_hw_status` shape —
//! a transient transport failure drops and rebuilds the connection once
//! before giving up and returning `None` to the caller.

pub mod client;
pub mod hwmgr;
pub mod modemsvr;
pub mod server;

pub use client::RpcClient;
pub use hwmgr::HwMgrClient;
pub use modemsvr::ModemSvrClient;
pub use server::RpcServer;

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("remote returned an error: {0}")]
    Remote(String),
    #[error("unknown method: {0}")]
    UnknownMethod(String),
}
