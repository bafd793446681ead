//! The modem-server RPC contract: a single method, `get_iccid`, read by
//! `svr-proxy` when answering an `ICCID_REQ` tunnel packet.

use std::time::Duration;

use crate::RpcClient;

/// Thin typed wrapper over [`RpcClient`] exposing `modem_svr`'s RPC
/// surface, mirroring the original's `get_iccid` XMLRPC call.
pub struct ModemSvrClient {
    rpc: RpcClient,
}

impl ModemSvrClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            rpc: RpcClient::new(base_url, timeout),
        }
    }

    /// Empty string if the modem is offline or the call fails, matching
    /// the original's sentinel-on-failure contract.
    pub fn get_iccid(&self) -> String {
        self.rpc.call_unit::<String>("get_iccid").unwrap_or_default()
    }
}
