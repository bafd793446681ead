//! RPC client: a single `Mutex` serializes every call made to one remote
//! process, since the original fleet never allowed concurrent calls to the
//! same XMLRPC server proxy either. On a transport failure the client drops
//! its connection and rebuilds it once before returning `None`/default to
//! the caller — callers are expected to treat that as "value currently
//! unknown", not as a crash.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Mutex;
use std::time::Duration;

pub struct RpcClient {
    base_url: String,
    timeout: Duration,
    inner: Mutex<Option<reqwest::blocking::Client>>,
}

impl RpcClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
            inner: Mutex::new(None),
        }
    }

    fn build_client(&self) -> reqwest::blocking::Client {
        reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .expect("reqwest client configuration is valid")
    }

    /// Calls `method` with `req` as the JSON body. Serializes calls to this
    /// client through an internal lock, retries once after rebuilding the
    /// underlying connection on transport failure, and returns `None` if
    /// the second attempt also fails.
    pub fn call<Req, Resp>(&self, method: &str, req: &Req) -> Option<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let mut guard = self.inner.lock().expect("rpc client lock poisoned");
        let url = format!("{}/rpc/{}", self.base_url, method);

        for attempt in 0..2 {
            if guard.is_none() {
                *guard = Some(self.build_client());
            }
            let client = guard.as_ref().expect("just initialized");

            match client.post(&url).json(req).send() {
                Ok(resp) if resp.status().is_success() => match resp.json::<Resp>() {
                    Ok(value) => return Some(value),
                    Err(e) => {
                        tracing::warn!(method, error = %e, "rpc response decode failed");
                        return None;
                    }
                },
                Ok(resp) => {
                    tracing::warn!(method, status = %resp.status(), "rpc call returned error status");
                    *guard = None;
                }
                Err(e) => {
                    tracing::warn!(method, attempt, error = %e, "rpc transport error");
                    *guard = None;
                }
            }
        }
        None
    }

    /// Like [`call`](Self::call) but for methods that take no request body.
    pub fn call_unit<Resp>(&self, method: &str) -> Option<Resp>
    where
        Resp: DeserializeOwned,
    {
        self.call(method, &serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn call_against_unreachable_server_returns_none() {
        // bind then drop so the port is refused, not just unused
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = RpcClient::new(format!("http://{addr}"), Duration::from_millis(200));
        let result: Option<serde_json::Value> = client.call_unit("get_full_status");
        assert!(result.is_none());
    }
}
