//! The RPC server: an axum app exposing one `POST /rpc/<method>` route per
//! registered handler.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
type Handler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, String>> + Send + Sync>;

#[derive(Clone, Default)]
struct AppState {
    handlers: Arc<HashMap<String, Handler>>,
}

/// Builds an axum router exposing one RPC method per call to [`method`].
pub struct RpcServer {
    handlers: HashMap<String, Handler>,
}

impl RpcServer {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers a method. `f` receives the request's JSON body and returns
    /// the JSON response body, or an error message on failure.
    pub fn method<F, Fut>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, String>> + Send + 'static,
    {
        self.handlers
            .insert(name.to_string(), Arc::new(move |v| Box::pin(f(v))));
        self
    }

    pub fn into_router(self) -> Router {
        let state = AppState {
            handlers: Arc::new(self.handlers),
        };
        Router::new()
            .route("/rpc/{method}", post(dispatch))
            .with_state(state)
    }

    /// Binds and serves forever. Call from inside a `tokio` runtime.
    pub async fn serve(self, addr: std::net::SocketAddr) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(%addr, "rpc server listening");
        axum::serve(listener, self.into_router()).await
    }
}

impl Default for RpcServer {
    fn default() -> Self {
        Self::new()
    }
}

async fn dispatch(
    State(state): State<AppState>,
    Path(method): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let handler = state
        .handlers
        .get(&method)
        .ok_or((StatusCode::NOT_FOUND, format!("unknown method: {method}")))?
        .clone();
    match handler(body).await {
        Ok(v) => Ok(Json(v)),
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn dispatch_routes_to_registered_method() {
        let server = RpcServer::new().method("echo", |v| async move { Ok(v) });
        let router = server.into_router();

        let body = axum::body::Body::from(serde_json::to_vec(&json!({"x": 1})).unwrap());
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/rpc/echo")
            .header("content-type", "application/json")
            .body(body)
            .unwrap();

        use tower::ServiceExt;
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn dispatch_404s_on_unknown_method() {
        let router = RpcServer::new().into_router();
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/rpc/nope")
            .header("content-type", "application/json")
            .body(axum::body::Body::from("{}"))
            .unwrap();

        use tower::ServiceExt;
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
