//! JSON-RPC 2.0 envelope for the stdio transport.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uplift_core::EngineError;

/// Outgoing request line.
#[derive(Debug, Serialize)]
pub(crate) struct RpcRequest<'a, P: Serialize> {
    jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: P,
}

impl<'a, P: Serialize> RpcRequest<'a, P> {
    pub fn new(id: u64, method: &'a str, params: P) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// Incoming response line; carries either a result or an error.
///
/// The result is kept as a raw value until [`into_result`] so that a JSON
/// `null` result (how the engine says "no apply in flight") survives into an
/// `Option` payload instead of being swallowed by serde's own option
/// handling.
///
/// [`into_result`]: RpcResponse::into_result
#[derive(Debug, Deserialize)]
pub(crate) struct RpcResponse {
    #[allow(dead_code)]
    pub id: u64,
    #[serde(default)]
    pub result: serde_json::Value,
    #[serde(default)]
    pub error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcErrorBody {
    pub code: i64,
    pub message: String,
}

impl RpcResponse {
    /// Collapse the result/error pair into a `Result`.
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T, EngineError> {
        if let Some(error) = self.error {
            return Err(EngineError::Engine(format!(
                "{} (code {})",
                error.message, error.code
            )));
        }
        serde_json::from_value(self.result)
            .map_err(|e| EngineError::Protocol(format!("malformed result payload: {e}")))
    }
}
