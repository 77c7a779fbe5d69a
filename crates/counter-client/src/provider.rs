//! Wallet / chain collaborator
//!
//! Signing, broadcast and confirmation are opaque to the client: it hands
//! calldata to the endpoint and observes the receipt. [`JsonRpcProvider`]
//! speaks Ethereum JSON-RPC to a wallet-backed node, where
//! `eth_sendTransaction` is signed by the endpoint itself.

use alloy_primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::error::ProviderError;

/// Outcome recorded in a mined transaction's receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    /// Status `0x1`
    Success,
    /// Status `0x0`
    Reverted,
}

/// Read-query and write-submission primitives used by the channels
#[async_trait]
pub trait ChainProvider: std::fmt::Debug + Send + Sync + 'static {
    /// Execute a read-only call and return the raw return data
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ProviderError>;

    /// Submit a state-changing call; returns the transaction id once broadcast
    async fn send_transaction(&self, to: Address, data: Bytes) -> Result<B256, ProviderError>;

    /// Receipt status of `tx`, `None` while it is not yet mined
    async fn receipt_status(&self, tx: B256) -> Result<Option<ReceiptStatus>, ProviderError>;

    /// Native coin balance of `owner`
    async fn balance(&self, owner: Address) -> Result<U256, ProviderError>;
}

/// JSON-RPC provider over HTTP
#[derive(Debug)]
pub struct JsonRpcProvider {
    rpc_url: String,
    account: Option<Address>,
    http_client: reqwest::Client,
    next_id: AtomicU64,
}

impl JsonRpcProvider {
    /// Create a provider for `rpc_url`; writes are sent from `account`
    pub fn new(rpc_url: impl Into<String>, account: Option<Address>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            account,
            http_client: reqwest::Client::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Connected account, if any
    pub const fn account(&self) -> Option<Address> {
        self.account
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id
        });

        debug!(target: "counter::rpc", method, id, "Sending JSON-RPC request");

        let response = self
            .http_client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await?
            .json::<Value>()
            .await?;

        if let Some(error) = response.get("error") {
            return Err(rpc_error(error));
        }

        response
            .get("result")
            .cloned()
            .ok_or_else(|| ProviderError::InvalidResponse(format!("no result in {method} response")))
    }
}

#[async_trait]
impl ChainProvider for JsonRpcProvider {
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ProviderError> {
        let result = self
            .rpc_call(
                "eth_call",
                json!([{ "to": to, "data": format!("0x{}", hex::encode(&data)) }, "latest"]),
            )
            .await?;
        parse_hex_bytes(&result)
    }

    async fn send_transaction(&self, to: Address, data: Bytes) -> Result<B256, ProviderError> {
        let from = self.account.ok_or(ProviderError::NoAccount)?;
        let tx_request = json!({
            "from": from,
            "to": to,
            "data": format!("0x{}", hex::encode(&data)),
        });

        let result = self.rpc_call("eth_sendTransaction", json!([tx_request])).await?;
        let tx_hash = result
            .as_str()
            .ok_or_else(|| ProviderError::InvalidResponse("no tx hash in response".to_string()))?;
        tx_hash
            .parse::<B256>()
            .map_err(|e| ProviderError::InvalidResponse(format!("bad tx hash `{tx_hash}`: {e}")))
    }

    async fn receipt_status(&self, tx: B256) -> Result<Option<ReceiptStatus>, ProviderError> {
        let receipt = self.rpc_call("eth_getTransactionReceipt", json!([tx])).await?;
        parse_receipt_status(&receipt)
    }

    async fn balance(&self, owner: Address) -> Result<U256, ProviderError> {
        let result = self.rpc_call("eth_getBalance", json!([owner, "latest"])).await?;
        parse_quantity(&result)
    }
}

/// Convert a JSON-RPC error object, keeping the provider message verbatim
fn rpc_error(error: &Value) -> ProviderError {
    ProviderError::Rpc {
        code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
        message: error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
    }
}

fn parse_hex_bytes(value: &Value) -> Result<Bytes, ProviderError> {
    let hex_str = value
        .as_str()
        .ok_or_else(|| ProviderError::InvalidResponse(format!("expected hex string, got {value}")))?;
    hex::decode(hex_str.trim_start_matches("0x"))
        .map(Bytes::from)
        .map_err(|e| ProviderError::InvalidResponse(format!("bad hex data: {e}")))
}

fn parse_quantity(value: &Value) -> Result<U256, ProviderError> {
    let hex_str = value
        .as_str()
        .ok_or_else(|| ProviderError::InvalidResponse(format!("expected quantity, got {value}")))?;
    U256::from_str_radix(hex_str.trim_start_matches("0x"), 16)
        .map_err(|e| ProviderError::InvalidResponse(format!("bad quantity `{hex_str}`: {e}")))
}

fn parse_receipt_status(receipt: &Value) -> Result<Option<ReceiptStatus>, ProviderError> {
    if receipt.is_null() {
        return Ok(None);
    }
    match receipt.get("status").and_then(Value::as_str) {
        Some("0x1") => Ok(Some(ReceiptStatus::Success)),
        Some("0x0") => Ok(Some(ReceiptStatus::Reverted)),
        other => Err(ProviderError::InvalidResponse(format!("unexpected receipt status {other:?}"))),
    }
}
