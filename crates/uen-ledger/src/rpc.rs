//! Blocking Ethereum JSON-RPC over HTTP.

use crate::tx::SignedTransaction;
use crate::{Address, CancelFlag, LedgerError, TxHash, TxReceipt};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use url::Url;

/// Bounds for waiting on a transaction receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptWait {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ReceiptWait {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    transaction_hash: String,
    block_number: Option<String>,
    gas_used: Option<String>,
    status: Option<String>,
}

pub fn parse_quantity(s: &str) -> Result<u64, LedgerError> {
    let body = s
        .strip_prefix("0x")
        .ok_or_else(|| LedgerError::Decode(format!("quantity without 0x prefix: {s}")))?;
    if body.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(body, 16).map_err(|e| LedgerError::Decode(format!("quantity {s}: {e}")))
}

fn parse_data(s: &str) -> Result<Vec<u8>, LedgerError> {
    let body = s
        .strip_prefix("0x")
        .ok_or_else(|| LedgerError::Decode(format!("data without 0x prefix: {s}")))?;
    hex::decode(body).map_err(|e| LedgerError::Decode(format!("data: {e}")))
}

fn quantity(n: u128) -> String {
    format!("0x{n:x}")
}

/// Sleep for `total`, waking early if `cancel` is raised.
pub fn sleep_with_cancel(total: Duration, cancel: &CancelFlag) -> Result<(), LedgerError> {
    const SLICE: Duration = Duration::from_millis(100);
    let deadline = Instant::now() + total;
    loop {
        cancel.check()?;
        let now = Instant::now();
        if now >= deadline {
            return Ok(());
        }
        thread::sleep(SLICE.min(deadline - now));
    }
}

pub struct JsonRpcClient {
    client: Client,
    url: Url,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, LedgerError> {
        let url = Url::parse(url).map_err(|e| LedgerError::Transport(format!("bad rpc url {url}: {e}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Transport(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            url,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Raw `result` of one call; `null` when the node returns none.
    pub fn request_value(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        tracing::trace!(method, id, "rpc request");

        let resp = self.client.post(self.url.clone()).json(&body).send()?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(LedgerError::Http {
                status: status.as_u16(),
                body: text,
            });
        }
        let out: RpcResponse = resp
            .json()
            .map_err(|e| LedgerError::Decode(format!("{method}: {e}")))?;
        if let Some(err) = out.error {
            let message = match err.data {
                Some(Value::String(data)) => format!("{} ({data})", err.message),
                Some(Value::Null) | None => err.message,
                Some(other) => format!("{} ({other})", err.message),
            };
            return Err(LedgerError::Rpc {
                code: err.code,
                message,
            });
        }
        Ok(out.result)
    }

    pub fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, LedgerError> {
        let value = self.request_value(method, params)?;
        serde_json::from_value(value).map_err(|e| LedgerError::Decode(format!("{method}: {e}")))
    }

    pub fn chain_id(&self) -> Result<u64, LedgerError> {
        let raw: String = self.request("eth_chainId", json!([]))?;
        parse_quantity(&raw)
    }

    /// Nonce for the next transaction, counting ones still in the pool.
    pub fn get_transaction_count(&self, address: Address) -> Result<u64, LedgerError> {
        let raw: String = self.request(
            "eth_getTransactionCount",
            json!([address.to_string(), "pending"]),
        )?;
        parse_quantity(&raw)
    }

    pub fn call(&self, to: Address, data: &[u8]) -> Result<Vec<u8>, LedgerError> {
        let raw: String = self.request(
            "eth_call",
            json!([{ "to": to.to_string(), "data": format!("0x{}", hex::encode(data)) }, "latest"]),
        )?;
        parse_data(&raw)
    }

    pub fn estimate_gas(
        &self,
        from: Address,
        to: Address,
        data: &[u8],
        value: u128,
    ) -> Result<u64, LedgerError> {
        let raw: String = self.request(
            "eth_estimateGas",
            json!([{
                "from": from.to_string(),
                "to": to.to_string(),
                "data": format!("0x{}", hex::encode(data)),
                "value": quantity(value),
            }]),
        )?;
        parse_quantity(&raw)
    }

    pub fn send_raw_transaction(&self, tx: &SignedTransaction) -> Result<TxHash, LedgerError> {
        let raw: String = self.request("eth_sendRawTransaction", json!([tx.raw_hex()]))?;
        raw.parse()
    }

    /// `None` while the transaction is pending.
    pub fn get_transaction_receipt(&self, hash: TxHash) -> Result<Option<TxReceipt>, LedgerError> {
        let value = self.request_value("eth_getTransactionReceipt", json!([hash.to_string()]))?;
        if value.is_null() {
            return Ok(None);
        }
        let raw: RawReceipt = serde_json::from_value(value)
            .map_err(|e| LedgerError::Decode(format!("eth_getTransactionReceipt: {e}")))?;
        let Some(block) = raw.block_number else {
            return Ok(None);
        };
        Ok(Some(TxReceipt {
            tx_hash: raw.transaction_hash.parse()?,
            block_number: parse_quantity(&block)?,
            gas_used: raw.gas_used.as_deref().map(parse_quantity).transpose()?.unwrap_or(0),
            // Pre-Byzantium receipts carry no status; treat as success.
            success: raw.status.as_deref().map(parse_quantity).transpose()?.unwrap_or(1) == 1,
        }))
    }

    /// Poll until the receipt appears, `wait.timeout` elapses, or `cancel`
    /// is raised. Poll failures are logged and retried until the deadline.
    pub fn wait_for_receipt(
        &self,
        hash: TxHash,
        wait: &ReceiptWait,
        cancel: &CancelFlag,
    ) -> Result<TxReceipt, LedgerError> {
        let started = Instant::now();
        loop {
            cancel.check()?;
            match self.get_transaction_receipt(hash) {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => {}
                Err(err) => tracing::warn!(tx = %hash, error = %err, "receipt poll failed"),
            }
            let waited = started.elapsed();
            if waited >= wait.timeout {
                return Err(LedgerError::ReceiptTimeout {
                    tx_hash: hash,
                    waited,
                });
            }
            sleep_with_cancel(wait.poll_interval.min(wait.timeout - waited), cancel)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantities() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0x").unwrap(), 0);
        assert_eq!(parse_quantity("0x15f902").unwrap(), 1_440_002);
        assert!(parse_quantity("15").is_err());
        assert_eq!(quantity(0), "0x0");
        assert_eq!(quantity(255), "0xff");
    }

    #[test]
    fn rejects_bad_url() {
        assert!(JsonRpcClient::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn cancelled_sleep_returns_early() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let started = Instant::now();
        assert!(sleep_with_cancel(Duration::from_secs(5), &cancel).is_err());
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
