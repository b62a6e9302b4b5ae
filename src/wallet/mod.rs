/*
 * Wallet RPC seam
 *
 * Everything the transaction flows need from a chain-signing wallet:
 * simulation, submission, receipt tracking, batch capability discovery and
 * EIP-5792 bundle submission. Implementations normalize their errors into
 * `JanusError::WalletError` strings; the flows pattern-match those strings,
 * nothing else.
 */

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Address, H256, U256};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::calls::Call;
use crate::models::{JanusError, Result};

#[derive(Debug, Clone)]
pub struct PreparedCall {
    pub call: Call,
    pub gas_estimate: U256,
}

#[derive(Debug, Clone, Copy)]
pub struct Submission {
    pub tx_hash: H256,
    /// Set by connectors that report a proxy-contract event hash instead of
    /// the transaction hash; the flow resolves it before tracking receipts.
    pub provisional: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct CallReceipt {
    pub tx_hash: H256,
    pub success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomicStatus {
    Supported,
    Ready,
    Unsupported,
}

/// Per-chain wallet capability flags. Two independent signals are
/// recognized for atomic batching; either one satisfies the check.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalletCapabilities {
    pub atomic_status: Option<AtomicStatus>,
    pub atomic_batch_supported: bool,
}

impl WalletCapabilities {
    #[must_use]
    pub fn supports_atomic_batch(&self) -> bool {
        matches!(
            self.atomic_status,
            Some(AtomicStatus::Supported | AtomicStatus::Ready)
        ) || self.atomic_batch_supported
    }

    /// Parses a `wallet_getCapabilities` response for one chain. The
    /// response is keyed by hex chain id; both the `atomic.status` shape and
    /// the legacy `atomicBatch.supported` flag are read.
    #[must_use]
    pub fn from_rpc_response(response: &Value, chain_id: u64) -> Self {
        let key = format!("0x{chain_id:x}");
        let Some(chain_caps) = response.get(&key) else {
            return Self::default();
        };

        let atomic_status =
            chain_caps
                .pointer("/atomic/status")
                .and_then(Value::as_str)
                .map(|status| match status {
                    "supported" => AtomicStatus::Supported,
                    "ready" => AtomicStatus::Ready,
                    _ => AtomicStatus::Unsupported,
                });

        let atomic_batch_supported = chain_caps
            .pointer("/atomicBatch/supported")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Self {
            atomic_status,
            atomic_batch_supported,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BundleStatus {
    pub confirmed: bool,
    pub failed: bool,
    pub receipts: Vec<CallReceipt>,
}

#[async_trait]
pub trait WalletClient: Send + Sync {
    fn sender(&self) -> Address;

    /// Dry-runs a call and returns it with a gas estimate attached. A
    /// revert here surfaces as an error, not a prepared call.
    async fn simulate(&self, call: &Call) -> Result<PreparedCall>;

    async fn submit(&self, prepared: &PreparedCall) -> Result<Submission>;

    /// Maps a provisional submission hash to the real transaction hash.
    /// Direct connectors return the hash unchanged.
    async fn resolve_submission(&self, submission: &Submission) -> Result<H256> {
        Ok(submission.tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<CallReceipt>;

    async fn capabilities(&self, chain_id: u64) -> Result<WalletCapabilities>;

    /// Submits a call bundle, returning the wallet's bundle identifier.
    async fn send_calls(&self, chain_id: u64, calls: &[Call]) -> Result<String>;

    async fn wait_for_bundle(&self, bundle_id: &str) -> Result<BundleStatus>;
}

/// Wallet backed by a JSON-RPC endpoint that manages its own keys
/// (`eth_sendTransaction`, `wallet_sendCalls`).
pub struct JsonRpcWallet {
    provider: Arc<Provider<Http>>,
    sender: Address,
    receipt_poll_interval: Duration,
    receipt_timeout: Duration,
}

impl JsonRpcWallet {
    #[must_use]
    pub fn new(provider: Arc<Provider<Http>>, sender: Address) -> Self {
        Self {
            provider,
            sender,
            receipt_poll_interval: Duration::from_secs(2),
            receipt_timeout: Duration::from_secs(180),
        }
    }

    fn tx_object(&self, call: &Call) -> Value {
        json!({
            "from": self.sender,
            "to": call.target,
            "data": call.calldata,
            "value": call.value,
        })
    }
}

#[async_trait]
impl WalletClient for JsonRpcWallet {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn simulate(&self, call: &Call) -> Result<PreparedCall> {
        let tx = ethers::types::TransactionRequest::new()
            .from(self.sender)
            .to(call.target)
            .data(call.calldata.clone())
            .value(call.value);

        let gas_estimate = self
            .provider
            .estimate_gas(&tx.into(), None)
            .await
            .map_err(|e| JanusError::WalletError(format!("Simulation failed: {e}")))?;

        Ok(PreparedCall {
            call: call.clone(),
            gas_estimate,
        })
    }

    async fn submit(&self, prepared: &PreparedCall) -> Result<Submission> {
        let tx_hash = self
            .provider
            .request::<_, H256>("eth_sendTransaction", [self.tx_object(&prepared.call)])
            .await
            .map_err(|e| JanusError::WalletError(format!("Submission failed: {e}")))?;

        Ok(Submission {
            tx_hash,
            provisional: false,
        })
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<CallReceipt> {
        let deadline = tokio::time::Instant::now() + self.receipt_timeout;

        loop {
            let receipt = self
                .provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(|e| JanusError::WalletError(format!("Receipt lookup failed: {e}")))?;

            if let Some(receipt) = receipt {
                let success = receipt.status.map_or(false, |s| s.as_u64() == 1);
                return Ok(CallReceipt { tx_hash, success });
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(JanusError::WalletError(format!(
                    "Timed out waiting for receipt of {tx_hash:?}"
                )));
            }
            tokio::time::sleep(self.receipt_poll_interval).await;
        }
    }

    async fn capabilities(&self, chain_id: u64) -> Result<WalletCapabilities> {
        let response = self
            .provider
            .request::<_, Value>("wallet_getCapabilities", [json!(self.sender)])
            .await
            .map_err(|e| JanusError::WalletError(format!("Capability query failed: {e}")))?;

        Ok(WalletCapabilities::from_rpc_response(&response, chain_id))
    }

    async fn send_calls(&self, chain_id: u64, calls: &[Call]) -> Result<String> {
        let call_objects: Vec<Value> = calls
            .iter()
            .map(|c| json!({ "to": c.target, "data": c.calldata, "value": c.value }))
            .collect();

        let params = json!({
            "version": "1.0",
            "from": self.sender,
            "chainId": format!("0x{chain_id:x}"),
            "calls": call_objects,
        });

        let response = self
            .provider
            .request::<_, Value>("wallet_sendCalls", [params])
            .await
            .map_err(|e| JanusError::WalletError(format!("Bundle submission failed: {e}")))?;

        // Wallets return either the bare identifier or `{ "id": ... }`.
        if let Some(id) = response.as_str() {
            return Ok(id.to_string());
        }
        response
            .pointer("/id")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| {
                JanusError::WalletError("Bundle submission returned no identifier".to_string())
            })
    }

    async fn wait_for_bundle(&self, bundle_id: &str) -> Result<BundleStatus> {
        let deadline = tokio::time::Instant::now() + self.receipt_timeout;

        loop {
            let response = self
                .provider
                .request::<_, Value>("wallet_getCallsStatus", [json!(bundle_id)])
                .await
                .map_err(|e| JanusError::WalletError(format!("Bundle status failed: {e}")))?;

            let status = parse_bundle_status(&response);
            if status.confirmed || status.failed {
                return Ok(status);
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(JanusError::WalletError(format!(
                    "Timed out waiting for bundle {bundle_id}"
                )));
            }
            tokio::time::sleep(self.receipt_poll_interval).await;
        }
    }
}

/// Parses a `wallet_getCallsStatus` response. Status arrives either as an
/// EIP-5792 numeric code (200 confirmed, 4xx/5xx failed) or as a legacy
/// string.
#[must_use]
pub fn parse_bundle_status(response: &Value) -> BundleStatus {
    let (confirmed, failed) = match response.get("status") {
        Some(Value::Number(code)) => {
            let code = code.as_u64().unwrap_or(0);
            (code == 200, code >= 400)
        }
        Some(Value::String(s)) => (s == "CONFIRMED", s == "FAILED" || s == "REVERTED"),
        _ => (false, false),
    };

    let receipts = response
        .pointer("/receipts")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|r| {
                    let hash = r
                        .pointer("/transactionHash")
                        .and_then(Value::as_str)?
                        .parse::<H256>()
                        .ok()?;
                    let success = matches!(
                        r.pointer("/status").and_then(Value::as_str),
                        Some("0x1") | Some("success")
                    );
                    Some(CallReceipt {
                        tx_hash: hash,
                        success,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    BundleStatus {
        confirmed,
        failed,
        receipts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_accept_atomic_status_signal() {
        let response = json!({
            "0x1": { "atomic": { "status": "supported" } }
        });
        let caps = WalletCapabilities::from_rpc_response(&response, 1);
        assert!(caps.supports_atomic_batch());

        let response = json!({
            "0x1": { "atomic": { "status": "ready" } }
        });
        assert!(WalletCapabilities::from_rpc_response(&response, 1).supports_atomic_batch());
    }

    #[test]
    fn capabilities_accept_legacy_atomic_batch_flag() {
        let response = json!({
            "0x1": { "atomicBatch": { "supported": true } }
        });
        let caps = WalletCapabilities::from_rpc_response(&response, 1);
        assert!(caps.supports_atomic_batch());
    }

    #[test]
    fn capabilities_reject_unsupported_or_foreign_chain() {
        let response = json!({
            "0x1": { "atomic": { "status": "unsupported" } }
        });
        assert!(!WalletCapabilities::from_rpc_response(&response, 1).supports_atomic_batch());

        let response = json!({
            "0x2105": { "atomic": { "status": "supported" } }
        });
        assert!(!WalletCapabilities::from_rpc_response(&response, 1).supports_atomic_batch());
    }

    #[test]
    fn bundle_status_numeric_codes() {
        let status = parse_bundle_status(&json!({
            "status": 200,
            "receipts": [
                { "transactionHash": "0x0000000000000000000000000000000000000000000000000000000000000001", "status": "0x1" }
            ]
        }));
        assert!(status.confirmed);
        assert!(!status.failed);
        assert_eq!(status.receipts.len(), 1);
        assert!(status.receipts[0].success);

        let status = parse_bundle_status(&json!({ "status": 500 }));
        assert!(status.failed);

        let status = parse_bundle_status(&json!({ "status": 100 }));
        assert!(!status.confirmed);
        assert!(!status.failed);
    }

    #[test]
    fn bundle_status_string_codes() {
        assert!(parse_bundle_status(&json!({ "status": "CONFIRMED" })).confirmed);
        assert!(parse_bundle_status(&json!({ "status": "REVERTED" })).failed);
    }
}
