/*
 * RPC client for read-only chain access
 */

use crate::models::{JanusError, Result};
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Address, Bytes};
use std::sync::Arc;

pub struct RpcClient {
    provider: Arc<Provider<Http>>,
    chain_id: u64,
}

impl RpcClient {
    pub async fn new(rpc_url: &str, chain_id: u64) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| JanusError::RpcError(format!("Failed to create provider: {e}")))?;

        let chain = provider
            .get_chainid()
            .await
            .map_err(|e| JanusError::RpcError(format!("Failed to get chain ID: {e}")))?;

        if chain.as_u64() != chain_id {
            return Err(JanusError::RpcError(format!(
                "Chain ID mismatch: expected {}, got {}",
                chain_id,
                chain.as_u64()
            )));
        }

        Ok(Self {
            provider: Arc::new(provider),
            chain_id,
        })
    }

    #[must_use]
    pub fn provider(&self) -> Arc<Provider<Http>> {
        self.provider.clone()
    }

    #[must_use]
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Raw `eth_call` against `to`. Callers decode the returned words and
    /// enforce their own minimum lengths.
    pub async fn call(&self, to: Address, call_data: Vec<u8>) -> Result<Bytes> {
        let tx = ethers::types::TransactionRequest::new()
            .to(to)
            .data(Bytes::from(call_data));

        self.provider
            .call(&tx.into(), None)
            .await
            .map_err(|e| JanusError::ContractError(format!("eth_call failed: {e}")))
    }
}
