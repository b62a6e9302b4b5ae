/*
 * Atomic batch transaction flow
 *
 * Submits the whole call list as one EIP-5792 bundle. Only used when the
 * wallet reports atomic capability for the chain and the list has at least
 * two calls; every violated precondition downgrades execute() to a logged
 * no-op so the router's sequential path stays the safe default.
 */

use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

use crate::calls::Call;
use crate::flow::{is_revert_error, FlowCallbacks, FlowOutcome};
use crate::models::Result;
use crate::wallet::{WalletCapabilities, WalletClient};

pub struct BatchFlow<W: WalletClient> {
    wallet: Arc<W>,
    chain_id: u64,
    calls: Vec<Call>,
    capabilities: WalletCapabilities,
    enabled: bool,
    is_executing: Mutex<bool>,
    last_error: Mutex<Option<String>>,
    callbacks: FlowCallbacks,
}

impl<W: WalletClient> BatchFlow<W> {
    #[must_use]
    pub fn new(
        wallet: Arc<W>,
        chain_id: u64,
        calls: &[Call],
        capabilities: WalletCapabilities,
        enabled: bool,
        callbacks: FlowCallbacks,
    ) -> Self {
        Self {
            wallet,
            chain_id,
            calls: calls.to_vec(),
            capabilities,
            enabled,
            is_executing: Mutex::new(false),
            last_error: Mutex::new(None),
            callbacks,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|e| e.clone())
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.is_executing.lock().map(|g| *g).unwrap_or(false) && self.error().is_none()
    }

    pub async fn execute(&self) -> Result<FlowOutcome> {
        if !self.enabled {
            warn!("Batch flow is disabled for this call list; ignoring execute");
            return Ok(FlowOutcome::NotStarted);
        }
        if !self.capabilities.supports_atomic_batch() {
            warn!(
                chain_id = self.chain_id,
                "Wallet reports no atomic capability; ignoring batch execute"
            );
            return Ok(FlowOutcome::NotStarted);
        }
        if self.calls.len() < 2 {
            warn!(
                call_count = self.calls.len(),
                "Refusing to send a degenerate batch; use the sequential path"
            );
            return Ok(FlowOutcome::NotStarted);
        }
        {
            let mut executing = match self.is_executing.lock() {
                Ok(g) => g,
                Err(_) => return Ok(FlowOutcome::NotStarted),
            };
            if *executing {
                error!("execute() called while a bundle is already in flight");
                return Ok(FlowOutcome::NotStarted);
            }
            *executing = true;
        }

        let outcome = self.run().await;

        if let Ok(mut executing) = self.is_executing.lock() {
            *executing = false;
        }
        Ok(outcome)
    }

    async fn run(&self) -> FlowOutcome {
        let bundle_id = match self.wallet.send_calls(self.chain_id, &self.calls).await {
            Ok(id) => id,
            Err(e) => return self.fail(e.to_string()),
        };

        info!(
            bundle_id = %bundle_id,
            call_count = self.calls.len(),
            "Bundle submitted"
        );

        let status = match self.wallet.wait_for_bundle(&bundle_id).await {
            Ok(s) => s,
            Err(e) => return self.fail(e.to_string()),
        };

        if status.failed || !status.confirmed {
            return self.fail("bundle reverted or was rejected".to_string());
        }

        // The bundle is atomic; any receipt identifies it. The first call's
        // receipt hash is what callers get.
        match status.receipts.first() {
            Some(receipt) => {
                info!(tx_hash = ?receipt.tx_hash, "Bundle confirmed");
                if let Some(on_success) = &self.callbacks.on_success {
                    on_success(receipt.tx_hash);
                }
                FlowOutcome::Succeeded {
                    final_hash: receipt.tx_hash,
                }
            }
            None => self.fail("bundle confirmed without receipts".to_string()),
        }
    }

    fn fail(&self, message: String) -> FlowOutcome {
        let reverted = is_revert_error(&message);
        error!(reverted, "Batch flow failed: {message}");

        if let Ok(mut last) = self.last_error.lock() {
            *last = Some(message.clone());
        }
        if let Some(on_error) = &self.callbacks.on_error {
            on_error(&message, None);
        }

        FlowOutcome::Failed {
            error: message,
            tx_hash: None,
            reverted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ethers::types::{Address, H256, U256};

    use crate::flow::{FlowCallbacks, FlowRouter};
    use crate::models::JanusError;
    use crate::wallet::{
        AtomicStatus, BundleStatus, CallReceipt, PreparedCall, Submission,
    };

    /// Wallet double with full batch support and instant confirmations.
    struct BatchWallet {
        capable: bool,
        bundle_fails: bool,
    }

    impl BatchWallet {
        fn capable() -> Self {
            Self {
                capable: true,
                bundle_fails: false,
            }
        }
    }

    #[async_trait]
    impl WalletClient for BatchWallet {
        fn sender(&self) -> Address {
            Address::from_low_u64_be(0xFEED)
        }

        async fn simulate(&self, call: &Call) -> crate::models::Result<PreparedCall> {
            Ok(PreparedCall {
                call: call.clone(),
                gas_estimate: U256::from(21_000u64),
            })
        }

        async fn submit(&self, _prepared: &PreparedCall) -> crate::models::Result<Submission> {
            Ok(Submission {
                tx_hash: H256::from_low_u64_be(7),
                provisional: false,
            })
        }

        async fn wait_for_receipt(&self, tx_hash: H256) -> crate::models::Result<CallReceipt> {
            Ok(CallReceipt {
                tx_hash,
                success: true,
            })
        }

        async fn capabilities(&self, _chain_id: u64) -> crate::models::Result<WalletCapabilities> {
            Ok(WalletCapabilities {
                atomic_status: self.capable.then_some(AtomicStatus::Supported),
                atomic_batch_supported: self.capable,
            })
        }

        async fn send_calls(
            &self,
            _chain_id: u64,
            _calls: &[Call],
        ) -> crate::models::Result<String> {
            if self.bundle_fails {
                return Err(JanusError::WalletError("execution reverted".to_string()));
            }
            Ok("bundle-1".to_string())
        }

        async fn wait_for_bundle(&self, _bundle_id: &str) -> crate::models::Result<BundleStatus> {
            Ok(BundleStatus {
                confirmed: true,
                failed: false,
                receipts: vec![CallReceipt {
                    tx_hash: H256::from_low_u64_be(42),
                    success: true,
                }],
            })
        }
    }

    fn calls(n: usize) -> Vec<Call> {
        (0..n)
            .map(|i| Call::new(Address::from_low_u64_be(i as u64 + 1), vec![0xAB]))
            .collect()
    }

    #[tokio::test]
    async fn full_capability_with_single_call_still_routes_sequential() {
        let wallet = Arc::new(BatchWallet::capable());
        let router = FlowRouter::new(wallet, 1);

        let routed = router
            .route(calls(1), true, FlowCallbacks::default())
            .await
            .unwrap();

        assert!(!routed.uses_batch());
        assert!(routed.sequential.enabled());
        assert!(!routed.batch.enabled());
    }

    #[tokio::test]
    async fn multi_call_with_capability_routes_batch() {
        let wallet = Arc::new(BatchWallet::capable());
        let router = FlowRouter::new(wallet, 1);

        let routed = router
            .route(calls(3), true, FlowCallbacks::default())
            .await
            .unwrap();

        assert!(routed.uses_batch());
        assert!(!routed.sequential.enabled());

        let outcome = routed.execute().await.unwrap();
        match outcome {
            FlowOutcome::Succeeded { final_hash } => {
                assert_eq!(final_hash, H256::from_low_u64_be(42));
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn incapable_wallet_routes_sequential() {
        let wallet = Arc::new(BatchWallet {
            capable: false,
            bundle_fails: false,
        });
        let router = FlowRouter::new(wallet, 1);

        let routed = router
            .route(calls(3), true, FlowCallbacks::default())
            .await
            .unwrap();
        assert!(!routed.uses_batch());
    }

    #[tokio::test]
    async fn opting_out_skips_the_capability_query_and_batch() {
        let wallet = Arc::new(BatchWallet::capable());
        let router = FlowRouter::new(wallet, 1);

        let routed = router
            .route(calls(3), false, FlowCallbacks::default())
            .await
            .unwrap();
        assert!(!routed.uses_batch());
    }

    #[tokio::test]
    async fn disabled_batch_execute_is_a_noop() {
        let wallet = Arc::new(BatchWallet::capable());
        let flow = BatchFlow::new(
            wallet,
            1,
            &calls(3),
            WalletCapabilities::default(),
            false,
            FlowCallbacks::default(),
        );

        let outcome = flow.execute().await.unwrap();
        assert!(matches!(outcome, FlowOutcome::NotStarted));
    }

    #[tokio::test]
    async fn bundle_revert_reaches_the_error_callback() {
        let wallet = Arc::new(BatchWallet {
            capable: true,
            bundle_fails: true,
        });

        let seen = Arc::new(Mutex::new(None::<String>));
        let slot = seen.clone();
        let callbacks = FlowCallbacks {
            on_success: None,
            on_error: Some(Arc::new(move |message: &str, _hash| {
                *slot.lock().unwrap() = Some(message.to_string());
            })),
        };

        let capabilities = WalletCapabilities {
            atomic_status: Some(AtomicStatus::Supported),
            atomic_batch_supported: true,
        };
        let flow = BatchFlow::new(wallet, 1, &calls(2), capabilities, true, callbacks);

        let outcome = flow.execute().await.unwrap();
        match outcome {
            FlowOutcome::Failed { reverted, .. } => assert!(reverted),
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(seen.lock().unwrap().is_some());
        assert!(flow.error().is_some());
    }
}
