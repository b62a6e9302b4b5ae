/*
 * Transaction flow orchestration
 *
 * Executes an ordered call list either one call at a time (each gated on
 * the previous confirmation) or as one atomic EIP-5792 bundle. The router
 * activates exactly one path per call list so a plan can never be submitted
 * twice.
 */

pub mod batch;
pub mod sequential;

use ethers::types::H256;
use std::sync::Arc;
use tracing::debug;

use crate::calls::Call;
use crate::models::Result;
use crate::wallet::{WalletCapabilities, WalletClient};

pub use batch::BatchFlow;
pub use sequential::SequentialFlow;

/// Terminal outcome of one execution attempt.
#[derive(Debug, Clone)]
pub enum FlowOutcome {
    /// A precondition failed; nothing was submitted.
    NotStarted,
    Succeeded {
        final_hash: H256,
    },
    Failed {
        error: String,
        tx_hash: Option<H256>,
        reverted: bool,
    },
}

impl FlowOutcome {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(self, FlowOutcome::Succeeded { .. })
    }
}

pub type SuccessCallback = Arc<dyn Fn(H256) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&str, Option<H256>) + Send + Sync>;

#[derive(Clone, Default)]
pub struct FlowCallbacks {
    pub on_success: Option<SuccessCallback>,
    pub on_error: Option<ErrorCallback>,
}

/// Heuristic revert detection over normalized wallet error strings. There
/// is no structured revert-reason decode; transport failures that mention
/// neither marker share the same terminal path.
#[must_use]
pub fn is_revert_error(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("revert") || message.contains("execution")
}

/// The dispatcher over the two execution paths. Exactly one of the wrapped
/// flows is enabled for any given call list.
pub struct FlowRouter<W: WalletClient> {
    wallet: Arc<W>,
    chain_id: u64,
}

pub struct RoutedFlow<W: WalletClient> {
    pub sequential: SequentialFlow<W>,
    pub batch: BatchFlow<W>,
}

impl<W: WalletClient> FlowRouter<W> {
    #[must_use]
    pub fn new(wallet: Arc<W>, chain_id: u64) -> Self {
        Self { wallet, chain_id }
    }

    /// Builds both flows with mutually exclusive enablement:
    /// `use_batch = should_use_batch && batch_supported && calls.len() > 1`.
    /// A single call never goes out as a degenerate batch.
    pub async fn route(
        &self,
        calls: Vec<Call>,
        should_use_batch: bool,
        callbacks: FlowCallbacks,
    ) -> Result<RoutedFlow<W>> {
        let capabilities = if should_use_batch {
            self.wallet.capabilities(self.chain_id).await?
        } else {
            WalletCapabilities::default()
        };

        let use_batch =
            should_use_batch && capabilities.supports_atomic_batch() && calls.len() > 1;

        if should_use_batch && !use_batch && calls.len() <= 1 {
            debug!(
                call_count = calls.len(),
                "Batch requested for a single call; using the sequential path"
            );
        }

        Ok(RoutedFlow {
            sequential: SequentialFlow::new(
                self.wallet.clone(),
                &calls,
                !use_batch,
                callbacks.clone(),
            ),
            batch: BatchFlow::new(
                self.wallet.clone(),
                self.chain_id,
                &calls,
                capabilities,
                use_batch,
                callbacks,
            ),
        })
    }
}

impl<W: WalletClient> RoutedFlow<W> {
    #[must_use]
    pub fn uses_batch(&self) -> bool {
        self.batch.enabled()
    }

    /// Runs whichever path the router enabled. For the sequential path this
    /// is the explicit first-call trigger; later calls chain on their own.
    pub async fn execute(&self) -> Result<FlowOutcome> {
        if self.batch.enabled() {
            self.batch.execute().await
        } else {
            self.sequential.prepare().await?;
            self.sequential.execute().await
        }
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        if self.batch.enabled() {
            self.batch.is_loading()
        } else {
            self.sequential.is_loading()
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        if self.batch.enabled() {
            self.batch.error()
        } else {
            self.sequential.error()
        }
    }
}
