/*
 * Sequential transaction flow
 *
 * One call at a time: simulate, submit, await the receipt, then advance.
 * Call i+1 is never simulated before call i's hash is recorded, and never
 * submitted before its own simulation succeeds. The first call needs an
 * explicit `execute()`; every later call auto-chains.
 */

use ethers::types::H256;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

use crate::calls::Call;
use crate::flow::{is_revert_error, FlowCallbacks, FlowOutcome};
use crate::models::{JanusError, Result};
use crate::wallet::{PreparedCall, WalletClient};

/// Mutable state owned by one flow instance. Hashes and index advance
/// monotonically: `transaction_hashes.len() <= current_index <= calls.len()`.
#[derive(Debug, Clone, Default)]
pub struct FlowState {
    pub current_index: usize,
    pub transaction_hashes: Vec<H256>,
    pub is_executing: bool,
}

pub struct SequentialFlow<W: WalletClient> {
    wallet: Arc<W>,
    /// Snapshot taken at construction; later mutation of the caller's list
    /// cannot corrupt an in-flight run.
    calls: Vec<Call>,
    enabled: bool,
    state: Mutex<FlowState>,
    prepared: Mutex<Option<(usize, PreparedCall)>>,
    last_error: Mutex<Option<String>>,
    callbacks: FlowCallbacks,
}

impl<W: WalletClient> SequentialFlow<W> {
    #[must_use]
    pub fn new(wallet: Arc<W>, calls: &[Call], enabled: bool, callbacks: FlowCallbacks) -> Self {
        Self {
            wallet,
            calls: calls.to_vec(),
            enabled,
            state: Mutex::new(FlowState::default()),
            prepared: Mutex::new(None),
            last_error: Mutex::new(None),
            callbacks,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn state(&self) -> FlowState {
        self.state.lock().map(|s| s.clone()).unwrap_or_default()
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|e| e.clone())
    }

    /// True while a run is in progress and no write error has surfaced.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state().is_executing && self.error().is_none()
    }

    /// True only when the list is non-empty, the current index is in range
    /// and the current call's simulation has produced a submittable request.
    #[must_use]
    pub fn prepared(&self) -> bool {
        let state = self.state();
        if self.calls.is_empty() || state.current_index >= self.calls.len() {
            return false;
        }
        self.prepared
            .lock()
            .ok()
            .map(|p| matches!(*p, Some((index, _)) if index == state.current_index))
            .unwrap_or(false)
    }

    /// Simulates the call at the current index. For indices past the first
    /// this is gated on the previous call's hash being recorded, which keeps
    /// submission strictly ordered.
    pub async fn prepare(&self) -> Result<bool> {
        let (index, gate_open) = {
            let state = self
                .state
                .lock()
                .map_err(|_| JanusError::FlowError("State lock poisoned".to_string()))?;
            let gate_open =
                state.current_index == 0 || state.transaction_hashes.len() >= state.current_index;
            (state.current_index, gate_open)
        };

        if index >= self.calls.len() || !gate_open {
            return Ok(false);
        }

        match self.wallet.simulate(&self.calls[index]).await {
            Ok(prepared) => {
                if let Ok(mut slot) = self.prepared.lock() {
                    *slot = Some((index, prepared));
                }
                Ok(true)
            }
            Err(e) => {
                let message = e.to_string();
                if let Ok(mut last) = self.last_error.lock() {
                    *last = Some(message.clone());
                }
                Err(JanusError::FlowError(format!(
                    "Simulation of call {index} failed: {message}"
                )))
            }
        }
    }

    /// Starts (or refuses to start) a run. Every violated precondition is
    /// logged and turns the invocation into a no-op; nothing is thrown and
    /// nothing is silently retried.
    pub async fn execute(&self) -> Result<FlowOutcome> {
        if !self.enabled {
            warn!("Sequential flow is disabled for this call list; ignoring execute");
            return Ok(FlowOutcome::NotStarted);
        }

        {
            let mut state = self
                .state
                .lock()
                .map_err(|_| JanusError::FlowError("State lock poisoned".to_string()))?;
            if state.is_executing {
                error!("execute() called while a run is already in progress");
                return Ok(FlowOutcome::NotStarted);
            }
            if state.current_index >= self.calls.len() {
                error!(
                    current_index = state.current_index,
                    call_count = self.calls.len(),
                    "execute() called with no call left to run"
                );
                return Ok(FlowOutcome::NotStarted);
            }
            let simulation_ready = self
                .prepared
                .lock()
                .ok()
                .map(|slot| matches!(*slot, Some((index, _)) if index == state.current_index))
                .unwrap_or(false);
            if !simulation_ready {
                error!(
                    current_index = state.current_index,
                    "execute() called before the current call's simulation is ready"
                );
                return Ok(FlowOutcome::NotStarted);
            }
            state.is_executing = true;
        }

        let outcome = self.run().await;

        if let Ok(mut state) = self.state.lock() {
            state.is_executing = false;
        }
        Ok(outcome)
    }

    async fn run(&self) -> FlowOutcome {
        loop {
            let index = match self.state.lock() {
                Ok(state) => state.current_index,
                Err(_) => return self.fail(0, "State lock poisoned".to_string(), None),
            };

            // First call uses the simulation from prepare(); chained calls
            // simulate here, after the prior hash landed.
            let cached = match self.prepared.lock() {
                Ok(mut slot) => match slot.take() {
                    Some((cached_index, p)) if cached_index == index => Some(p),
                    other => {
                        *slot = other;
                        None
                    }
                },
                Err(_) => None,
            };
            let prepared = match cached {
                Some(p) => p,
                None => match self.wallet.simulate(&self.calls[index]).await {
                    Ok(p) => p,
                    Err(e) => return self.fail(index, e.to_string(), None),
                },
            };

            let submission = match self.wallet.submit(&prepared).await {
                Ok(s) => s,
                Err(e) => return self.fail(index, e.to_string(), None),
            };

            // Proxy connectors hand back an event-derived hash; resolve it
            // before tracking the receipt so callbacks see the real one.
            let tx_hash = if submission.provisional {
                match self.wallet.resolve_submission(&submission).await {
                    Ok(hash) => hash,
                    Err(e) => return self.fail(index, e.to_string(), Some(submission.tx_hash)),
                }
            } else {
                submission.tx_hash
            };

            let receipt = match self.wallet.wait_for_receipt(tx_hash).await {
                Ok(r) => r,
                Err(e) => return self.fail(index, e.to_string(), Some(tx_hash)),
            };

            if !receipt.success {
                return self.fail(
                    index,
                    "execution reverted on chain".to_string(),
                    Some(tx_hash),
                );
            }

            let finished = {
                let mut state = match self.state.lock() {
                    Ok(s) => s,
                    Err(_) => {
                        return self.fail(index, "State lock poisoned".to_string(), Some(tx_hash))
                    }
                };
                state.transaction_hashes.push(tx_hash);
                state.current_index += 1;
                state.current_index >= self.calls.len()
            };

            info!(
                call_index = index,
                tx_hash = ?tx_hash,
                "Call confirmed"
            );

            if finished {
                if let Some(on_success) = &self.callbacks.on_success {
                    on_success(tx_hash);
                }
                // Reset so the instance can run a fresh call list's worth
                // of state again.
                if let Ok(mut state) = self.state.lock() {
                    *state = FlowState::default();
                }
                return FlowOutcome::Succeeded {
                    final_hash: tx_hash,
                };
            }
        }
    }

    /// Terminal failure: partial progress stays in place for inspection,
    /// nothing auto-advances or retries.
    fn fail(&self, index: usize, message: String, tx_hash: Option<H256>) -> FlowOutcome {
        let reverted = is_revert_error(&message);
        error!(
            call_index = index,
            reverted,
            tx_hash = ?tx_hash,
            "Sequential flow failed: {message}"
        );

        if let Ok(mut last) = self.last_error.lock() {
            *last = Some(message.clone());
        }
        if let Some(on_error) = &self.callbacks.on_error {
            on_error(&message, tx_hash);
        }

        FlowOutcome::Failed {
            error: message,
            tx_hash,
            reverted,
        }
    }
}
