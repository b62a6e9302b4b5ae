/*
 * Operational metrics
 */

use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

use crate::flow::FlowOutcome;
use crate::models::{JanusError, ProviderKind, Result, SelectionResult};

pub struct Metrics {
    registry: Registry,
    pub selections_vault: IntCounter,
    pub selections_pool: IntCounter,
    pub selections_all_blocked: IntCounter,
    pub flows_started: IntCounter,
    pub flows_succeeded: IntCounter,
    pub flows_failed: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let selections_vault = counter("janus_selections_vault_total", "Routes won by the vault")?;
        let selections_pool = counter("janus_selections_pool_total", "Routes won by the pool")?;
        let selections_all_blocked = counter(
            "janus_selections_all_blocked_total",
            "Routes with no available provider",
        )?;
        let flows_started = counter("janus_flows_started_total", "Transaction flows started")?;
        let flows_succeeded =
            counter("janus_flows_succeeded_total", "Transaction flows succeeded")?;
        let flows_failed = counter("janus_flows_failed_total", "Transaction flows failed")?;

        for c in [
            &selections_vault,
            &selections_pool,
            &selections_all_blocked,
            &flows_started,
            &flows_succeeded,
            &flows_failed,
        ] {
            registry
                .register(Box::new(c.clone()))
                .map_err(|e| JanusError::ConfigError(format!("Metric registration failed: {e}")))?;
        }

        Ok(Self {
            registry,
            selections_vault,
            selections_pool,
            selections_all_blocked,
            flows_started,
            flows_succeeded,
            flows_failed,
        })
    }

    pub fn record_selection(&self, result: &SelectionResult) {
        if result.all_providers_blocked {
            self.selections_all_blocked.inc();
            return;
        }
        match result.selected_provider {
            ProviderKind::Vault => self.selections_vault.inc(),
            ProviderKind::CurvePool => self.selections_pool.inc(),
        }
    }

    pub fn record_flow_outcome(&self, outcome: &FlowOutcome) {
        match outcome {
            FlowOutcome::Succeeded { .. } => self.flows_succeeded.inc(),
            FlowOutcome::Failed { .. } => self.flows_failed.inc(),
            FlowOutcome::NotStarted => {}
        }
    }

    pub fn export(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| JanusError::Unknown(format!("Metric encoding failed: {e}")))?;
        String::from_utf8(buffer)
            .map_err(|e| JanusError::Unknown(format!("Metric encoding failed: {e}")))
    }
}

fn counter(name: &str, help: &str) -> Result<IntCounter> {
    IntCounter::new(name, help)
        .map_err(|e| JanusError::ConfigError(format!("Metric creation failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SelectionReason, SelectionResult};
    use rust_decimal::Decimal;

    fn selection(provider: ProviderKind, blocked: bool) -> SelectionResult {
        SelectionResult {
            selected_provider: provider,
            selection_reason: SelectionReason::VaultDefault,
            selected_quote: None,
            all_providers_blocked: blocked,
            rate_difference_percent: Decimal::ZERO,
        }
    }

    #[test]
    fn selection_counters_split_by_winner() {
        let metrics = Metrics::new().unwrap();

        metrics.record_selection(&selection(ProviderKind::Vault, false));
        metrics.record_selection(&selection(ProviderKind::CurvePool, false));
        metrics.record_selection(&selection(ProviderKind::Vault, true));

        assert_eq!(metrics.selections_vault.get(), 1);
        assert_eq!(metrics.selections_pool.get(), 1);
        assert_eq!(metrics.selections_all_blocked.get(), 1);

        let exported = metrics.export().unwrap();
        assert!(exported.contains("janus_selections_vault_total"));
    }
}
