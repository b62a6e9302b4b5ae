/*
 * Main routing service that coordinates all components
 */

use chrono::Utc;
use ethers::types::{Address, U256};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    calls::{Call, CallPlanner},
    config::Config,
    flow::{FlowCallbacks, FlowOutcome, FlowRouter},
    metrics::Metrics,
    models::{Direction, JanusError, Result, RouteDecision},
    providers::{CurvePoolClient, LiquidityProvider, SavingsVaultClient},
    reference::{create_rate_reference, RateReference},
    rpc::RpcClient,
    selection::{SelectionEngine, SelectionInputs, SelectionKey},
    wallet::WalletClient,
};

pub struct RouterService {
    config: Config,
    vault: Arc<SavingsVaultClient>,
    pool: Arc<CurvePoolClient>,
    engine: SelectionEngine,
    planner: CallPlanner,
    reference: Option<Box<dyn RateReference>>,
    metrics: Arc<Metrics>,
}

impl RouterService {
    pub async fn new(config: Config) -> Result<Self> {
        info!("Initializing Router Service");

        let rpc = Arc::new(RpcClient::new(&config.chain.rpc_url, config.chain.chain_id).await?);
        info!("Connected to chain RPC");

        let vault = Arc::new(SavingsVaultClient::new(
            rpc.clone(),
            config.contracts,
            &config.routing,
        ));
        info!("Savings vault client initialized");

        let pool = Arc::new(
            CurvePoolClient::new(
                rpc.clone(),
                config.contracts,
                config.comparison,
                config.routing.capacity_buffer_bps,
            )
            .await?,
        );
        info!(indices = ?pool.token_indices(), "Curve pool client initialized");

        let reference = config
            .reference
            .enabled
            .then(|| create_rate_reference(config.reference.source));
        if reference.is_some() {
            info!("Reference rate client initialized");
        }

        let engine = SelectionEngine::new(config.comparison);
        let planner = CallPlanner::new(config.contracts, config.comparison.max_slippage_bps);
        let metrics = Arc::new(Metrics::new()?);

        Ok(Self {
            config,
            vault,
            pool,
            engine,
            planner,
            reference,
            metrics,
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    /// Quotes both providers and selects a route. The stable amount drives
    /// the provider choice; the live amount prices the executable quote.
    pub async fn check_route(
        &self,
        stable_amount: U256,
        live_amount: U256,
        direction: Direction,
    ) -> Result<RouteDecision> {
        info!(
            %stable_amount,
            %live_amount,
            ?direction,
            "Checking route"
        );

        let (vault_state, pool_state, stable_vault, stable_pool, live_vault, live_pool) = tokio::try_join!(
            self.vault.state(stable_amount, direction),
            self.pool.state(stable_amount, direction),
            self.vault.quote(stable_amount, direction),
            self.pool.quote(stable_amount, direction),
            self.vault.quote(live_amount, direction),
            self.pool.quote(live_amount, direction),
        )?;

        let inputs = SelectionInputs {
            vault_state: vault_state.clone(),
            pool_state: pool_state.clone(),
            stable_vault_quote: stable_vault.as_ready().cloned(),
            stable_pool_quote: stable_pool.as_ready().cloned(),
            live_vault_quote: live_vault.as_ready().cloned(),
            live_pool_quote: live_pool.as_ready().cloned(),
        };

        let key = SelectionKey {
            stable_amount,
            live_amount,
            direction,
        };
        let selection = self.engine.refresh(key, &inputs);
        self.metrics.record_selection(&selection);

        let reference_rate = match &self.reference {
            Some(client) => match client.savings_rate().await {
                Ok(rate) => Some(rate),
                Err(e) => {
                    warn!("Reference rate unavailable: {e}");
                    None
                }
            },
            None => None,
        };

        info!(
            provider = ?selection.selected_provider,
            reason = ?selection.selection_reason,
            "Route check completed"
        );

        Ok(RouteDecision {
            timestamp_utc: Utc::now(),
            direction,
            stable_amount,
            live_amount,
            vault_quote: inputs.live_vault_quote,
            pool_quote: inputs.live_pool_quote,
            vault_state,
            pool_state,
            selection,
            reference_rate,
        })
    }

    /// Turns a decision into the ordered call list that realizes it.
    /// `allowance` is the owner's standing allowance towards the selected
    /// target contract.
    pub fn build_plan(
        &self,
        decision: &RouteDecision,
        owner: Address,
        allowance: U256,
    ) -> Result<Vec<Call>> {
        if decision.selection.all_providers_blocked {
            return Err(JanusError::FlowError(
                "No provider available for this route".to_string(),
            ));
        }
        let quote = decision.selection.selected_quote.as_ref().ok_or_else(|| {
            JanusError::FlowError("Route has no executable quote".to_string())
        })?;
        if !quote.is_valid {
            return Err(JanusError::FlowError(format!(
                "Selected quote is not executable: {}",
                quote
                    .invalid_reason
                    .as_deref()
                    .unwrap_or("no reason recorded")
            )));
        }

        Ok(self.planner.plan(
            decision.selection.selected_provider,
            decision.direction,
            quote,
            owner,
            allowance,
            self.pool.token_indices(),
        ))
    }

    /// Executes a call list through whichever flow the router enables.
    pub async fn execute_plan<W: WalletClient + 'static>(
        &self,
        wallet: Arc<W>,
        calls: Vec<Call>,
        should_use_batch: bool,
        callbacks: FlowCallbacks,
    ) -> Result<FlowOutcome> {
        let router = FlowRouter::new(wallet, self.config.chain.chain_id);
        let routed = router.route(calls, should_use_batch, callbacks).await?;

        self.metrics.flows_started.inc();
        let outcome = routed.execute().await?;
        self.metrics.record_flow_outcome(&outcome);

        Ok(outcome)
    }
}
