/*
 * Provider selection
 *
 * Combines two provider availability snapshots and two quotes into a single
 * routing decision. The vault is the default winner: the pool must beat it
 * by at least the configured threshold before the route switches.
 */

use ethers::types::U256;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

use crate::models::{
    Direction, ProviderKind, ProviderState, Quote, RateComparisonConfig, SelectionReason,
    SelectionResult,
};
use crate::rates;

/// Priority order, first match wins:
/// 1. both providers unavailable for the direction - all blocked, the vault
///    is reported for display only;
/// 2. only the pool available - pool;
/// 3. only the vault available - vault;
/// 4. both available - rate comparison against the switch threshold, vault
///    wins ties. Within this step a quote with zero output loses outright to
///    a non-zero one, and an invalid quote loses outright to a valid one.
#[must_use]
pub fn select_provider(
    vault_state: &ProviderState,
    pool_state: &ProviderState,
    vault_quote: Option<&Quote>,
    pool_quote: Option<&Quote>,
    config: &RateComparisonConfig,
    direction: Direction,
) -> SelectionResult {
    let vault_open = vault_state.available_for(direction);
    let pool_open = pool_state.available_for(direction);

    let rate_difference = match (pool_quote, vault_quote) {
        (Some(pool), Some(vault)) => {
            rates::rate_difference_percent(pool.effective_rate, vault.effective_rate)
        }
        _ => Decimal::ZERO,
    };

    if !vault_open && !pool_open {
        return SelectionResult {
            selected_provider: ProviderKind::Vault,
            selection_reason: SelectionReason::AllBlocked,
            selected_quote: None,
            all_providers_blocked: true,
            rate_difference_percent: Decimal::ZERO,
        };
    }

    if !vault_open {
        return SelectionResult {
            selected_provider: ProviderKind::CurvePool,
            selection_reason: SelectionReason::PoolOnlyAvailable,
            selected_quote: pool_quote.cloned(),
            all_providers_blocked: false,
            rate_difference_percent: rate_difference,
        };
    }

    if !pool_open {
        return SelectionResult {
            selected_provider: ProviderKind::Vault,
            selection_reason: SelectionReason::VaultOnlyAvailable,
            selected_quote: vault_quote.cloned(),
            all_providers_blocked: false,
            rate_difference_percent: rate_difference,
        };
    }

    let (vault, pool) = match (vault_quote, pool_quote) {
        (Some(v), Some(p)) => (v, p),
        // A missing quote means the comparison has nothing to stand on;
        // fall back to the default provider.
        _ => {
            return SelectionResult {
                selected_provider: ProviderKind::Vault,
                selection_reason: SelectionReason::VaultDefault,
                selected_quote: vault_quote.cloned(),
                all_providers_blocked: false,
                rate_difference_percent: Decimal::ZERO,
            }
        }
    };

    // A degenerate zero output is a maximally significant loss, even when
    // the provider's state has not caught up yet.
    if vault.output_amount.is_zero() && !pool.output_amount.is_zero() {
        return pick(
            ProviderKind::CurvePool,
            SelectionReason::PoolBetterRate,
            pool,
            Decimal::from(100),
        );
    }
    if pool.output_amount.is_zero() && !vault.output_amount.is_zero() {
        return pick(
            ProviderKind::Vault,
            SelectionReason::VaultBetterRate,
            vault,
            Decimal::from(-100),
        );
    }

    // An invalid quote never beats a valid one, whatever its numbers say.
    if vault.is_valid != pool.is_valid {
        return if vault.is_valid {
            pick(
                ProviderKind::Vault,
                SelectionReason::VaultBetterRate,
                vault,
                rate_difference,
            )
        } else {
            pick(
                ProviderKind::CurvePool,
                SelectionReason::PoolBetterRate,
                pool,
                rate_difference,
            )
        };
    }

    if rates::is_difference_significant(rate_difference, config.rate_switch_threshold_bps) {
        if rate_difference > Decimal::ZERO {
            return pick(
                ProviderKind::CurvePool,
                SelectionReason::PoolBetterRate,
                pool,
                rate_difference,
            );
        }
        return pick(
            ProviderKind::Vault,
            SelectionReason::VaultBetterRate,
            vault,
            rate_difference,
        );
    }

    pick(
        ProviderKind::Vault,
        SelectionReason::VaultDefault,
        vault,
        rate_difference,
    )
}

fn pick(
    provider: ProviderKind,
    reason: SelectionReason,
    quote: &Quote,
    rate_difference_percent: Decimal,
) -> SelectionResult {
    SelectionResult {
        selected_provider: provider,
        selection_reason: reason,
        selected_quote: Some(quote.clone()),
        all_providers_blocked: false,
        rate_difference_percent,
    }
}

/// Cache key for one routing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SelectionKey {
    pub stable_amount: U256,
    pub live_amount: U256,
    pub direction: Direction,
}

/// Inputs for one recomputation. The stable quotes drive the provider
/// choice; the live quotes supply the executable numbers for whichever
/// provider wins. Keeping the two apart stops the choice from flapping
/// while an amount is being edited.
#[derive(Debug, Clone)]
pub struct SelectionInputs {
    pub vault_state: ProviderState,
    pub pool_state: ProviderState,
    pub stable_vault_quote: Option<Quote>,
    pub stable_pool_quote: Option<Quote>,
    pub live_vault_quote: Option<Quote>,
    pub live_pool_quote: Option<Quote>,
}

/// Explicit recompute-on-input-change wrapper around `select_provider`,
/// memoized by `(stable_amount, live_amount, direction)`. `get` never
/// computes; `refresh` always does.
pub struct SelectionEngine {
    config: RateComparisonConfig,
    cache: Mutex<HashMap<SelectionKey, SelectionResult>>,
}

impl SelectionEngine {
    #[must_use]
    pub fn new(config: RateComparisonConfig) -> Self {
        Self {
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &RateComparisonConfig {
        &self.config
    }

    /// Last computed result for `key`, if any.
    #[must_use]
    pub fn get(&self, key: &SelectionKey) -> Option<SelectionResult> {
        self.cache.lock().ok()?.get(key).cloned()
    }

    /// Recomputes the decision for `key` and caches it.
    pub fn refresh(&self, key: SelectionKey, inputs: &SelectionInputs) -> SelectionResult {
        let mut result = select_provider(
            &inputs.vault_state,
            &inputs.pool_state,
            inputs.stable_vault_quote.as_ref(),
            inputs.stable_pool_quote.as_ref(),
            &self.config,
            key.direction,
        );

        // The executed quote follows the live amount, not the stable one
        // the choice was made with.
        if !result.all_providers_blocked {
            let live = match result.selected_provider {
                ProviderKind::Vault => inputs.live_vault_quote.as_ref(),
                ProviderKind::CurvePool => inputs.live_pool_quote.as_ref(),
            };
            if let Some(quote) = live {
                result.selected_quote = Some(quote.clone());
            }
        }

        debug!(
            provider = ?result.selected_provider,
            reason = ?result.selection_reason,
            diff = %result.rate_difference_percent,
            "Selection refreshed"
        );

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, result.clone());
        }
        result
    }

    pub fn invalidate(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BlockedReason;
    use crate::rates::WAD;
    use std::str::FromStr;

    fn wad(n: u64) -> U256 {
        U256::from(n) * WAD
    }

    fn quote(provider: ProviderKind, input: u64, output: u64) -> Quote {
        Quote {
            provider,
            input_amount: wad(input),
            output_amount: wad(output),
            effective_rate: rates::effective_rate(wad(input), wad(output)),
            fee_amount: U256::zero(),
            estimated_slippage_bps: 0,
            price_impact_bps: 0,
            is_valid: true,
            invalid_reason: None,
        }
    }

    fn config() -> RateComparisonConfig {
        RateComparisonConfig {
            rate_switch_threshold_bps: 10,
            max_slippage_bps: 50,
            max_price_impact_bps: 100,
        }
    }

    fn open(provider: ProviderKind) -> ProviderState {
        ProviderState::available(provider)
    }

    #[test]
    fn all_blocked_when_neither_side_serves_the_direction() {
        let vault = ProviderState::blocked(
            ProviderKind::Vault,
            Direction::Deposit,
            BlockedReason::CapacityReached,
        );
        let pool = ProviderState::blocked(
            ProviderKind::CurvePool,
            Direction::Deposit,
            BlockedReason::InsufficientPoolLiquidity,
        );

        let result = select_provider(&vault, &pool, None, None, &config(), Direction::Deposit);

        assert!(result.all_providers_blocked);
        assert_eq!(result.selection_reason, SelectionReason::AllBlocked);
        assert_eq!(result.selected_provider, ProviderKind::Vault);
        assert!(result.selected_quote.is_none());
        assert_eq!(result.rate_difference_percent, Decimal::ZERO);
    }

    #[test]
    fn blocked_vault_routes_to_pool_regardless_of_rates() {
        let vault = ProviderState::blocked(
            ProviderKind::Vault,
            Direction::Deposit,
            BlockedReason::CapacityReached,
        );
        let pool = open(ProviderKind::CurvePool);

        // Vault quote is far better; availability still wins.
        let vault_quote = quote(ProviderKind::Vault, 100, 200);
        let pool_quote = quote(ProviderKind::CurvePool, 100, 99);

        let result = select_provider(
            &vault,
            &pool,
            Some(&vault_quote),
            Some(&pool_quote),
            &config(),
            Direction::Deposit,
        );

        assert_eq!(result.selected_provider, ProviderKind::CurvePool);
        assert_eq!(result.selection_reason, SelectionReason::PoolOnlyAvailable);
        assert!(!result.all_providers_blocked);
    }

    #[test]
    fn blocked_pool_routes_to_vault() {
        let vault = open(ProviderKind::Vault);
        let pool = ProviderState::blocked(
            ProviderKind::CurvePool,
            Direction::Withdraw,
            BlockedReason::InsufficientPoolLiquidity,
        );

        let result = select_provider(
            &vault,
            &pool,
            Some(&quote(ProviderKind::Vault, 100, 100)),
            None,
            &config(),
            Direction::Withdraw,
        );

        assert_eq!(result.selected_provider, ProviderKind::Vault);
        assert_eq!(result.selection_reason, SelectionReason::VaultOnlyAvailable);
    }

    #[test]
    fn sub_threshold_pool_advantage_keeps_the_vault() {
        // Pool is 0.05% better, threshold is 0.1%.
        let vault_quote = quote(ProviderKind::Vault, 10_000, 10_000);
        let pool_quote = quote(ProviderKind::CurvePool, 10_000, 10_005);

        let result = select_provider(
            &open(ProviderKind::Vault),
            &open(ProviderKind::CurvePool),
            Some(&vault_quote),
            Some(&pool_quote),
            &config(),
            Direction::Deposit,
        );

        assert_eq!(result.selected_provider, ProviderKind::Vault);
        assert_eq!(result.selection_reason, SelectionReason::VaultDefault);
        assert_eq!(
            result.rate_difference_percent,
            Decimal::from_str("0.05").unwrap()
        );
    }

    #[test]
    fn significant_pool_advantage_switches_the_route() {
        // Pool is 0.2% better, threshold is 0.1%.
        let vault_quote = quote(ProviderKind::Vault, 10_000, 10_000);
        let pool_quote = quote(ProviderKind::CurvePool, 10_000, 10_020);

        let result = select_provider(
            &open(ProviderKind::Vault),
            &open(ProviderKind::CurvePool),
            Some(&vault_quote),
            Some(&pool_quote),
            &config(),
            Direction::Deposit,
        );

        assert_eq!(result.selected_provider, ProviderKind::CurvePool);
        assert_eq!(result.selection_reason, SelectionReason::PoolBetterRate);
        assert_eq!(
            result.rate_difference_percent,
            Decimal::from_str("0.2").unwrap()
        );
    }

    #[test]
    fn significant_vault_advantage_names_the_vault() {
        let vault_quote = quote(ProviderKind::Vault, 10_000, 10_050);
        let pool_quote = quote(ProviderKind::CurvePool, 10_000, 10_000);

        let result = select_provider(
            &open(ProviderKind::Vault),
            &open(ProviderKind::CurvePool),
            Some(&vault_quote),
            Some(&pool_quote),
            &config(),
            Direction::Deposit,
        );

        assert_eq!(result.selected_provider, ProviderKind::Vault);
        assert_eq!(result.selection_reason, SelectionReason::VaultBetterRate);
    }

    #[test]
    fn zero_output_loses_to_any_nonzero_output() {
        let mut vault_quote = quote(ProviderKind::Vault, 10_000, 0);
        vault_quote.effective_rate = U256::zero();
        let pool_quote = quote(ProviderKind::CurvePool, 10_000, 9_000);

        let result = select_provider(
            &open(ProviderKind::Vault),
            &open(ProviderKind::CurvePool),
            Some(&vault_quote),
            Some(&pool_quote),
            &config(),
            Direction::Deposit,
        );

        assert_eq!(result.selected_provider, ProviderKind::CurvePool);
        assert_eq!(result.rate_difference_percent, Decimal::from(100));
    }

    #[test]
    fn invalid_quote_never_wins() {
        let vault_quote = quote(ProviderKind::Vault, 10_000, 10_000);
        let mut pool_quote = quote(ProviderKind::CurvePool, 10_000, 10_500);
        pool_quote.is_valid = false;
        pool_quote.invalid_reason = Some("price impact 150 bps exceeds maximum 100 bps".into());

        let result = select_provider(
            &open(ProviderKind::Vault),
            &open(ProviderKind::CurvePool),
            Some(&vault_quote),
            Some(&pool_quote),
            &config(),
            Direction::Deposit,
        );

        assert_eq!(result.selected_provider, ProviderKind::Vault);
        assert_eq!(result.selection_reason, SelectionReason::VaultBetterRate);
    }

    #[test]
    fn missing_quote_defaults_to_vault() {
        let result = select_provider(
            &open(ProviderKind::Vault),
            &open(ProviderKind::CurvePool),
            None,
            Some(&quote(ProviderKind::CurvePool, 100, 101)),
            &config(),
            Direction::Deposit,
        );

        assert_eq!(result.selected_provider, ProviderKind::Vault);
        assert_eq!(result.selection_reason, SelectionReason::VaultDefault);
    }

    #[test]
    fn engine_memoizes_by_key_and_swaps_in_live_quote() {
        let engine = SelectionEngine::new(config());
        let key = SelectionKey {
            stable_amount: wad(10_000),
            live_amount: wad(12_345),
            direction: Direction::Deposit,
        };

        assert!(engine.get(&key).is_none());

        let inputs = SelectionInputs {
            vault_state: open(ProviderKind::Vault),
            pool_state: open(ProviderKind::CurvePool),
            stable_vault_quote: Some(quote(ProviderKind::Vault, 10_000, 10_000)),
            stable_pool_quote: Some(quote(ProviderKind::CurvePool, 10_000, 10_020)),
            live_vault_quote: Some(quote(ProviderKind::Vault, 12_345, 12_345)),
            live_pool_quote: Some(quote(ProviderKind::CurvePool, 12_345, 12_369)),
        };

        let result = engine.refresh(key, &inputs);

        // Choice from the stable quotes, executable numbers from the live
        // ones.
        assert_eq!(result.selected_provider, ProviderKind::CurvePool);
        let executed = result.selected_quote.unwrap();
        assert_eq!(executed.input_amount, wad(12_345));

        let cached = engine.get(&key).unwrap();
        assert_eq!(cached.selected_provider, ProviderKind::CurvePool);

        engine.invalidate();
        assert!(engine.get(&key).is_none());
    }
}
