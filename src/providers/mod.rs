/*
 * Liquidity provider integration module for the stUSDS vault and Curve pool
 */

pub mod curve;
pub mod vault;

use async_trait::async_trait;
use ethers::types::U256;

use crate::models::{Direction, ProviderKind, ProviderState, QuoteOutcome, Result};

pub use curve::CurvePoolClient;
pub use vault::SavingsVaultClient;

/// One side of the dual-provider route. Implementations are thin wrappers
/// around read-only chain calls; they never submit transactions.
#[async_trait]
pub trait LiquidityProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Prices `amount` through this provider. For deposits `amount` is the
    /// USDS paid in; for withdrawals it is the USDS the caller wants out.
    /// Zero amounts yield `Pending`; a completed read with zero output
    /// yields an invalid quote so callers can tell the two apart.
    async fn quote(&self, amount: U256, direction: Direction) -> Result<QuoteOutcome>;

    /// Availability snapshot for `amount` in `direction`.
    async fn state(&self, amount: U256, direction: Direction) -> Result<ProviderState>;
}
