/*
 * Data models and types for the savings routing service
 */

use chrono::{DateTime, Utc};
use ethers::types::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderKind {
    Vault,
    CurvePool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Deposit,
    Withdraw,
}

impl std::str::FromStr for Direction {
    type Err = JanusError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "deposit" => Ok(Direction::Deposit),
            "withdraw" => Ok(Direction::Withdraw),
            _ => Err(JanusError::ConfigError(format!("Unknown direction: {s}"))),
        }
    }
}

/// Result of pricing one operation through one provider. Constructed fresh
/// on every quote request and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub provider: ProviderKind,
    pub input_amount: U256,
    pub output_amount: U256,
    pub effective_rate: U256,
    pub fee_amount: U256,
    pub estimated_slippage_bps: u32,
    pub price_impact_bps: u32,
    pub is_valid: bool,
    pub invalid_reason: Option<String>,
}

impl Quote {
    #[must_use]
    pub fn invalid(provider: ProviderKind, input_amount: U256, reason: &str) -> Self {
        Self {
            provider,
            input_amount,
            output_amount: U256::zero(),
            effective_rate: U256::zero(),
            fee_amount: U256::zero(),
            estimated_slippage_bps: 0,
            price_impact_bps: 0,
            is_valid: false,
            invalid_reason: Some(reason.to_string()),
        }
    }
}

/// Distinguishes "no quote yet" (zero amount, read still outstanding) from a
/// completed read that yielded a definitively unusable quote.
#[derive(Debug, Clone)]
pub enum QuoteOutcome {
    Pending,
    Ready(Quote),
}

impl QuoteOutcome {
    #[must_use]
    pub fn as_ready(&self) -> Option<&Quote> {
        match self {
            QuoteOutcome::Ready(q) => Some(q),
            QuoteOutcome::Pending => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderStatus {
    Available,
    Blocked,
    RateInferior,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockedReason {
    CapacityReached,
    LiquidityExhausted,
    AmountExceedsCapacity,
    AmountExceedsLiquidity,
    InsufficientPoolLiquidity,
}

/// Availability snapshot for one provider at one point in time.
///
/// Invariant: `status == Blocked` exactly when `blocked_reason` is set, and
/// exactly when the capability flag for the requested direction is false.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderState {
    pub provider: ProviderKind,
    pub status: ProviderStatus,
    pub can_deposit: bool,
    pub can_withdraw: bool,
    pub max_deposit: Option<U256>,
    pub max_withdraw: Option<U256>,
    pub blocked_reason: Option<BlockedReason>,
}

impl ProviderState {
    #[must_use]
    pub fn available(provider: ProviderKind) -> Self {
        Self {
            provider,
            status: ProviderStatus::Available,
            can_deposit: true,
            can_withdraw: true,
            max_deposit: None,
            max_withdraw: None,
            blocked_reason: None,
        }
    }

    #[must_use]
    pub fn blocked(provider: ProviderKind, direction: Direction, reason: BlockedReason) -> Self {
        Self {
            provider,
            status: ProviderStatus::Blocked,
            can_deposit: direction != Direction::Deposit,
            can_withdraw: direction != Direction::Withdraw,
            max_deposit: None,
            max_withdraw: None,
            blocked_reason: Some(reason),
        }
    }

    #[must_use]
    pub fn available_for(&self, direction: Direction) -> bool {
        match direction {
            Direction::Deposit => self.can_deposit,
            Direction::Withdraw => self.can_withdraw,
        }
    }
}

/// Policy constants for provider comparison.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateComparisonConfig {
    /// Minimum advantage (bps) the pool must show over the vault before it
    /// is preferred; the vault wins ties.
    pub rate_switch_threshold_bps: u32,
    pub max_slippage_bps: u32,
    pub max_price_impact_bps: u32,
}

impl Default for RateComparisonConfig {
    fn default() -> Self {
        Self {
            rate_switch_threshold_bps: 10,
            max_slippage_bps: 50,
            max_price_impact_bps: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectionReason {
    VaultOnlyAvailable,
    PoolOnlyAvailable,
    VaultBetterRate,
    PoolBetterRate,
    VaultDefault,
    AllBlocked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionResult {
    pub selected_provider: ProviderKind,
    pub selection_reason: SelectionReason,
    pub selected_quote: Option<Quote>,
    pub all_providers_blocked: bool,
    /// Positive means the pool offers the better rate.
    pub rate_difference_percent: Decimal,
}

/// Reference savings rate fetched from an analytics API, attached to route
/// decisions for display only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceRate {
    pub source: String,
    pub apy_percent: Decimal,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDecision {
    pub timestamp_utc: DateTime<Utc>,
    pub direction: Direction,
    pub stable_amount: U256,
    pub live_amount: U256,
    pub vault_quote: Option<Quote>,
    pub pool_quote: Option<Quote>,
    pub vault_state: ProviderState,
    pub pool_state: ProviderState,
    pub selection: SelectionResult,
    pub reference_rate: Option<ReferenceRate>,
}

#[derive(Debug, Error)]
pub enum JanusError {
    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("Contract interaction error: {0}")]
    ContractError(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Wallet error: {0}")]
    WalletError(String),

    #[error("Transaction flow error: {0}")]
    FlowError(String),

    #[error("Reference API error: {0}")]
    ReferenceApiError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

pub type Result<T> = std::result::Result<T, JanusError>;
