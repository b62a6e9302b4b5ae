/*
 * Native stUSDS savings vault client
 *
 * ERC-4626-style preview/max reads. The vault path is deterministic at the
 * quoted block: no fee, no slippage, no price impact.
 */

use async_trait::async_trait;
use ethers::abi::Token;
use ethers::types::{Address, U256};
use std::sync::Arc;

use crate::config::{ContractAddresses, RoutingConfig};
use crate::models::{
    BlockedReason, Direction, JanusError, ProviderKind, ProviderState, ProviderStatus, Quote,
    QuoteOutcome, Result,
};
use crate::providers::LiquidityProvider;
use crate::rates;
use crate::rpc::RpcClient;
use crate::utils::encode_call;

pub struct SavingsVaultClient {
    rpc: Arc<RpcClient>,
    vault: Address,
    capacity_buffer_bps: u32,
    liquidity_buffer_minutes: i64,
}

impl SavingsVaultClient {
    #[must_use]
    pub fn new(rpc: Arc<RpcClient>, contracts: ContractAddresses, routing: &RoutingConfig) -> Self {
        Self {
            rpc,
            vault: contracts.stusds_vault,
            capacity_buffer_bps: routing.capacity_buffer_bps,
            liquidity_buffer_minutes: routing.liquidity_buffer_minutes,
        }
    }

    async fn read_u256(&self, call_data: Vec<u8>, what: &str) -> Result<U256> {
        let result = self.rpc.call(self.vault, call_data).await?;
        if result.len() < 32 {
            return Err(JanusError::ContractError(format!(
                "Invalid {what} response - insufficient data"
            )));
        }
        Ok(U256::from_big_endian(&result[0..32]))
    }

    /// Shares minted for depositing `assets` USDS.
    pub async fn preview_deposit(&self, assets: U256) -> Result<U256> {
        let data = encode_call("previewDeposit(uint256)", &[Token::Uint(assets)]);
        self.read_u256(data, "previewDeposit").await
    }

    /// Shares burned to withdraw exactly `assets` USDS.
    pub async fn preview_withdraw(&self, assets: U256) -> Result<U256> {
        let data = encode_call("previewWithdraw(uint256)", &[Token::Uint(assets)]);
        self.read_u256(data, "previewWithdraw").await
    }

    pub async fn max_deposit(&self) -> Result<U256> {
        let data = encode_call("maxDeposit(address)", &[Token::Address(Address::zero())]);
        self.read_u256(data, "maxDeposit").await
    }

    pub async fn max_withdraw(&self) -> Result<U256> {
        let data = encode_call("maxWithdraw(address)", &[Token::Address(Address::zero())]);
        self.read_u256(data, "maxWithdraw").await
    }

    /// Per-second savings rate as a wad fraction of principal. The contract
    /// reports a ray-scaled per-second compounding factor; anything at or
    /// below 1.0 maps to zero.
    pub async fn per_second_rate_wad(&self) -> Result<U256> {
        let ray = U256::exp10(27);
        let data = encode_call("ssr()", &[]);
        let ray_rate = self.read_u256(data, "ssr").await?;
        if ray_rate <= ray {
            return Ok(U256::zero());
        }
        Ok((ray_rate - ray) / U256::exp10(9))
    }
}

#[async_trait]
impl LiquidityProvider for SavingsVaultClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Vault
    }

    async fn quote(&self, amount: U256, direction: Direction) -> Result<QuoteOutcome> {
        if amount.is_zero() {
            return Ok(QuoteOutcome::Pending);
        }

        let (input_amount, output_amount) = match direction {
            Direction::Deposit => {
                let shares = self.preview_deposit(amount).await?;
                (amount, shares)
            }
            Direction::Withdraw => {
                let shares = self.preview_withdraw(amount).await?;
                (shares, amount)
            }
        };

        if output_amount.is_zero() || input_amount.is_zero() {
            return Ok(QuoteOutcome::Ready(Quote::invalid(
                ProviderKind::Vault,
                input_amount,
                "vault preview returned zero",
            )));
        }

        Ok(QuoteOutcome::Ready(Quote {
            provider: ProviderKind::Vault,
            input_amount,
            output_amount,
            effective_rate: rates::effective_rate(input_amount, output_amount),
            fee_amount: U256::zero(),
            estimated_slippage_bps: 0,
            price_impact_bps: 0,
            is_valid: true,
            invalid_reason: None,
        }))
    }

    async fn state(&self, amount: U256, direction: Direction) -> Result<ProviderState> {
        match direction {
            Direction::Deposit => {
                let max = self.max_deposit().await?;
                if max.is_zero() {
                    return Ok(ProviderState::blocked(
                        ProviderKind::Vault,
                        direction,
                        BlockedReason::CapacityReached,
                    ));
                }
                let headroom = rates::apply_buffer(max, self.capacity_buffer_bps);
                if amount > headroom {
                    let mut state = ProviderState::blocked(
                        ProviderKind::Vault,
                        direction,
                        BlockedReason::AmountExceedsCapacity,
                    );
                    state.max_deposit = Some(max);
                    return Ok(state);
                }
                Ok(ProviderState {
                    provider: ProviderKind::Vault,
                    status: ProviderStatus::Available,
                    can_deposit: true,
                    can_withdraw: true,
                    max_deposit: Some(max),
                    max_withdraw: None,
                    blocked_reason: None,
                })
            }
            Direction::Withdraw => {
                let max = self.max_withdraw().await?;
                if max.is_zero() {
                    return Ok(ProviderState::blocked(
                        ProviderKind::Vault,
                        direction,
                        BlockedReason::LiquidityExhausted,
                    ));
                }
                let rate = self.per_second_rate_wad().await.unwrap_or_default();
                let accrual =
                    rates::calculate_liquidity_buffer(amount, rate, self.liquidity_buffer_minutes);
                let headroom = rates::apply_buffer(max, self.capacity_buffer_bps);
                if amount + accrual > headroom {
                    let mut state = ProviderState::blocked(
                        ProviderKind::Vault,
                        direction,
                        BlockedReason::AmountExceedsLiquidity,
                    );
                    state.max_withdraw = Some(max);
                    return Ok(state);
                }
                Ok(ProviderState {
                    provider: ProviderKind::Vault,
                    status: ProviderStatus::Available,
                    can_deposit: true,
                    can_withdraw: true,
                    max_deposit: None,
                    max_withdraw: Some(max),
                    blocked_reason: None,
                })
            }
        }
    }
}
