/*
 * Curve USDS/stUSDS pool client
 *
 * External AMM path. Token indices are resolved from the pool's own coin
 * registry at construction, never assumed. Price impact is measured against
 * a mid-market reference derived from 1-unit quotes in both directions.
 */

use async_trait::async_trait;
use ethers::abi::Token;
use ethers::types::{Address, U256};
use std::sync::Arc;

use crate::config::ContractAddresses;
use crate::models::{
    BlockedReason, Direction, JanusError, ProviderKind, ProviderState, ProviderStatus, Quote,
    QuoteOutcome, RateComparisonConfig, Result,
};
use crate::providers::LiquidityProvider;
use crate::rates::{self, BPS_DENOMINATOR, WAD};
use crate::rpc::RpcClient;
use crate::utils::encode_call;

/// Curve pools express `fee()` with a 1e10 denominator.
const FEE_DENOMINATOR: u64 = 10_000_000_000;

pub struct CurvePoolClient {
    rpc: Arc<RpcClient>,
    pool: Address,
    usds_index: usize,
    stusds_index: usize,
    comparison: RateComparisonConfig,
    capacity_buffer_bps: u32,
}

impl CurvePoolClient {
    pub async fn new(
        rpc: Arc<RpcClient>,
        contracts: ContractAddresses,
        comparison: RateComparisonConfig,
        capacity_buffer_bps: u32,
    ) -> Result<Self> {
        let pool = contracts.curve_pool;
        let coin0 = Self::read_coin(&rpc, pool, 0).await?;
        let coin1 = Self::read_coin(&rpc, pool, 1).await?;
        let (usds_index, stusds_index) =
            match_indices(&[coin0, coin1], contracts.usds, contracts.stusds_vault)?;

        Ok(Self {
            rpc,
            pool,
            usds_index,
            stusds_index,
            comparison,
            capacity_buffer_bps,
        })
    }

    async fn read_coin(rpc: &RpcClient, pool: Address, index: usize) -> Result<Address> {
        let data = encode_call("coins(uint256)", &[Token::Uint(U256::from(index))]);
        let result = rpc.call(pool, data).await?;
        if result.len() < 32 {
            return Err(JanusError::ContractError(format!(
                "Invalid coins({index}) response - insufficient data"
            )));
        }
        Ok(Address::from_slice(&result[12..32]))
    }

    async fn read_u256(&self, call_data: Vec<u8>, what: &str) -> Result<U256> {
        let result = self.rpc.call(self.pool, call_data).await?;
        if result.len() < 32 {
            return Err(JanusError::ContractError(format!(
                "Invalid {what} response - insufficient data"
            )));
        }
        Ok(U256::from_big_endian(&result[0..32]))
    }

    /// Forward quote: output of coin `j` for `dx` of coin `i`.
    pub async fn get_dy(&self, i: usize, j: usize, dx: U256) -> Result<U256> {
        let data = encode_call(
            "get_dy(int128,int128,uint256)",
            &[
                Token::Int(U256::from(i)),
                Token::Int(U256::from(j)),
                Token::Uint(dx),
            ],
        );
        self.read_u256(data, "get_dy").await
    }

    /// Inverse quote: input of coin `i` required for `dy` of coin `j`.
    pub async fn get_dx(&self, i: usize, j: usize, dy: U256) -> Result<U256> {
        let data = encode_call(
            "get_dx(int128,int128,uint256)",
            &[
                Token::Int(U256::from(i)),
                Token::Int(U256::from(j)),
                Token::Uint(dy),
            ],
        );
        self.read_u256(data, "get_dx").await
    }

    pub async fn balance(&self, index: usize) -> Result<U256> {
        let data = encode_call("balances(uint256)", &[Token::Uint(U256::from(index))]);
        self.read_u256(data, "balances").await
    }

    pub async fn fee(&self) -> Result<U256> {
        let data = encode_call("fee()", &[]);
        self.read_u256(data, "fee").await
    }

    #[must_use]
    pub fn token_indices(&self) -> (usize, usize) {
        (self.usds_index, self.stusds_index)
    }

    /// Mid-market stUSDS-per-USDS rate (wad), averaged from a 1-unit quote
    /// in each direction. `None` when either side quotes zero.
    pub async fn mid_market_rate(&self) -> Result<Option<U256>> {
        let buy = self
            .get_dy(self.usds_index, self.stusds_index, WAD)
            .await?;
        let sell = self
            .get_dy(self.stusds_index, self.usds_index, WAD)
            .await?;

        if buy.is_zero() || sell.is_zero() {
            return Ok(None);
        }

        let inverse_sell = WAD * WAD / sell;
        Ok(Some((buy + inverse_sell) / 2))
    }

    fn build_quote(
        &self,
        input_amount: U256,
        output_amount: U256,
        fee_amount: U256,
        price_impact_bps: u32,
    ) -> Quote {
        let exceeds_impact = price_impact_bps > self.comparison.max_price_impact_bps;
        Quote {
            provider: ProviderKind::CurvePool,
            input_amount,
            output_amount,
            effective_rate: rates::effective_rate(input_amount, output_amount),
            fee_amount,
            estimated_slippage_bps: self.comparison.max_slippage_bps,
            price_impact_bps,
            is_valid: !exceeds_impact,
            invalid_reason: exceeds_impact.then(|| {
                format!(
                    "price impact {price_impact_bps} bps exceeds maximum {} bps",
                    self.comparison.max_price_impact_bps
                )
            }),
        }
    }
}

/// Matches the pool's coin addresses against the expected tokens. The pool
/// decides the ordering; hard-coding 0/1 is how routers strand funds.
pub fn match_indices(
    coins: &[Address],
    usds: Address,
    stusds: Address,
) -> Result<(usize, usize)> {
    let usds_index = coins.iter().position(|c| *c == usds).ok_or_else(|| {
        JanusError::ContractError(format!("Pool does not contain expected USDS token {usds:?}"))
    })?;
    let stusds_index = coins.iter().position(|c| *c == stusds).ok_or_else(|| {
        JanusError::ContractError(format!(
            "Pool does not contain expected stUSDS token {stusds:?}"
        ))
    })?;
    Ok((usds_index, stusds_index))
}

/// Degradation of a realized output below the reference expectation, in
/// basis points. Zero when the reference is unavailable.
#[must_use]
pub fn output_impact_bps(expected_out: U256, actual_out: U256) -> u32 {
    if expected_out.is_zero() || actual_out >= expected_out {
        return 0;
    }
    let impact = (expected_out - actual_out) * U256::from(BPS_DENOMINATOR) / expected_out;
    u32::try_from(impact).unwrap_or(u32::MAX)
}

/// Excess of a required input above the reference expectation, in basis
/// points.
#[must_use]
pub fn input_impact_bps(expected_in: U256, actual_in: U256) -> u32 {
    if expected_in.is_zero() || actual_in <= expected_in {
        return 0;
    }
    let impact = (actual_in - expected_in) * U256::from(BPS_DENOMINATOR) / expected_in;
    u32::try_from(impact).unwrap_or(u32::MAX)
}

#[async_trait]
impl LiquidityProvider for CurvePoolClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::CurvePool
    }

    async fn quote(&self, amount: U256, direction: Direction) -> Result<QuoteOutcome> {
        if amount.is_zero() {
            return Ok(QuoteOutcome::Pending);
        }

        let fee = self.fee().await?;
        let mid = self.mid_market_rate().await?;

        match direction {
            Direction::Deposit => {
                let dy = self
                    .get_dy(self.usds_index, self.stusds_index, amount)
                    .await?;
                if dy.is_zero() {
                    return Ok(QuoteOutcome::Ready(Quote::invalid(
                        ProviderKind::CurvePool,
                        amount,
                        "pool returned zero output",
                    )));
                }
                let impact = match mid {
                    Some(rate) => output_impact_bps(amount * rate / WAD, dy),
                    None => 0,
                };
                let fee_amount = dy * fee / U256::from(FEE_DENOMINATOR);
                Ok(QuoteOutcome::Ready(
                    self.build_quote(amount, dy, fee_amount, impact),
                ))
            }
            Direction::Withdraw => {
                let dx = self
                    .get_dx(self.stusds_index, self.usds_index, amount)
                    .await?;
                if dx.is_zero() {
                    return Ok(QuoteOutcome::Ready(Quote::invalid(
                        ProviderKind::CurvePool,
                        U256::zero(),
                        "pool returned zero required input",
                    )));
                }
                let impact = match mid {
                    Some(rate) => input_impact_bps(amount * rate / WAD, dx),
                    None => 0,
                };
                let fee_amount = amount * fee / U256::from(FEE_DENOMINATOR);
                Ok(QuoteOutcome::Ready(
                    self.build_quote(dx, amount, fee_amount, impact),
                ))
            }
        }
    }

    async fn state(&self, amount: U256, direction: Direction) -> Result<ProviderState> {
        let (in_index, out_index) = match direction {
            Direction::Deposit => (self.usds_index, self.stusds_index),
            Direction::Withdraw => (self.stusds_index, self.usds_index),
        };

        let in_balance = self.balance(in_index).await?;
        let out_balance = self.balance(out_index).await?;

        if in_balance.is_zero() || out_balance.is_zero() {
            return Ok(ProviderState::blocked(
                ProviderKind::CurvePool,
                direction,
                BlockedReason::InsufficientPoolLiquidity,
            ));
        }

        // The USDS leg of the request is an upper bound on the out-side
        // amount at near-parity rates, so it serves as the liquidity probe.
        let headroom = rates::apply_buffer(out_balance, self.capacity_buffer_bps);
        if amount > headroom {
            return Ok(ProviderState::blocked(
                ProviderKind::CurvePool,
                direction,
                BlockedReason::InsufficientPoolLiquidity,
            ));
        }

        Ok(ProviderState {
            provider: ProviderKind::CurvePool,
            status: ProviderStatus::Available,
            can_deposit: true,
            can_withdraw: true,
            max_deposit: None,
            max_withdraw: None,
            blocked_reason: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::from_low_u64_be(u64::from(n))
    }

    #[test]
    fn indices_follow_pool_ordering() {
        let usds = addr(1);
        let stusds = addr(2);

        let (i, j) = match_indices(&[usds, stusds], usds, stusds).unwrap();
        assert_eq!((i, j), (0, 1));

        let (i, j) = match_indices(&[stusds, usds], usds, stusds).unwrap();
        assert_eq!((i, j), (1, 0));
    }

    #[test]
    fn indices_reject_foreign_pool() {
        let err = match_indices(&[addr(7), addr(8)], addr(1), addr(2));
        assert!(err.is_err());
    }

    #[test]
    fn output_impact_measures_shortfall() {
        let expected = U256::from(10_000u64);
        assert_eq!(output_impact_bps(expected, U256::from(9_900u64)), 100);
        assert_eq!(output_impact_bps(expected, expected), 0);
        assert_eq!(output_impact_bps(expected, U256::from(10_100u64)), 0);
    }

    #[test]
    fn input_impact_measures_excess() {
        let expected = U256::from(10_000u64);
        assert_eq!(input_impact_bps(expected, U256::from(10_200u64)), 200);
        assert_eq!(input_impact_bps(expected, expected), 0);
        assert_eq!(input_impact_bps(U256::zero(), U256::from(5u64)), 0);
    }

    #[test]
    fn impact_zero_when_reference_missing() {
        // Mirrors the adapter behavior: no mid-market rate, impact reported
        // as zero rather than inferred.
        let mid: Option<U256> = None;
        let impact = match mid {
            Some(rate) => output_impact_bps(U256::from(100u64) * rate / WAD, U256::from(90u64)),
            None => 0,
        };
        assert_eq!(impact, 0);
    }

    #[test]
    fn fee_denominator_matches_curve_convention() {
        // 0.04% pool fee on a wad output.
        let fee = U256::from(4_000_000u64);
        let out = U256::exp10(18);
        let fee_amount = out * fee / U256::from(FEE_DENOMINATOR);
        assert_eq!(fee_amount, U256::from(400_000_000_000_000u64));
    }
}
