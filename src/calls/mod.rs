/*
 * Call-list builders
 *
 * Turns a routing decision into the ordered contract calls that realize it:
 * an ERC-20 approval when the standing allowance is short, followed by the
 * vault or pool operation. A list of calls is the unit of work for the
 * transaction flows.
 */

use ethers::abi::Token;
use ethers::types::{Address, Bytes, U256};

use crate::config::ContractAddresses;
use crate::models::{Direction, ProviderKind, Quote};
use crate::rates;
use crate::utils::encode_call;

/// A single pending contract invocation. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub target: Address,
    pub calldata: Bytes,
    pub value: U256,
}

impl Call {
    #[must_use]
    pub fn new(target: Address, calldata: Vec<u8>) -> Self {
        Self {
            target,
            calldata: Bytes::from(calldata),
            value: U256::zero(),
        }
    }
}

pub struct CallPlanner {
    contracts: ContractAddresses,
    max_slippage_bps: u32,
}

impl CallPlanner {
    #[must_use]
    pub fn new(contracts: ContractAddresses, max_slippage_bps: u32) -> Self {
        Self {
            contracts,
            max_slippage_bps,
        }
    }

    /// Builds the call list for an already-selected provider and quote.
    /// `allowance` is the owner's standing ERC-20 allowance towards the
    /// target contract; `pool_indices` is `(usds, stusds)` as resolved from
    /// the pool.
    #[must_use]
    pub fn plan(
        &self,
        provider: ProviderKind,
        direction: Direction,
        quote: &Quote,
        owner: Address,
        allowance: U256,
        pool_indices: (usize, usize),
    ) -> Vec<Call> {
        match (provider, direction) {
            (ProviderKind::Vault, Direction::Deposit) => {
                self.deposit_via_vault(owner, quote.input_amount, allowance)
            }
            (ProviderKind::Vault, Direction::Withdraw) => {
                self.withdraw_via_vault(owner, quote.output_amount)
            }
            (ProviderKind::CurvePool, Direction::Deposit) => self.swap_via_pool(
                pool_indices.0,
                pool_indices.1,
                quote.input_amount,
                quote.output_amount,
                allowance,
                self.contracts.usds,
            ),
            (ProviderKind::CurvePool, Direction::Withdraw) => self.swap_via_pool(
                pool_indices.1,
                pool_indices.0,
                quote.input_amount,
                quote.output_amount,
                allowance,
                self.contracts.stusds_vault,
            ),
        }
    }

    #[must_use]
    pub fn deposit_via_vault(&self, owner: Address, assets: U256, allowance: U256) -> Vec<Call> {
        let mut calls = Vec::new();
        if allowance < assets {
            calls.push(self.approve(self.contracts.usds, self.contracts.stusds_vault, assets));
        }
        calls.push(Call::new(
            self.contracts.stusds_vault,
            encode_call(
                "deposit(uint256,address)",
                &[Token::Uint(assets), Token::Address(owner)],
            ),
        ));
        calls
    }

    /// Withdrawing burns the owner's own shares; no approval is involved.
    #[must_use]
    pub fn withdraw_via_vault(&self, owner: Address, assets: U256) -> Vec<Call> {
        vec![Call::new(
            self.contracts.stusds_vault,
            encode_call(
                "withdraw(uint256,address,address)",
                &[
                    Token::Uint(assets),
                    Token::Address(owner),
                    Token::Address(owner),
                ],
            ),
        )]
    }

    fn swap_via_pool(
        &self,
        in_index: usize,
        out_index: usize,
        amount_in: U256,
        expected_out: U256,
        allowance: U256,
        sell_token: Address,
    ) -> Vec<Call> {
        let mut calls = Vec::new();
        if allowance < amount_in {
            calls.push(self.approve(sell_token, self.contracts.curve_pool, amount_in));
        }

        let min_out = rates::min_output_with_slippage(expected_out, self.max_slippage_bps);
        calls.push(Call::new(
            self.contracts.curve_pool,
            encode_call(
                "exchange(int128,int128,uint256,uint256)",
                &[
                    Token::Int(U256::from(in_index)),
                    Token::Int(U256::from(out_index)),
                    Token::Uint(amount_in),
                    Token::Uint(min_out),
                ],
            ),
        ));
        calls
    }

    fn approve(&self, token: Address, spender: Address, amount: U256) -> Call {
        Call::new(
            token,
            encode_call(
                "approve(address,uint256)",
                &[Token::Address(spender), Token::Uint(amount)],
            ),
        )
    }
}
