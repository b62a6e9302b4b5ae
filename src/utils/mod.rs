/*
 * Utility functions and helpers
 */

use crate::models::{JanusError, Result};
use ethers::abi::{encode, Token};
use ethers::types::U256;
use ethers::utils::keccak256;

/// Builds calldata for a function call: 4-byte keccak selector of the
/// canonical signature followed by the ABI-encoded parameters.
#[must_use]
pub fn encode_call(signature: &str, params: &[Token]) -> Vec<u8> {
    let selector = &keccak256(signature.as_bytes())[0..4];
    let mut call_data = Vec::from(selector);
    call_data.extend_from_slice(&encode(params));
    call_data
}

/// Parses a human decimal string ("1000", "12.5") into 18-decimal base
/// units.
pub fn parse_wad(amount: &str) -> Result<U256> {
    let parsed = ethers::utils::parse_units(amount, 18)
        .map_err(|e| JanusError::CalculationError(format!("Invalid amount '{amount}': {e}")))?;
    Ok(parsed.into())
}

/// Formats 18-decimal base units back into a human decimal string.
pub fn format_wad(amount: U256) -> Result<String> {
    ethers::utils::format_units(amount, 18)
        .map_err(|e| JanusError::CalculationError(format!("Failed to format amount: {e}")))
}
