/*
 * Configuration management for the Janus service
 */

use crate::models::{JanusError, RateComparisonConfig, Result};
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub chain: ChainConfig,
    pub contracts: ContractAddresses,
    pub comparison: RateComparisonConfig,
    pub routing: RoutingConfig,
    pub reference: ReferenceConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub chain_id: u64,
}

/// Contract addresses for one chain. Resolved once at startup and handed to
/// the adapters at construction; nothing reads ambient globals.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ContractAddresses {
    pub usds: Address,
    pub stusds_vault: Address,
    pub curve_pool: Address,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoutingConfig {
    /// Headroom window for withdrawal-liquidity checks, in minutes.
    pub liquidity_buffer_minutes: i64,
    /// Safety margin applied to vault capacity and pool balances.
    pub capacity_buffer_bps: u32,
    pub default_amount_usds: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReferenceConfig {
    pub enabled: bool,
    pub source: RateSource,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RateSource {
    Sky,
    BlockAnalitica,
}

/// Built-in per-chain address defaults; any entry can be overridden through
/// the environment.
#[must_use]
pub fn builtin_address_book() -> HashMap<u64, ContractAddressBook> {
    let mut book = HashMap::new();
    book.insert(
        1,
        ContractAddressBook {
            usds: "0xdC035D45d973E3EC169d2276DDab16f1e407384F",
            stusds_vault: "0xa3931d71877C0E7a3148CB7Eb4463524FEc27fbD",
            curve_pool: "0x00836Fe54625BE242BcFA286C795e545aDDCbF7a",
        },
    );
    book.insert(
        8453,
        ContractAddressBook {
            usds: "0x820C137fa70C8691f0e44Dc420a5e53c168921Dc",
            stusds_vault: "0x5875eEE11Cf8398102FdAd704C9E96607675467a",
            curve_pool: "0x3E08e21Ee0c35Db95Bd0a17b34127aBba71f2e13",
        },
    );
    book
}

#[derive(Debug, Clone, Copy)]
pub struct ContractAddressBook {
    pub usds: &'static str,
    pub stusds_vault: &'static str,
    pub curve_pool: &'static str,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let chain_id = env_parse("CHAIN_ID", 1u64)?;
        let contracts = resolve_contracts(chain_id)?;

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_parse("SERVER_PORT", 8080u16)?,
                log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            },
            chain: ChainConfig {
                rpc_url: env::var("RPC_URL")
                    .map_err(|_| JanusError::ConfigError("RPC_URL not set".to_string()))?,
                chain_id,
            },
            contracts,
            comparison: RateComparisonConfig {
                rate_switch_threshold_bps: env_parse("RATE_SWITCH_THRESHOLD_BPS", 10u32)?,
                max_slippage_bps: env_parse("MAX_SLIPPAGE_BPS", 50u32)?,
                max_price_impact_bps: env_parse("MAX_PRICE_IMPACT_BPS", 100u32)?,
            },
            routing: RoutingConfig {
                liquidity_buffer_minutes: env_parse("LIQUIDITY_BUFFER_MINUTES", 5i64)?,
                capacity_buffer_bps: env_parse("CAPACITY_BUFFER_BPS", 10u32)?,
                default_amount_usds: env::var("DEFAULT_AMOUNT_USDS")
                    .unwrap_or_else(|_| "1000".to_string()),
            },
            reference: ReferenceConfig {
                enabled: env_parse("RATE_REFERENCE_ENABLED", true)?,
                source: env::var("RATE_REFERENCE_SOURCE")
                    .unwrap_or_else(|_| "sky".to_string())
                    .parse()
                    .unwrap_or(RateSource::Sky),
            },
        })
    }
}

fn resolve_contracts(chain_id: u64) -> Result<ContractAddresses> {
    let book = builtin_address_book();
    let defaults = book.get(&chain_id);

    let usds = env_address("USDS_ADDRESS", defaults.map(|d| d.usds), chain_id)?;
    let stusds_vault = env_address(
        "STUSDS_VAULT_ADDRESS",
        defaults.map(|d| d.stusds_vault),
        chain_id,
    )?;
    let curve_pool = env_address(
        "CURVE_POOL_ADDRESS",
        defaults.map(|d| d.curve_pool),
        chain_id,
    )?;

    Ok(ContractAddresses {
        usds,
        stusds_vault,
        curve_pool,
    })
}

fn env_address(var: &str, default: Option<&'static str>, chain_id: u64) -> Result<Address> {
    let raw = match env::var(var) {
        Ok(v) => v,
        Err(_) => default
            .ok_or_else(|| {
                JanusError::ConfigError(format!(
                    "{var} not set and no built-in default for chain {chain_id}"
                ))
            })?
            .to_string(),
    };

    raw.parse::<Address>()
        .map_err(|e| JanusError::ConfigError(format!("Invalid address in {var}: {e}")))
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(v) => v
            .parse()
            .map_err(|e| JanusError::ConfigError(format!("Invalid {var}: {e}"))),
        Err(_) => Ok(default),
    }
}

impl std::str::FromStr for RateSource {
    type Err = JanusError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sky" => Ok(RateSource::Sky),
            "blockanalitica" | "block_analitica" => Ok(RateSource::BlockAnalitica),
            _ => Err(JanusError::ConfigError(format!(
                "Unknown rate reference source: {s}"
            ))),
        }
    }
}
