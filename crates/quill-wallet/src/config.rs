//! Wallet configuration loaded from environment variables.

use quill_core::address::Network;

use crate::builder::MAX_FEE_ITERATIONS;
use crate::coin_selection::SelectionStrategy;
use crate::error::WalletError;
use crate::fee::{LinearFee, DEFAULT_FEE_COEFFICIENT_MILLI, DEFAULT_FEE_CONSTANT};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalletConfig {
    /// Network new addresses are encoded for.
    pub network: Network,
    /// Fee policy used when building transactions.
    pub fee: LinearFee,
    /// Cap on fee/change recomputation rounds.
    pub max_fee_iterations: usize,
    pub selection: SelectionStrategy,
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            network: Network::Mainnet,
            fee: LinearFee::default(),
            max_fee_iterations: MAX_FEE_ITERATIONS,
            selection: SelectionStrategy::default(),
            log_filter: "info".to_string(),
        }
    }
}

impl WalletConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `QUILL_NETWORK` | `mainnet` |
    /// | `QUILL_FEE_CONSTANT` | `155381` |
    /// | `QUILL_FEE_COEFFICIENT_MILLI` | `43946` |
    /// | `QUILL_MAX_FEE_ITERATIONS` | `8` |
    /// | `QUILL_SELECTION` | `first-match` |
    /// | `QUILL_LOG` | `info` |
    pub fn from_env() -> Result<Self, WalletError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, WalletError> {
        let network = match lookup("QUILL_NETWORK") {
            Some(name) => Network::from_name(&name)
                .ok_or_else(|| WalletError::Config(format!("QUILL_NETWORK: unknown network {name:?}")))?,
            None => Network::Mainnet,
        };

        let constant = parse_u64(&lookup, "QUILL_FEE_CONSTANT", DEFAULT_FEE_CONSTANT)?;
        let coefficient_milli = parse_u64(
            &lookup,
            "QUILL_FEE_COEFFICIENT_MILLI",
            DEFAULT_FEE_COEFFICIENT_MILLI,
        )?;

        let max_fee_iterations =
            parse_u64(&lookup, "QUILL_MAX_FEE_ITERATIONS", MAX_FEE_ITERATIONS as u64)? as usize;
        if max_fee_iterations == 0 {
            return Err(WalletError::Config(
                "QUILL_MAX_FEE_ITERATIONS must be at least 1".to_string(),
            ));
        }

        let selection = match lookup("QUILL_SELECTION") {
            Some(name) => SelectionStrategy::from_name(&name).ok_or_else(|| {
                WalletError::Config(format!("QUILL_SELECTION: unknown strategy {name:?}"))
            })?,
            None => SelectionStrategy::default(),
        };

        let log_filter = lookup("QUILL_LOG").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            network,
            fee: LinearFee::new(constant, coefficient_milli),
            max_fee_iterations,
            selection,
            log_filter,
        })
    }
}

fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<u64, WalletError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| WalletError::Config(format!("{key} must be a non-negative integer, got {raw:?}"))),
        None => Ok(default),
    }
}
