//! Coin selection over caller-supplied UTXOs.
//!
//! Candidates are ordered by strategy and taken greedily. After each pick
//! the candidate set is run through the real builder with the caller's fee
//! policy, so a selection that is returned always finalizes.

use serde::{Deserialize, Serialize};
use tracing::trace;

use quill_core::address::Address;
use quill_core::types::{TxInput, TxOutput};

use crate::builder::TransactionBuilder;
use crate::error::WalletError;
use crate::fee::FeePolicy;

/// Order in which candidate UTXOs are tried.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionStrategy {
    /// Caller order.
    #[default]
    FirstMatch,
    /// Highest value first, ties in caller order.
    LargestFirst,
}

impl SelectionStrategy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "first-match" | "first" => Some(Self::FirstMatch),
            "largest-first" | "largest" => Some(Self::LargestFirst),
            _ => None,
        }
    }
}

/// Result of coin selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinSelection {
    /// Inputs to spend, in the order they should be added.
    pub selected: Vec<TxInput>,
    /// Sum of the selected input values.
    pub total: u64,
    /// Fee the finalized transaction will pay.
    pub fee: u64,
    /// Value of the change output, zero if none.
    pub change: u64,
}

/// Greedy coin selector.
pub struct CoinSelector;

impl CoinSelector {
    /// Pick inputs from `available` that pay for `outputs` plus fee.
    pub fn select<P: FeePolicy + ?Sized>(
        available: &[TxInput],
        outputs: &[TxOutput],
        change_address: &Address,
        policy: &P,
        strategy: SelectionStrategy,
    ) -> Result<CoinSelection, WalletError> {
        if available.is_empty() {
            return Err(WalletError::NoUtxos);
        }
        if outputs.is_empty() {
            return Err(WalletError::EmptyInputsOrOutputs);
        }

        let mut candidates: Vec<TxInput> = Vec::with_capacity(available.len());
        for input in available {
            // Duplicates would be rejected by the builder; keep the first.
            if input.value > 0 && !candidates.iter().any(|c| c.utxo == input.utxo) {
                candidates.push(*input);
            }
        }
        if strategy == SelectionStrategy::LargestFirst {
            candidates.sort_by(|a, b| b.value.cmp(&a.value));
        }

        let target = outputs
            .iter()
            .try_fold(0u64, |acc, o| acc.checked_add(o.value))
            .ok_or(WalletError::ValueOverflow)?;

        let mut selected: Vec<TxInput> = Vec::new();
        let mut total: u64 = 0;
        let mut need = target;

        for candidate in candidates {
            selected.push(candidate);
            total = total
                .checked_add(candidate.value)
                .ok_or(WalletError::ValueOverflow)?;
            if total < target {
                continue;
            }

            let mut builder = TransactionBuilder::new();
            for input in &selected {
                builder.add_input(input.utxo, input.value)?;
            }
            for output in outputs {
                builder.add_output(output.clone())?;
            }
            builder.set_change_address(change_address.clone());

            match builder.finalize(policy) {
                Ok(skeleton) => {
                    let change = skeleton.change_output().map_or(0, |o| o.value);
                    trace!(
                        selected = selected.len(),
                        total,
                        fee = skeleton.fee(),
                        change,
                        "coin_selection: satisfied"
                    );
                    return Ok(CoinSelection {
                        selected,
                        total,
                        fee: skeleton.fee(),
                        change,
                    });
                }
                Err(WalletError::InsufficientFunds { need: shortfall, .. }) => need = shortfall,
                Err(e) => return Err(e),
            }
        }

        Err(WalletError::InsufficientFunds { have: total, need })
    }
}
