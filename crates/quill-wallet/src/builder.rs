//! Transaction builder: accumulate inputs and outputs, then balance.
//!
//! 1. Add outputs (address + value) and inputs (UTXO reference + claimed value)
//! 2. Optionally set a change address
//! 3. `finalize` with a fee policy, consuming the builder
//!
//! Finalizing computes the fee for the transaction without change. Any
//! surplus goes to a change output appended last, and since that output
//! grows the encoding the fee is recomputed until it stops moving. If it
//! moves down instead, the higher fee is kept.

use tracing::debug;

use quill_core::address::Address;
use quill_core::types::{TransactionSkeleton, TxInput, TxOutput, UtxoRef};

use crate::error::WalletError;
use crate::fee::{FeePolicy, TxShape};

/// Rounds of fee recomputation before giving up.
pub const MAX_FEE_ITERATIONS: usize = 8;

/// Accumulates inputs and outputs for a single transaction.
///
/// # Example
/// ```ignore
/// let mut builder = TransactionBuilder::new();
/// builder.add_input(utxo, 1_000_000)?;
/// builder.add_output(TxOutput { address, value: 600_000 })?;
/// builder.set_change_address(change);
/// let skeleton = builder.finalize(&LinearFee::default())?;
/// ```
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    inputs: Vec<TxInput>,
    outputs: Vec<TxOutput>,
    change_address: Option<Address>,
    max_fee_iterations: usize,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self {
            inputs: Vec::new(),
            outputs: Vec::new(),
            change_address: None,
            max_fee_iterations: MAX_FEE_ITERATIONS,
        }
    }

    /// Override the fee recomputation cap (default: [`MAX_FEE_ITERATIONS`]).
    pub fn with_max_fee_iterations(mut self, iterations: usize) -> Self {
        self.max_fee_iterations = iterations;
        self
    }

    /// Append an output. Zero-valued outputs are rejected.
    pub fn add_output(&mut self, output: TxOutput) -> Result<&mut Self, WalletError> {
        if output.value == 0 {
            return Err(WalletError::InvalidAmount(format!(
                "output to {} has zero value",
                output.address
            )));
        }
        self.outputs.push(output);
        Ok(self)
    }

    /// Append an input. The same `(txid, index)` may only be added once.
    pub fn add_input(&mut self, utxo: UtxoRef, value: u64) -> Result<&mut Self, WalletError> {
        if self.inputs.iter().any(|i| i.utxo == utxo) {
            return Err(WalletError::DuplicateInput(utxo.to_string()));
        }
        self.inputs.push(TxInput { utxo, value });
        Ok(self)
    }

    /// Set where change goes. Last write wins.
    pub fn set_change_address(&mut self, address: Address) -> &mut Self {
        self.change_address = Some(address);
        self
    }

    pub fn inputs(&self) -> &[TxInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TxOutput] {
        &self.outputs
    }

    pub fn change_address(&self) -> Option<&Address> {
        self.change_address.as_ref()
    }

    /// Balance the transaction under `policy` and produce the skeleton.
    pub fn finalize<P: FeePolicy + ?Sized>(
        self,
        policy: &P,
    ) -> Result<TransactionSkeleton, WalletError> {
        if self.inputs.is_empty() || self.outputs.is_empty() {
            return Err(WalletError::EmptyInputsOrOutputs);
        }

        let total_in = checked_sum(self.inputs.iter().map(|i| i.value))?;
        let total_out = checked_sum(self.outputs.iter().map(|o| o.value))?;

        let base_fee = policy.fee(&TxShape::of(&self.inputs, &self.outputs)?)?;
        let need = total_out
            .checked_add(base_fee)
            .ok_or(WalletError::ValueOverflow)?;
        if total_in < need {
            return Err(WalletError::InsufficientFunds {
                have: total_in,
                need,
            });
        }

        // Everything above the declared outputs is split between fee and change.
        let surplus = total_in - total_out;
        if surplus == base_fee {
            debug!(
                inputs = self.inputs.len(),
                outputs = self.outputs.len(),
                fee = base_fee,
                "builder: finalized without change"
            );
            return Ok(TransactionSkeleton::new(self.inputs, self.outputs, base_fee, None)?);
        }

        let change_address = self
            .change_address
            .ok_or(WalletError::MissingChangeAddress(surplus - base_fee))?;

        let mut outputs = self.outputs;
        let change_index = outputs.len();
        outputs.push(TxOutput {
            address: change_address,
            value: surplus - base_fee,
        });

        let mut fee = base_fee;
        for round in 1..=self.max_fee_iterations {
            outputs[change_index].value = surplus - fee;
            let next = policy.fee(&TxShape::of(&self.inputs, &outputs)?)?;

            if next >= surplus {
                // The change output cannot pay for itself; the surplus becomes fee.
                outputs.truncate(change_index);
                debug!(
                    inputs = self.inputs.len(),
                    outputs = outputs.len(),
                    fee = surplus,
                    round,
                    "builder: change absorbed into fee"
                );
                return Ok(TransactionSkeleton::new(self.inputs, outputs, surplus, None)?);
            }

            if next == fee {
                debug!(
                    inputs = self.inputs.len(),
                    outputs = outputs.len(),
                    fee,
                    change = surplus - fee,
                    round,
                    "builder: finalized with change"
                );
                return Ok(TransactionSkeleton::new(
                    self.inputs,
                    outputs,
                    fee,
                    Some(change_index),
                )?);
            }

            if next < fee {
                // Smaller change made the shape cheaper. Paying the larger fee still
                // covers it, while shrinking the change again would only flip back.
                debug!(
                    inputs = self.inputs.len(),
                    outputs = outputs.len(),
                    fee,
                    charged = next,
                    change = surplus - fee,
                    round,
                    "builder: settled on higher fee"
                );
                return Ok(TransactionSkeleton::new(
                    self.inputs,
                    outputs,
                    fee,
                    Some(change_index),
                )?);
            }
            fee = next;
        }

        Err(WalletError::FeeCalculationDidNotConverge {
            iterations: self.max_fee_iterations,
        })
    }
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn checked_sum(mut values: impl Iterator<Item = u64>) -> Result<u64, WalletError> {
    values.try_fold(0u64, |acc, v| acc.checked_add(v).ok_or(WalletError::ValueOverflow))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fee::{FlatFee, LinearFee, PerInputFee};
    use quill_core::address::Network;
    use quill_core::types::Hash256;
    use std::cell::Cell;

    fn addr(fill: u8) -> Address {
        Address::from_root(Hash256([fill; 32]), Network::Testnet)
    }

    fn utxo(fill: u8, index: u32) -> UtxoRef {
        UtxoRef::new(Hash256([fill; 32]), index)
    }

    fn pay(fill: u8, value: u64) -> TxOutput {
        TxOutput {
            address: addr(fill),
            value,
        }
    }

    fn builder(inputs: &[u64], outputs: &[u64], change: bool) -> TransactionBuilder {
        let mut b = TransactionBuilder::new();
        for (i, v) in inputs.iter().enumerate() {
            b.add_input(utxo(0x10, i as u32), *v).unwrap();
        }
        for (i, v) in outputs.iter().enumerate() {
            b.add_output(pay(i as u8 + 1, *v)).unwrap();
        }
        if change {
            b.set_change_address(addr(0xCC));
        }
        b
    }

    // --- Mutation ---

    #[test]
    fn zero_output_rejected() {
        let mut b = TransactionBuilder::new();
        assert!(matches!(
            b.add_output(pay(1, 0)).unwrap_err(),
            WalletError::InvalidAmount(_)
        ));
        assert!(b.outputs().is_empty());
    }

    #[test]
    fn duplicate_input_rejected() {
        let mut b = TransactionBuilder::new();
        b.add_input(utxo(1, 0), 10).unwrap();
        assert!(matches!(
            b.add_input(utxo(1, 0), 10).unwrap_err(),
            WalletError::DuplicateInput(_)
        ));
        // Same txid, different index is a different UTXO.
        b.add_input(utxo(1, 1), 10).unwrap();
        assert_eq!(b.inputs().len(), 2);
    }

    #[test]
    fn change_address_last_write_wins() {
        let mut b = TransactionBuilder::new();
        b.set_change_address(addr(1)).set_change_address(addr(2));
        assert_eq!(b.change_address(), Some(&addr(2)));
    }

    // --- Finalize ---

    #[test]
    fn empty_builder_rejected() {
        assert_eq!(
            TransactionBuilder::new().finalize(&FlatFee(0)).unwrap_err(),
            WalletError::EmptyInputsOrOutputs
        );
        assert_eq!(
            builder(&[10], &[], true).finalize(&FlatFee(0)).unwrap_err(),
            WalletError::EmptyInputsOrOutputs
        );
        assert_eq!(
            builder(&[], &[10], true).finalize(&FlatFee(0)).unwrap_err(),
            WalletError::EmptyInputsOrOutputs
        );
    }

    #[test]
    fn insufficient_funds() {
        let err = builder(&[600_000], &[1_000_000], true)
            .finalize(&FlatFee(0))
            .unwrap_err();
        assert_eq!(
            err,
            WalletError::InsufficientFunds {
                have: 600_000,
                need: 1_000_000
            }
        );
    }

    #[test]
    fn insufficient_funds_counts_fee() {
        let err = builder(&[1_000], &[900], true)
            .finalize(&FlatFee(101))
            .unwrap_err();
        assert_eq!(err, WalletError::InsufficientFunds { have: 1_000, need: 1_001 });
    }

    #[test]
    fn change_synthesized_last() {
        let sk = builder(&[1_000_000], &[600_000], true)
            .finalize(&FlatFee(0))
            .unwrap();
        let values: Vec<u64> = sk.outputs().iter().map(|o| o.value).collect();
        assert_eq!(values, vec![600_000, 400_000]);
        assert_eq!(sk.change_index(), Some(1));
        assert_eq!(sk.outputs()[1].address, addr(0xCC));
        assert_eq!(sk.fee(), 0);
    }

    #[test]
    fn missing_change_address() {
        let err = builder(&[1_000_000], &[600_000], false)
            .finalize(&FlatFee(0))
            .unwrap_err();
        assert_eq!(err, WalletError::MissingChangeAddress(400_000));
    }

    #[test]
    fn exact_spend_needs_no_change_address() {
        let sk = builder(&[1_000], &[900], false).finalize(&FlatFee(100)).unwrap();
        assert_eq!(sk.outputs().len(), 1);
        assert_eq!(sk.change_index(), None);
        assert_eq!(sk.fee(), 100);
    }

    #[test]
    fn ordering_preserved() {
        let sk = builder(&[500, 300, 200], &[100, 200, 300], true)
            .finalize(&FlatFee(0))
            .unwrap();
        let ins: Vec<u32> = sk.inputs().iter().map(|i| i.utxo.index).collect();
        assert_eq!(ins, vec![0, 1, 2]);
        let outs: Vec<u64> = sk.outputs().iter().map(|o| o.value).collect();
        assert_eq!(outs, vec![100, 200, 300, 400]);
    }

    #[test]
    fn linear_fee_reaches_fixed_point() {
        let policy = LinearFee::default();
        let sk = builder(&[10_000_000], &[3_000_000], true).finalize(&policy).unwrap();
        let shape = TxShape::of(sk.inputs(), sk.outputs()).unwrap();
        assert_eq!(sk.fee(), policy.fee(&shape).unwrap());
        assert_eq!(sk.total_input(), sk.total_output() + sk.fee());
        assert_eq!(sk.change_index(), Some(1));
    }

    #[test]
    fn change_crossing_varint_width_settles() {
        // Change near 65_536 flips between a 3 and 5 byte encoding.
        let policy = LinearFee::default();
        let sk = builder(&[1_231_500], &[1_000_000], true).finalize(&policy).unwrap();
        let shape = TxShape::of(sk.inputs(), sk.outputs()).unwrap();
        assert_eq!(sk.total_input(), sk.total_output() + sk.fee());
        assert_eq!(sk.change_index(), Some(1));
        assert!(sk.fee() >= policy.fee(&shape).unwrap());
    }

    #[test]
    fn default_linear_fee_finalizes_across_range() {
        let policy = LinearFee::default();
        for input in (1_200_000..1_300_000).step_by(7) {
            let sk = builder(&[input], &[1_000_000], true)
                .finalize(&policy)
                .unwrap_or_else(|e| panic!("input {input}: {e:?}"));
            let shape = TxShape::of(sk.inputs(), sk.outputs()).unwrap();
            assert_eq!(sk.total_input(), sk.total_output() + sk.fee());
            assert!(sk.fee() >= policy.fee(&shape).unwrap(), "input {input}");
        }
    }

    #[test]
    fn per_input_fee_balanced() {
        let sk = builder(&[4_000, 4_000], &[5_000], true)
            .finalize(&PerInputFee::default())
            .unwrap();
        assert_eq!(sk.fee(), 2_000);
        assert_eq!(sk.change_output().unwrap().value, 1_000);
    }

    #[test]
    fn change_that_cannot_pay_for_itself_becomes_fee() {
        // 10 base, 50 more once a second output exists: 5 of surplus cannot cover that.
        let policy = |s: &TxShape| -> u64 { if s.output_count > 1 { 60 } else { 10 } };
        let sk = builder(&[1_015], &[1_000], true).finalize(&policy).unwrap();
        assert_eq!(sk.outputs().len(), 1);
        assert_eq!(sk.change_index(), None);
        assert_eq!(sk.fee(), 15);
    }

    #[test]
    fn non_converging_policy_fails() {
        let calls = Cell::new(0u64);
        let policy = |_: &TxShape| {
            calls.set(calls.get() + 1);
            calls.get()
        };
        let err = builder(&[1_000_000], &[1_000], true).finalize(&policy).unwrap_err();
        assert_eq!(
            err,
            WalletError::FeeCalculationDidNotConverge {
                iterations: MAX_FEE_ITERATIONS
            }
        );
    }

    #[test]
    fn iteration_cap_configurable() {
        let calls = Cell::new(0u64);
        let policy = |_: &TxShape| {
            calls.set(calls.get() + 1);
            calls.get()
        };
        let err = builder(&[1_000_000], &[1_000], true)
            .with_max_fee_iterations(2)
            .finalize(&policy)
            .unwrap_err();
        assert_eq!(err, WalletError::FeeCalculationDidNotConverge { iterations: 2 });
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn input_overflow() {
        let err = builder(&[u64::MAX, 1], &[1], true).finalize(&FlatFee(0)).unwrap_err();
        assert_eq!(err, WalletError::ValueOverflow);
    }
}
