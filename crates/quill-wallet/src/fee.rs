//! Fee policies.
//!
//! A policy maps the shape of a transaction (input count, output count and
//! the encoded size once every input is witnessed) to a fee in base units.

use serde::{Deserialize, Serialize};

use quill_core::types::{TxBody, TxInput, TxOutput};

use crate::error::WalletError;

/// Default constant term of [`LinearFee`].
pub const DEFAULT_FEE_CONSTANT: u64 = 155_381;

/// Default per-byte coefficient of [`LinearFee`], in thousandths.
pub const DEFAULT_FEE_COEFFICIENT_MILLI: u64 = 43_946;

/// Default base fee of [`PerInputFee`].
pub const DEFAULT_BASE_FEE: u64 = 1_000;

/// Default per-input fee of [`PerInputFee`].
pub const DEFAULT_FEE_PER_INPUT: u64 = 500;

/// What a fee policy gets to look at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxShape {
    pub input_count: usize,
    pub output_count: usize,
    /// Canonical body size plus one witness per input.
    pub encoded_size: usize,
}

impl TxShape {
    /// Measure the transaction formed by `inputs` and `outputs`.
    pub fn of(inputs: &[TxInput], outputs: &[TxOutput]) -> Result<Self, WalletError> {
        let body = TxBody::new(
            inputs.iter().map(|i| i.utxo).collect(),
            outputs.to_vec(),
        );
        Ok(Self {
            input_count: inputs.len(),
            output_count: outputs.len(),
            encoded_size: body.signed_size()?,
        })
    }
}

/// Maps a transaction shape to the fee it must pay.
pub trait FeePolicy {
    fn fee(&self, shape: &TxShape) -> Result<u64, WalletError>;
}

/// `constant + ceil(coefficient_milli * size / 1000)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearFee {
    pub constant: u64,
    pub coefficient_milli: u64,
}

impl LinearFee {
    pub fn new(constant: u64, coefficient_milli: u64) -> Self {
        Self {
            constant,
            coefficient_milli,
        }
    }
}

impl Default for LinearFee {
    fn default() -> Self {
        Self::new(DEFAULT_FEE_CONSTANT, DEFAULT_FEE_COEFFICIENT_MILLI)
    }
}

impl FeePolicy for LinearFee {
    fn fee(&self, shape: &TxShape) -> Result<u64, WalletError> {
        let scaled = (self.coefficient_milli as u128) * (shape.encoded_size as u128);
        let per_byte = u64::try_from(scaled.div_ceil(1000)).map_err(|_| WalletError::ValueOverflow)?;
        self.constant
            .checked_add(per_byte)
            .ok_or(WalletError::ValueOverflow)
    }
}

/// The same fee regardless of shape. `FlatFee(0)` charges nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatFee(pub u64);

impl FeePolicy for FlatFee {
    fn fee(&self, _shape: &TxShape) -> Result<u64, WalletError> {
        Ok(self.0)
    }
}

/// `base + per_input * input_count`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerInputFee {
    pub base: u64,
    pub per_input: u64,
}

impl Default for PerInputFee {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE_FEE,
            per_input: DEFAULT_FEE_PER_INPUT,
        }
    }
}

impl FeePolicy for PerInputFee {
    fn fee(&self, shape: &TxShape) -> Result<u64, WalletError> {
        self.per_input
            .checked_mul(shape.input_count as u64)
            .and_then(|v| v.checked_add(self.base))
            .ok_or(WalletError::ValueOverflow)
    }
}

impl<F> FeePolicy for F
where
    F: Fn(&TxShape) -> u64,
{
    fn fee(&self, shape: &TxShape) -> Result<u64, WalletError> {
        Ok(self(shape))
    }
}
