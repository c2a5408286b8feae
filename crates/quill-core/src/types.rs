//! Transaction skeleton types and their canonical encoding.
//!
//! All monetary values are in base units (1 coin = 10^6 units).
//! The canonical body is the bincode (standard config) encoding of
//! [`TxBody`]; its BLAKE3 digest is the transaction id that witnesses sign.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::address::Address;
use crate::constants::{SIGNATURE_SIZE, TX_VERSION, XPUB_SIZE};
use crate::crypto::XPub;
use crate::error::{QuillError, TransactionError};

/// A 32-byte hash value, used for transaction ids and address roots.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Parse 64 hex characters.
    pub fn from_hex(s: &str) -> Result<Self, TransactionError> {
        let mut out = [0u8; 32];
        hex::decode_to_slice(s.trim(), &mut out)
            .map_err(|e| TransactionError::InvalidTxId(format!("{s}: {e}")))?;
        Ok(Self(out))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Reference to an output of a previous transaction.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
pub struct UtxoRef {
    pub txid: Hash256,
    pub index: u32,
}

impl UtxoRef {
    pub fn new(txid: Hash256, index: u32) -> Self {
        Self { txid, index }
    }
}

impl fmt::Display for UtxoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

/// An input with the value its owner claims for it.
///
/// The value is taken at face value; nothing here checks it against a ledger.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TxInput {
    pub utxo: UtxoRef,
    pub value: u64,
}

/// A payment to an address.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
pub struct TxOutput {
    pub address: Address,
    pub value: u64,
}

/// The signed portion of a transaction.
#[derive(Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct TxBody {
    pub version: u32,
    pub inputs: Vec<UtxoRef>,
    pub outputs: Vec<TxOutput>,
}

impl TxBody {
    pub fn new(inputs: Vec<UtxoRef>, outputs: Vec<TxOutput>) -> Self {
        Self {
            version: TX_VERSION,
            inputs,
            outputs,
        }
    }

    /// Canonical bytes: bincode with standard config.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, TransactionError> {
        bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| TransactionError::Serialization(e.to_string()))
    }

    /// BLAKE3 of the canonical bytes.
    pub fn txid(&self) -> Result<Hash256, TransactionError> {
        Ok(Hash256(blake3::hash(&self.canonical_bytes()?).into()))
    }

    /// Size of the body once every input carries a witness.
    pub fn signed_size(&self) -> Result<usize, TransactionError> {
        Ok(self.canonical_bytes()?.len() + self.inputs.len() * TxWitness::ENCODED_SIZE)
    }
}

/// A balanced, fee-correct transaction ready for signing.
///
/// Invariant: `Σ inputs == Σ outputs + fee`. When present, the change output
/// is the last output.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct TransactionSkeleton {
    inputs: Vec<TxInput>,
    outputs: Vec<TxOutput>,
    fee: u64,
    change_index: Option<usize>,
}

impl TransactionSkeleton {
    /// Assemble a skeleton, checking the balance and change position.
    pub fn new(
        inputs: Vec<TxInput>,
        outputs: Vec<TxOutput>,
        fee: u64,
        change_index: Option<usize>,
    ) -> Result<Self, TransactionError> {
        if let Some(index) = change_index {
            if index + 1 != outputs.len() {
                return Err(TransactionError::MisplacedChange {
                    index,
                    outputs: outputs.len(),
                });
            }
        }
        let total_in = sum_values(inputs.iter().map(|i| i.value))?;
        let total_out = sum_values(outputs.iter().map(|o| o.value))?;
        if total_out.checked_add(fee) != Some(total_in) {
            return Err(TransactionError::Unbalanced {
                inputs: total_in,
                outputs: total_out,
                fee,
            });
        }
        Ok(Self {
            inputs,
            outputs,
            fee,
            change_index,
        })
    }

    pub fn inputs(&self) -> &[TxInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TxOutput] {
        &self.outputs
    }

    pub fn fee(&self) -> u64 {
        self.fee
    }

    pub fn change_index(&self) -> Option<usize> {
        self.change_index
    }

    pub fn change_output(&self) -> Option<&TxOutput> {
        self.change_index.and_then(|i| self.outputs.get(i))
    }

    /// Sum of input values. Cannot overflow once constructed.
    pub fn total_input(&self) -> u64 {
        self.inputs.iter().map(|i| i.value).sum()
    }

    pub fn total_output(&self) -> u64 {
        self.outputs.iter().map(|o| o.value).sum()
    }

    pub fn body(&self) -> TxBody {
        TxBody::new(
            self.inputs.iter().map(|i| i.utxo).collect(),
            self.outputs.clone(),
        )
    }

    pub fn canonical_bytes(&self) -> Result<Vec<u8>, TransactionError> {
        self.body().canonical_bytes()
    }

    pub fn txid(&self) -> Result<Hash256, TransactionError> {
        self.body().txid()
    }
}

fn sum_values(mut values: impl Iterator<Item = u64>) -> Result<u64, TransactionError> {
    values.try_fold(0u64, |acc, v| {
        acc.checked_add(v).ok_or(TransactionError::ValueOverflow)
    })
}

/// Proof that the holder of `xpub` authorized an input.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxWitness {
    pub xpub: XPub,
    #[serde(with = "signature_hex")]
    pub signature: [u8; SIGNATURE_SIZE],
}

impl TxWitness {
    /// Serialized size: `xpub(64) || signature(64)`.
    pub const ENCODED_SIZE: usize = XPUB_SIZE + SIGNATURE_SIZE;

    pub fn to_bytes(&self) -> [u8; Self::ENCODED_SIZE] {
        let mut out = [0u8; Self::ENCODED_SIZE];
        out[..XPUB_SIZE].copy_from_slice(&self.xpub.to_bytes());
        out[XPUB_SIZE..].copy_from_slice(&self.signature);
        out
    }
}

mod signature_hex {
    use super::SIGNATURE_SIZE;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(sig: &[u8; SIGNATURE_SIZE], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(sig))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; SIGNATURE_SIZE], D::Error> {
        let text = String::deserialize(d)?;
        let mut out = [0u8; SIGNATURE_SIZE];
        hex::decode_to_slice(&text, &mut out).map_err(serde::de::Error::custom)?;
        Ok(out)
    }
}

/// A skeleton together with one witness per input, in input order.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction {
    skeleton: TransactionSkeleton,
    witnesses: Vec<TxWitness>,
}

impl SignedTransaction {
    pub fn new(
        skeleton: TransactionSkeleton,
        witnesses: Vec<TxWitness>,
    ) -> Result<Self, TransactionError> {
        if witnesses.len() != skeleton.inputs().len() {
            return Err(TransactionError::WitnessCountMismatch {
                inputs: skeleton.inputs().len(),
                witnesses: witnesses.len(),
            });
        }
        Ok(Self { skeleton, witnesses })
    }

    pub fn skeleton(&self) -> &TransactionSkeleton {
        &self.skeleton
    }

    pub fn witnesses(&self) -> &[TxWitness] {
        &self.witnesses
    }

    pub fn txid(&self) -> Result<Hash256, TransactionError> {
        self.skeleton.txid()
    }

    /// Check every witness signature against the transaction id.
    pub fn verify(&self) -> Result<(), QuillError> {
        let txid = self.txid()?;
        for witness in &self.witnesses {
            witness.xpub.verify(txid.as_bytes(), &witness.signature)?;
        }
        Ok(())
    }
}
