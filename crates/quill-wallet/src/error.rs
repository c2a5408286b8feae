//! Wallet error types.

use quill_core::error::{AddressError, CryptoError, KeyError, QuillError, TransactionError};
use thiserror::Error;

/// Broad class of a [`WalletError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller passed something malformed or out of range.
    Validation,
    /// The operation does not fit the current contents of the object.
    State,
    /// Not enough value, or a numeric limit was hit.
    Resource,
}

/// Errors that can occur in wallet operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// Account or address index outside the 31-bit range.
    #[error("index out of range: {0}")]
    InvalidIndex(u32),

    /// Output value of zero, or otherwise unusable amount.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// `start + count` runs past the last normal index.
    #[error("address range overflows the index space: start {start}, count {count}")]
    IndexOverflow { start: u32, count: u32 },

    /// Fewer than 16 bytes of entropy.
    #[error("insufficient entropy: {0} bytes, need at least 16")]
    InsufficientEntropy(usize),

    /// Entropy length not one of 16, 20, 24, 28, 32.
    #[error("invalid entropy length: {0} bytes")]
    InvalidEntropyLength(usize),

    /// Invalid BIP-39 mnemonic phrase.
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    /// Invalid address string.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Malformed transaction id.
    #[error("invalid transaction id: {0}")]
    InvalidTxId(String),

    /// A transaction request document that does not parse.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A configuration value that does not parse.
    #[error("invalid config: {0}")]
    Config(String),

    /// The same UTXO was added twice.
    #[error("duplicate input: {0}")]
    DuplicateInput(String),

    /// Change is owed but no change address was set.
    #[error("change of {0} requires a change address")]
    MissingChangeAddress(u64),

    /// A transaction needs at least one input and one output.
    #[error("transaction needs at least one input and one output")]
    EmptyInputsOrOutputs,

    /// One signer coordinate is needed per input.
    #[error("signer count {signers} does not match input count {inputs}")]
    SignerCountMismatch { inputs: usize, signers: usize },

    /// Insufficient funds to cover the outputs plus fees.
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u64, need: u64 },

    /// The fee kept moving as the change output was resized.
    #[error("fee calculation did not converge after {iterations} iterations")]
    FeeCalculationDidNotConverge { iterations: usize },

    /// No UTXOs available for spending.
    #[error("no UTXOs available")]
    NoUtxos,

    /// A value sum or fee computation overflowed u64.
    #[error("value overflow")]
    ValueOverflow,

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

impl WalletError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WalletError::InvalidIndex(_)
            | WalletError::InvalidAmount(_)
            | WalletError::IndexOverflow { .. }
            | WalletError::InsufficientEntropy(_)
            | WalletError::InvalidEntropyLength(_)
            | WalletError::InvalidMnemonic(_)
            | WalletError::InvalidAddress(_)
            | WalletError::InvalidTxId(_)
            | WalletError::InvalidRequest(_)
            | WalletError::Config(_)
            | WalletError::Key(_)
            | WalletError::Address(_) => ErrorKind::Validation,

            WalletError::DuplicateInput(_)
            | WalletError::MissingChangeAddress(_)
            | WalletError::EmptyInputsOrOutputs
            | WalletError::SignerCountMismatch { .. }
            | WalletError::Crypto(_) => ErrorKind::State,

            WalletError::InsufficientFunds { .. }
            | WalletError::FeeCalculationDidNotConverge { .. }
            | WalletError::NoUtxos
            | WalletError::ValueOverflow => ErrorKind::Resource,

            WalletError::Transaction(TransactionError::ValueOverflow) => ErrorKind::Resource,
            WalletError::Transaction(_) => ErrorKind::Validation,
        }
    }
}

impl From<QuillError> for WalletError {
    fn from(err: QuillError) -> Self {
        match err {
            QuillError::Key(e) => e.into(),
            QuillError::Address(e) => e.into(),
            QuillError::Crypto(e) => e.into(),
            QuillError::Transaction(e) => e.into(),
        }
    }
}
