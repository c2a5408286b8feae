//! Error types for the Quill wallet core.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("derivation index out of range: {0}")] InvalidIndex(u32),
    #[error("cannot derive a hardened child from a public key")] PublicDerivationOfHardenedChild,
    #[error("invalid public key point")] InvalidPublicKey,
    #[error("invalid extended key: {0}")] InvalidExtendedKey(String),
    #[error("invalid key length: expected {expected}, got {actual}")] InvalidLength { expected: usize, actual: usize },
    #[error("invalid hex: {0}")] InvalidHex(String),
    #[error("invalid derivation path: {0}")] InvalidPath(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid character: {0}")] InvalidCharacter(char),
    #[error("invalid checksum")] InvalidChecksum,
    #[error("invalid length: {0}")] InvalidLength(usize),
    #[error("invalid version: {0}")] InvalidVersion(u8),
    #[error("unknown network tag: {0}")] UnknownNetwork(u8),
    #[error("invalid encoding: {0}")] InvalidEncoding(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key bytes")] InvalidPublicKey,
    #[error("signature verification failed")] VerificationFailed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("serialization: {0}")] Serialization(String),
    #[error("value overflow")] ValueOverflow,
    #[error("invalid transaction id: {0}")] InvalidTxId(String),
    #[error("witness count {witnesses} does not match input count {inputs}")] WitnessCountMismatch { inputs: usize, witnesses: usize },
    #[error("unbalanced skeleton: inputs {inputs} != outputs {outputs} + fee {fee}")] Unbalanced { inputs: u64, outputs: u64, fee: u64 },
    #[error("change output index {index} is not the last of {outputs} outputs")] MisplacedChange { index: usize, outputs: usize },
}

#[derive(Error, Debug)]
pub enum QuillError {
    #[error(transparent)] Key(#[from] KeyError),
    #[error(transparent)] Address(#[from] AddressError),
    #[error(transparent)] Crypto(#[from] CryptoError),
    #[error(transparent)] Transaction(#[from] TransactionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_hardened_public() {
        let e = KeyError::PublicDerivationOfHardenedChild;
        assert_eq!(e.to_string(), "cannot derive a hardened child from a public key");
    }

    #[test]
    fn display_invalid_length() {
        let e = KeyError::InvalidLength { expected: 64, actual: 3 };
        assert_eq!(e.to_string(), "invalid key length: expected 64, got 3");
    }

    #[test]
    fn umbrella_wraps_transparently() {
        let e: QuillError = AddressError::InvalidChecksum.into();
        assert_eq!(e.to_string(), "invalid checksum");
        assert!(matches!(e, QuillError::Address(AddressError::InvalidChecksum)));
    }
}
