//! Entropy handling and master key stretching.
//!
//! The master key is PBKDF2-HMAC-SHA512 over the entropy, keyed by the
//! passphrase, 4096 rounds, 96 bytes of output. The output is split into
//! `kl || kr || cc` and `kl` is normalized into a valid Ed25519 scalar.

use std::fmt;

use pbkdf2::pbkdf2_hmac;
use sha2::Sha512;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use quill_core::constants::{MAX_ENTROPY_LEN, MIN_ENTROPY_LEN, PBKDF2_ITERATIONS, XPRV_SIZE};
use quill_core::crypto::XPrv;

use crate::error::WalletError;

/// Word counts accepted for generated and restored phrases.
pub const SUPPORTED_WORD_COUNTS: [usize; 5] = [12, 15, 18, 21, 24];

/// Caller-supplied entropy, 16 to 32 bytes in steps of 4.
///
/// Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Entropy {
    bytes: Vec<u8>,
}

impl Entropy {
    /// Copy and validate entropy bytes.
    pub fn new(bytes: &[u8]) -> Result<Self, WalletError> {
        let len = bytes.len();
        if len < MIN_ENTROPY_LEN {
            return Err(WalletError::InsufficientEntropy(len));
        }
        if len > MAX_ENTROPY_LEN || len % 4 != 0 {
            return Err(WalletError::InvalidEntropyLength(len));
        }
        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }

    /// Fresh entropy from the OS RNG, sized for a phrase of `word_count` words.
    pub fn generate(word_count: usize) -> Result<Self, WalletError> {
        use rand::RngCore;
        let len = entropy_len_for_words(word_count)?;
        let mut bytes = vec![0u8; len];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Ok(Self { bytes })
    }

    /// Raw entropy. Handle with care.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Number of BIP-39 words that encode this entropy.
    pub fn word_count(&self) -> usize {
        self.bytes.len() * 3 / 4
    }
}

impl Clone for Entropy {
    fn clone(&self) -> Self {
        Self {
            bytes: self.bytes.clone(),
        }
    }
}

impl fmt::Debug for Entropy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entropy")
            .field("len", &self.bytes.len())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Entropy length in bytes for a BIP-39 word count.
pub fn entropy_len_for_words(word_count: usize) -> Result<usize, WalletError> {
    if !SUPPORTED_WORD_COUNTS.contains(&word_count) {
        return Err(WalletError::InvalidMnemonic(format!(
            "unsupported word count {word_count}, expected one of {SUPPORTED_WORD_COUNTS:?}"
        )));
    }
    Ok(word_count * 4 / 3)
}

/// Stretch entropy and passphrase into the master extended key.
pub fn master_key(entropy: &Entropy, passphrase: &str) -> XPrv {
    let mut seed = Zeroizing::new([0u8; XPRV_SIZE]);
    pbkdf2_hmac::<Sha512>(
        passphrase.as_bytes(),
        entropy.as_bytes(),
        PBKDF2_ITERATIONS,
        &mut seed[..],
    );
    XPrv::from_normalized_seed(*seed)
}
