//! BIP-39 mnemonic backup and restoration of wallet entropy.

use bip39::{Language, Mnemonic};
use zeroize::Zeroizing;

use crate::error::WalletError;
use crate::keys::{Entropy, SUPPORTED_WORD_COUNTS};

/// Encode entropy as an English BIP-39 phrase (12 to 24 words).
pub fn entropy_to_mnemonic(entropy: &Entropy) -> Result<Zeroizing<String>, WalletError> {
    let m = Mnemonic::from_entropy_in(Language::English, entropy.as_bytes())
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;
    Ok(Zeroizing::new(m.to_string()))
}

/// Parse a phrase back into entropy.
///
/// Normalizes whitespace and converts to lowercase before parsing.
pub fn mnemonic_to_entropy(phrase: &str) -> Result<Entropy, WalletError> {
    let normalized = Zeroizing::new(
        phrase
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase(),
    );
    let word_count = normalized.split(' ').count();
    if !SUPPORTED_WORD_COUNTS.contains(&word_count) {
        return Err(WalletError::InvalidMnemonic(format!(
            "expected 12, 15, 18, 21 or 24 words, got {word_count}"
        )));
    }
    let m = Mnemonic::parse_in(Language::English, normalized.as_str())
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;
    let raw = Zeroizing::new(m.to_entropy());
    Entropy::new(&raw)
}
