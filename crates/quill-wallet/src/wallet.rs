//! Wallet: the owner of a master key.
//!
//! A [`Wallet`] is built once from entropy (or a mnemonic) and a passphrase
//! and is immutable afterwards. Accounts borrow it; dropping the wallet
//! scrubs the master key.

use std::fmt;

use tracing::debug;
use zeroize::Zeroizing;

use quill_core::address::Network;
use quill_core::constants::INDEX_SPACE;
use quill_core::crypto::{XPrv, XPub};

use crate::account::Account;
use crate::error::WalletError;
use crate::keys::{master_key, Entropy};
use crate::mnemonic::{entropy_to_mnemonic, mnemonic_to_entropy};

/// HD wallet rooted at a single master key.
pub struct Wallet {
    master: XPrv,
    network: Network,
}

impl Wallet {
    /// Deterministically create a wallet from raw entropy and a passphrase.
    pub fn create(entropy: &[u8], passphrase: &str, network: Network) -> Result<Self, WalletError> {
        let entropy = Entropy::new(entropy)?;
        Ok(Self::from_entropy(&entropy, passphrase, network))
    }

    pub fn from_entropy(entropy: &Entropy, passphrase: &str, network: Network) -> Self {
        let master = master_key(entropy, passphrase);
        debug!(%network, entropy_len = entropy.len(), "wallet: created");
        Self { master, network }
    }

    /// Restore from a BIP-39 English phrase.
    pub fn from_mnemonic(phrase: &str, passphrase: &str, network: Network) -> Result<Self, WalletError> {
        let entropy = mnemonic_to_entropy(phrase)?;
        Ok(Self::from_entropy(&entropy, passphrase, network))
    }

    /// Create a wallet from fresh OS entropy; returns it with its backup phrase.
    pub fn generate(
        word_count: usize,
        passphrase: &str,
        network: Network,
    ) -> Result<(Self, Zeroizing<String>), WalletError> {
        let entropy = Entropy::generate(word_count)?;
        let phrase = entropy_to_mnemonic(&entropy)?;
        Ok((Self::from_entropy(&entropy, passphrase, network), phrase))
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// The master extended public key.
    pub fn master_public(&self) -> XPub {
        self.master.public()
    }

    pub(crate) fn master(&self) -> &XPrv {
        &self.master
    }

    /// Derive the account at `m/44'/1815'/index'`.
    ///
    /// Accounts are not cached: two calls with the same index produce
    /// accounts with identical keys.
    pub fn create_account(&self, alias: impl Into<String>, index: u32) -> Result<Account<'_>, WalletError> {
        if index >= INDEX_SPACE {
            return Err(WalletError::InvalidIndex(index));
        }
        Account::derive(self, alias.into(), index)
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("network", &self.network)
            .field("master_public", &self.master.public())
            .finish()
    }
}
