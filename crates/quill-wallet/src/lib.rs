//! # quill-wallet — HD wallet, addresses and transaction building.
//!
//! Derives BIP-44 accounts from a master key created from entropy and a
//! passphrase, generates addresses for them, and assembles balanced,
//! fee-correct transaction skeletons that an account can then sign.
//!
//! # Modules
//!
//! - [`error`] — `WalletError` enum and its `ErrorKind` classes
//! - [`keys`] — Entropy and PBKDF2 master key derivation
//! - [`mnemonic`] — BIP-39 English backup phrases
//! - [`wallet`] — `Wallet`, the owner of the master key
//! - [`account`] — Accounts, watch-only accounts, address iteration, signing
//! - [`fee`] — Fee policies over the transaction shape
//! - [`builder`] — Transaction builder with fee/change convergence
//! - [`coin_selection`] — Greedy UTXO selection
//! - [`request`] — JSON transaction requests
//! - [`config`] — Environment-driven configuration

pub mod account;
pub mod builder;
pub mod coin_selection;
pub mod config;
pub mod error;
pub mod fee;
pub mod keys;
pub mod mnemonic;
pub mod request;
pub mod wallet;

// Re-exports for convenient access
pub use account::{Account, AddressIter, Addressing, DerivedAddress, PublicAccount};
pub use builder::{TransactionBuilder, MAX_FEE_ITERATIONS};
pub use coin_selection::{CoinSelection, CoinSelector, SelectionStrategy};
pub use config::WalletConfig;
pub use error::{ErrorKind, WalletError};
pub use fee::{FeePolicy, FlatFee, LinearFee, PerInputFee, TxShape};
pub use keys::{master_key, Entropy};
pub use mnemonic::{entropy_to_mnemonic, mnemonic_to_entropy};
pub use request::{RequestInput, RequestOutput, TxRequest};
pub use wallet::Wallet;
