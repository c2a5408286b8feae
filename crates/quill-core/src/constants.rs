//! Protocol constants. All monetary values in base units (1 coin = 10^6 units).

pub const COIN: u64 = 1_000_000;

/// Offset added to a child index to mark hardened derivation.
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// Number of indices available on each side (normal / hardened) of the tree.
pub const INDEX_SPACE: u32 = HARDENED_OFFSET;

/// BIP-44 purpose level, always hardened.
pub const BIP44_PURPOSE: u32 = 44;

/// Registered coin type for the ledger, always hardened.
pub const BIP44_COIN_TYPE: u32 = 1815;

/// Minimum entropy accepted when creating a wallet (128 bits).
pub const MIN_ENTROPY_LEN: usize = 16;

/// Maximum entropy accepted when creating a wallet (256 bits).
pub const MAX_ENTROPY_LEN: usize = 32;

/// PBKDF2-HMAC-SHA512 rounds used to stretch entropy into the master key.
pub const PBKDF2_ITERATIONS: u32 = 4096;

/// Size of the chain code carried by every extended key.
pub const CHAIN_CODE_SIZE: usize = 32;

/// Size of the extended secret (`kl || kr`).
pub const EXTENDED_SECRET_SIZE: usize = 64;

/// Serialized extended private key: `kl || kr || chain code`.
pub const XPRV_SIZE: usize = EXTENDED_SECRET_SIZE + CHAIN_CODE_SIZE;

/// Serialized extended public key: `point || chain code`.
pub const XPUB_SIZE: usize = 32 + CHAIN_CODE_SIZE;

/// Ed25519 signature size.
pub const SIGNATURE_SIZE: usize = 64;

/// Current address payload version.
pub const ADDRESS_VERSION: u8 = 0;

/// Current transaction body version.
pub const TX_VERSION: u32 = 1;
