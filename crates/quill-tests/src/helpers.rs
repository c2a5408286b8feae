//! Shared test helpers.

use quill_core::address::{Address, Network};
use quill_core::types::{Hash256, TxInput, TxOutput, UtxoRef};
use quill_wallet::Wallet;

/// The 16-byte entropy `00 01 .. 0f`.
pub const TEST_ENTROPY: [u8; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15];

/// 96-byte root key used by the builder scenario.
pub const ROOT_KEY_HEX: &str = "d8a7234357dcfc003c99ac410262de9bf2b43c1886939045012d270de6cb2f4360453ef620552718dece81b9b0efcc55a71a5b9a417ccf772fe90ec857c2f0da77794c3cacfc998a9f2ad30f17b6370a9a56695aa35ea702e7abd430d7615637";

/// Txid spent by the builder scenario.
pub const SCENARIO_TXID: &str = "678f01893645b40557166a52637e6a5db048d34f09da6096a7ceb63abfeb5187";

/// Wallet over [`TEST_ENTROPY`] with passphrase `"abc"`.
pub fn test_wallet(network: Network) -> Wallet {
    Wallet::create(&TEST_ENTROPY, "abc", network).unwrap()
}

/// Address whose root is `seed` repeated.
pub fn addr(seed: u8) -> Address {
    Address::from_root(Hash256([seed; 32]), Network::Testnet)
}

/// UTXO with a txid derived from `seed`.
pub fn utxo(seed: u8, index: u32, value: u64) -> TxInput {
    TxInput {
        utxo: UtxoRef::new(Hash256([seed; 32]), index),
        value,
    }
}

/// Output paying `value` to [`addr`]`(seed)`.
pub fn pay(seed: u8, value: u64) -> TxOutput {
    TxOutput {
        address: addr(seed),
        value,
    }
}
