//! Property-based tests for the wallet core.
//!
//! Invariants checked:
//! - Same entropy and passphrase always give the same addresses
//! - Watch-only and signing accounts derive identical addresses
//! - Any single-character substitution invalidates an address
//! - Backup phrases round trip to the same entropy
//! - Finalized skeletons balance exactly and never underpay the policy
//! - Coin selection never returns a set the builder then rejects
//! - Signatures verify, and fail on any other message

use proptest::prelude::*;
use quill_core::address::{Address, Network};
use quill_core::constants::INDEX_SPACE;
use quill_core::derivation::Chain;
use quill_core::types::{TxInput, TxOutput};
use quill_tests::helpers::*;
use quill_wallet::{
    entropy_to_mnemonic, mnemonic_to_entropy, CoinSelector, Entropy, FeePolicy, LinearFee,
    PerInputFee, SelectionStrategy, TransactionBuilder, TxShape, Wallet, WalletError,
};

const BASE58_ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

fn arb_entropy() -> impl Strategy<Value = Vec<u8>> {
    prop::sample::select(vec![16usize, 20, 24, 28, 32])
        .prop_flat_map(|len| prop::collection::vec(any::<u8>(), len))
}

fn arb_chain() -> impl Strategy<Value = Chain> {
    prop_oneof![Just(Chain::External), Just(Chain::Internal)]
}

fn arb_network() -> impl Strategy<Value = Network> {
    prop_oneof![Just(Network::Mainnet), Just(Network::Testnet)]
}

fn inputs_from(values: &[u64]) -> Vec<TxInput> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| utxo(i as u8, i as u32, *v))
        .collect()
}

// ---------------------------------------------------------------------------
// Derivation and addresses
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Two wallets built from the same inputs agree on every address.
    #[test]
    fn derivation_is_deterministic(
        entropy in arb_entropy(),
        passphrase in "[a-z]{0,8}",
        account in 0u32..INDEX_SPACE,
        chain in arb_chain(),
        index in 0u32..INDEX_SPACE,
    ) {
        let a = Wallet::create(&entropy, &passphrase, Network::Testnet).unwrap();
        let b = Wallet::create(&entropy, &passphrase, Network::Testnet).unwrap();
        let addr_a = a.create_account("a", account).unwrap().address_at(chain, index).unwrap();
        let addr_b = b.create_account("b", account).unwrap().address_at(chain, index).unwrap();
        prop_assert_eq!(addr_a.encode(), addr_b.encode());
    }

    /// Public derivation from the account xpub matches the private path.
    #[test]
    fn public_and_private_addresses_agree(
        entropy in arb_entropy(),
        account in 0u32..16,
        chain in arb_chain(),
        index in 0u32..INDEX_SPACE,
        network in arb_network(),
    ) {
        let wallet = Wallet::create(&entropy, "", network).unwrap();
        let acct = wallet.create_account("p", account).unwrap();
        let via_private = Address::from_xpub(&acct.xprv_at(chain, index).unwrap().public(), network);
        let via_public = acct.public().address_at(chain, index).unwrap();
        prop_assert_eq!(via_private, via_public);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Substituting any one character breaks the checksum.
    #[test]
    fn single_substitution_is_detected(
        entropy in arb_entropy(),
        index in 0u32..1_000,
        position in any::<prop::sample::Index>(),
        replacement in any::<prop::sample::Index>(),
    ) {
        let wallet = Wallet::create(&entropy, "", Network::Mainnet).unwrap();
        let encoded = wallet
            .create_account("c", 0)
            .unwrap()
            .address_at(Chain::External, index)
            .unwrap()
            .encode();
        prop_assert!(Address::is_valid(&encoded));

        let mut bytes = encoded.clone().into_bytes();
        let at = position.index(bytes.len());
        let original = bytes[at];
        let mut candidate = BASE58_ALPHABET[replacement.index(BASE58_ALPHABET.len())];
        if candidate == original {
            candidate = if original == b'1' { b'2' } else { b'1' };
        }
        bytes[at] = candidate;
        let tampered = String::from_utf8(bytes).unwrap();
        prop_assert!(!Address::is_valid(&tampered), "{} accepted after edit at {}", tampered, at);
    }

    /// Phrase to entropy and back is lossless.
    #[test]
    fn mnemonic_round_trip(entropy in arb_entropy()) {
        let original = Entropy::new(&entropy).unwrap();
        let phrase = entropy_to_mnemonic(&original).unwrap();
        prop_assert_eq!(phrase.split_whitespace().count(), original.word_count());
        let back = mnemonic_to_entropy(&phrase).unwrap();
        prop_assert_eq!(back.as_bytes(), original.as_bytes());
    }
}

// ---------------------------------------------------------------------------
// Builder and coin selection
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Every skeleton balances and pays at least what the policy charges
    /// for its final shape; a linear policy always settles.
    #[test]
    fn finalize_balances(
        in_values in prop::collection::vec(1u64..=5_000_000, 1..5),
        out_values in prop::collection::vec(1u64..=3_000_000, 1..4),
        constant in 0u64..200_000,
        coefficient_milli in 0u64..50_000,
    ) {
        let policy = LinearFee::new(constant, coefficient_milli);
        let mut builder = TransactionBuilder::new();
        for input in inputs_from(&in_values) {
            builder.add_input(input.utxo, input.value).unwrap();
        }
        for (i, value) in out_values.iter().enumerate() {
            builder.add_output(pay(100 + i as u8, *value)).unwrap();
        }
        builder.set_change_address(addr(0xCC));

        match builder.finalize(&policy) {
            Ok(sk) => {
                prop_assert_eq!(sk.total_input(), sk.total_output() + sk.fee());
                let charged = policy.fee(&TxShape::of(sk.inputs(), sk.outputs()).unwrap()).unwrap();
                match sk.change_index() {
                    Some(index) => {
                        prop_assert_eq!(index, sk.outputs().len() - 1);
                        prop_assert_eq!(sk.outputs()[index].address.clone(), addr(0xCC));
                        prop_assert!(sk.outputs()[index].value > 0);
                        prop_assert!(sk.fee() >= charged);
                    }
                    None => prop_assert!(sk.fee() >= charged),
                }
            }
            Err(WalletError::InsufficientFunds { have, need }) => {
                prop_assert_eq!(have, in_values.iter().sum::<u64>());
                prop_assert!(have < need);
            }
            Err(other) => prop_assert!(false, "unexpected error {:?}", other),
        }
    }

    /// Whatever the selector returns, the builder accepts with the same fee.
    #[test]
    fn selection_always_finalizes(
        values in prop::collection::vec(0u64..=2_000_000, 1..8),
        target in 1u64..=4_000_000,
        largest_first in any::<bool>(),
        per_input in any::<bool>(),
    ) {
        let strategy = if largest_first { SelectionStrategy::LargestFirst } else { SelectionStrategy::FirstMatch };
        let policy: Box<dyn FeePolicy> = if per_input {
            Box::new(PerInputFee::default())
        } else {
            Box::new(LinearFee::new(1_000, 500))
        };
        let available = inputs_from(&values);
        let outputs = vec![pay(1, target)];
        let change = addr(2);

        match CoinSelector::select(&available, &outputs, &change, policy.as_ref(), strategy) {
            Ok(sel) => {
                prop_assert_eq!(sel.total, sel.selected.iter().map(|i| i.value).sum::<u64>());
                let mut builder = TransactionBuilder::new();
                for input in &sel.selected {
                    builder.add_input(input.utxo, input.value).unwrap();
                }
                builder.add_output(outputs[0].clone()).unwrap();
                builder.set_change_address(change);
                let sk = builder.finalize(policy.as_ref()).unwrap();
                prop_assert_eq!(sk.fee(), sel.fee);
                prop_assert_eq!(sk.change_output().map_or(0, |o: &TxOutput| o.value), sel.change);
            }
            Err(WalletError::InsufficientFunds { have, need }) => prop_assert!(have < need),
            Err(other) => prop_assert!(false, "unexpected error {:?}", other),
        }
    }
}

// ---------------------------------------------------------------------------
// Signatures
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn signatures_bind_the_message(
        entropy in arb_entropy(),
        index in 0u32..1_000,
        message in prop::collection::vec(any::<u8>(), 1..128),
        flip in any::<prop::sample::Index>(),
    ) {
        let wallet = Wallet::create(&entropy, "", Network::Testnet).unwrap();
        let key = wallet.create_account("s", 0).unwrap().xprv_at(Chain::External, index).unwrap();
        let signature = key.sign(&message).unwrap();
        prop_assert!(key.public().verify(&message, &signature).is_ok());

        let mut other = message.clone();
        let at = flip.index(other.len());
        other[at] ^= 0x01;
        prop_assert!(key.public().verify(&other, &signature).is_err());
    }
}
