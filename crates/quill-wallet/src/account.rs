//! Accounts and address generation.
//!
//! An [`Account`] is the BIP-44 node `m/44'/1815'/index'` of a wallet. It
//! borrows the wallet, so it cannot outlive the master key it came from.
//! Addresses live at `account/chain/index` with both of the last two steps
//! normal, which lets [`PublicAccount`] (an owned xpub, no secrets)
//! generate exactly the same addresses.

use serde::{Deserialize, Serialize};
use tracing::debug;

use quill_core::address::{Address, Network};
use quill_core::constants::INDEX_SPACE;
use quill_core::crypto::{XPrv, XPub};
use quill_core::derivation::{Chain, DerivationIndex, DerivationPath};
use quill_core::types::{SignedTransaction, TransactionSkeleton, TxInput, TxOutput, TxWitness};

use crate::builder::TransactionBuilder;
use crate::coin_selection::{CoinSelector, SelectionStrategy};
use crate::error::WalletError;
use crate::fee::FeePolicy;
use crate::wallet::Wallet;

/// An address together with the coordinates it was derived at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedAddress {
    pub chain: Chain,
    pub index: u32,
    pub address: Address,
}

/// Which address key signs an input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Addressing {
    pub chain: Chain,
    pub index: u32,
}

impl Addressing {
    pub fn new(chain: Chain, index: u32) -> Self {
        Self { chain, index }
    }
}

/// Account with signing capability, borrowed from its [`Wallet`].
pub struct Account<'w> {
    wallet: &'w Wallet,
    alias: String,
    index: u32,
    path: DerivationPath,
    key: XPrv,
}

impl<'w> Account<'w> {
    pub(crate) fn derive(wallet: &'w Wallet, alias: String, index: u32) -> Result<Self, WalletError> {
        let path = DerivationPath::bip44_account(index)?;
        let key = path
            .iter()
            .try_fold(wallet.master().clone(), |key, step| key.derive(*step))?;
        debug!(index, %path, "account: derived");
        Ok(Self {
            wallet,
            alias,
            index,
            path,
            key,
        })
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn wallet(&self) -> &'w Wallet {
        self.wallet
    }

    pub fn network(&self) -> Network {
        self.wallet.network()
    }

    /// `m/44'/1815'/index'`.
    pub fn path(&self) -> &DerivationPath {
        &self.path
    }

    pub fn xpub(&self) -> XPub {
        self.key.public()
    }

    /// Owned, secret-free view of this account.
    pub fn public(&self) -> PublicAccount {
        PublicAccount {
            alias: self.alias.clone(),
            index: self.index,
            network: self.network(),
            xpub: self.key.public(),
        }
    }

    /// Address at `(chain, index)`.
    pub fn address_at(&self, chain: Chain, index: u32) -> Result<Address, WalletError> {
        address_at(&self.xpub(), self.network(), chain, index)
    }

    /// Lazily derive `count` addresses starting at `start`.
    pub fn generate_addresses(&self, chain: Chain, start: u32, count: u32) -> Result<AddressIter, WalletError> {
        AddressIter::new(&self.xpub(), self.network(), chain, start, count)
    }

    /// Address-level private key, for signers outside this crate.
    pub fn xprv_at(&self, chain: Chain, index: u32) -> Result<XPrv, WalletError> {
        let index = DerivationIndex::normal(index).map_err(|_| WalletError::InvalidIndex(index))?;
        Ok(self.key.derive(chain.index())?.derive(index)?)
    }

    /// Sign every input of `skeleton`, one address key per input.
    pub fn sign(
        &self,
        skeleton: &TransactionSkeleton,
        signers: &[Addressing],
    ) -> Result<SignedTransaction, WalletError> {
        if signers.len() != skeleton.inputs().len() {
            return Err(WalletError::SignerCountMismatch {
                inputs: skeleton.inputs().len(),
                signers: signers.len(),
            });
        }
        let txid = skeleton.txid()?;
        let witnesses = signers
            .iter()
            .map(|signer| -> Result<TxWitness, WalletError> {
                let key = self.xprv_at(signer.chain, signer.index)?;
                Ok(TxWitness {
                    xpub: key.public(),
                    signature: key.sign(txid.as_bytes())?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        debug!(account = self.index, %txid, inputs = witnesses.len(), "account: signed transaction");
        Ok(SignedTransaction::new(skeleton.clone(), witnesses)?)
    }

    /// Select inputs from `available`, then build and finalize.
    pub fn new_transaction<P: FeePolicy + ?Sized>(
        &self,
        available: &[TxInput],
        outputs: &[TxOutput],
        change: &Address,
        policy: &P,
        strategy: SelectionStrategy,
    ) -> Result<TransactionSkeleton, WalletError> {
        let selection = CoinSelector::select(available, outputs, change, policy, strategy)?;
        let mut builder = TransactionBuilder::new();
        for input in &selection.selected {
            builder.add_input(input.utxo, input.value)?;
        }
        for output in outputs {
            builder.add_output(output.clone())?;
        }
        builder.set_change_address(change.clone());
        builder.finalize(policy)
    }
}

impl std::fmt::Debug for Account<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("alias", &self.alias)
            .field("index", &self.index)
            .field("xpub", &self.key.public())
            .finish()
    }
}

/// Watch-only account: generates addresses, never signs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicAccount {
    pub alias: String,
    pub index: u32,
    pub network: Network,
    pub xpub: XPub,
}

impl PublicAccount {
    pub fn address_at(&self, chain: Chain, index: u32) -> Result<Address, WalletError> {
        address_at(&self.xpub, self.network, chain, index)
    }

    pub fn generate_addresses(&self, chain: Chain, start: u32, count: u32) -> Result<AddressIter, WalletError> {
        AddressIter::new(&self.xpub, self.network, chain, start, count)
    }
}

fn address_at(account: &XPub, network: Network, chain: Chain, index: u32) -> Result<Address, WalletError> {
    let index = DerivationIndex::normal(index).map_err(|_| WalletError::InvalidIndex(index))?;
    let key = account.derive(chain.index())?.derive(index)?;
    Ok(Address::from_xpub(&key, network))
}

/// Finite, lazily evaluated run of addresses on one chain.
///
/// Cloning restarts from the clone point.
#[derive(Clone, Debug)]
pub struct AddressIter {
    chain_key: XPub,
    network: Network,
    chain: Chain,
    next: u32,
    end: u32,
}

impl AddressIter {
    fn new(account: &XPub, network: Network, chain: Chain, start: u32, count: u32) -> Result<Self, WalletError> {
        let end = u64::from(start) + u64::from(count);
        if end > u64::from(INDEX_SPACE) {
            return Err(WalletError::IndexOverflow { start, count });
        }
        Ok(Self {
            chain_key: account.derive(chain.index())?,
            network,
            chain,
            next: start,
            end: end as u32,
        })
    }
}

impl Iterator for AddressIter {
    type Item = Result<DerivedAddress, WalletError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let index = self.next;
        self.next += 1;
        let derived = DerivationIndex::normal(index)
            .and_then(|i| self.chain_key.derive(i))
            .map(|key| DerivedAddress {
                chain: self.chain,
                index,
                address: Address::from_xpub(&key, self.network),
            })
            .map_err(WalletError::from);
        Some(derived)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.end - self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for AddressIter {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fee::{FlatFee, LinearFee};
    use quill_core::types::{Hash256, UtxoRef};

    fn wallet() -> Wallet {
        Wallet::create(&[0x11; 32], "", Network::Testnet).unwrap()
    }

    #[test]
    fn account_path_and_alias() {
        let w = wallet();
        let acct = w.create_account("savings", 3).unwrap();
        assert_eq!(acct.alias(), "savings");
        assert_eq!(acct.index(), 3);
        assert_eq!(acct.path().to_string(), "m/44'/1815'/3'");
        assert_eq!(acct.network(), Network::Testnet);
    }

    #[test]
    fn same_index_same_keys() {
        let w = wallet();
        let a = w.create_account("a", 0).unwrap();
        let b = w.create_account("b", 0).unwrap();
        assert_eq!(a.xpub(), b.xpub());
        assert_ne!(a.xpub(), w.create_account("c", 1).unwrap().xpub());
    }

    #[test]
    fn generate_one_address_repeatable() {
        let w = wallet();
        let acct = w.create_account("main", 0).unwrap();
        let first: Vec<_> = acct
            .generate_addresses(Chain::External, 0, 1)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        let again: Vec<_> = acct
            .generate_addresses(Chain::External, 0, 1)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].address.encode(), again[0].address.encode());
        assert_eq!(first[0].index, 0);
        assert_eq!(first[0].chain, Chain::External);
    }

    #[test]
    fn iterator_is_exact_and_lazy() {
        let w = wallet();
        let acct = w.create_account("main", 0).unwrap();
        let mut iter = acct.generate_addresses(Chain::Internal, 5, 3).unwrap();
        assert_eq!(iter.len(), 3);
        let restart = iter.clone();
        let first = iter.next().unwrap().unwrap();
        assert_eq!(first.index, 5);
        assert_eq!(iter.len(), 2);
        let indices: Vec<u32> = restart.map(|r| r.unwrap().index).collect();
        assert_eq!(indices, vec![5, 6, 7]);
    }

    #[test]
    fn zero_count_is_empty() {
        let w = wallet();
        let acct = w.create_account("main", 0).unwrap();
        assert_eq!(acct.generate_addresses(Chain::External, 0, 0).unwrap().count(), 0);
    }

    #[test]
    fn range_overflow() {
        let w = wallet();
        let acct = w.create_account("main", 0).unwrap();
        assert!(acct.generate_addresses(Chain::External, INDEX_SPACE - 2, 2).is_ok());
        assert_eq!(
            acct.generate_addresses(Chain::External, INDEX_SPACE - 2, 3).unwrap_err(),
            WalletError::IndexOverflow { start: INDEX_SPACE - 2, count: 3 }
        );
        assert_eq!(
            acct.generate_addresses(Chain::External, u32::MAX, u32::MAX).unwrap_err(),
            WalletError::IndexOverflow { start: u32::MAX, count: u32::MAX }
        );
    }

    #[test]
    fn chains_are_distinct() {
        let w = wallet();
        let acct = w.create_account("main", 0).unwrap();
        assert_ne!(
            acct.address_at(Chain::External, 0).unwrap(),
            acct.address_at(Chain::Internal, 0).unwrap()
        );
    }

    #[test]
    fn iterator_matches_address_at() {
        let w = wallet();
        let acct = w.create_account("main", 0).unwrap();
        for derived in acct.generate_addresses(Chain::External, 10, 4).unwrap() {
            let derived = derived.unwrap();
            assert_eq!(derived.address, acct.address_at(Chain::External, derived.index).unwrap());
        }
    }

    #[test]
    fn public_account_matches_private() {
        let w = wallet();
        let acct = w.create_account("main", 2).unwrap();
        let watch = acct.public();
        for index in [0, 1, 99] {
            for chain in [Chain::External, Chain::Internal] {
                let via_xprv = Address::from_xpub(&acct.xprv_at(chain, index).unwrap().public(), Network::Testnet);
                assert_eq!(watch.address_at(chain, index).unwrap(), via_xprv);
                assert_eq!(acct.address_at(chain, index).unwrap(), via_xprv);
            }
        }
    }

    #[test]
    fn address_index_range() {
        let w = wallet();
        let acct = w.create_account("main", 0).unwrap();
        assert_eq!(
            acct.address_at(Chain::External, INDEX_SPACE).unwrap_err(),
            WalletError::InvalidIndex(INDEX_SPACE)
        );
        assert_eq!(
            acct.xprv_at(Chain::External, INDEX_SPACE).unwrap_err(),
            WalletError::InvalidIndex(INDEX_SPACE)
        );
    }

    #[test]
    fn public_account_serde() {
        let w = wallet();
        let watch = w.create_account("cold", 1).unwrap().public();
        let json = serde_json::to_string(&watch).unwrap();
        let back: PublicAccount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, watch);
    }

    fn funded_skeleton(acct: &Account<'_>) -> TransactionSkeleton {
        let mut builder = TransactionBuilder::new();
        builder.add_input(UtxoRef::new(Hash256([1; 32]), 0), 700_000).unwrap();
        builder.add_input(UtxoRef::new(Hash256([2; 32]), 1), 300_000).unwrap();
        builder
            .add_output(TxOutput {
                address: acct.address_at(Chain::External, 7).unwrap(),
                value: 600_000,
            })
            .unwrap();
        builder.set_change_address(acct.address_at(Chain::Internal, 0).unwrap());
        builder.finalize(&FlatFee(0)).unwrap()
    }

    #[test]
    fn sign_and_verify() {
        let w = wallet();
        let acct = w.create_account("main", 0).unwrap();
        let sk = funded_skeleton(&acct);
        let signers = [Addressing::new(Chain::External, 0), Addressing::new(Chain::External, 1)];
        let signed = acct.sign(&sk, &signers).unwrap();
        assert_eq!(signed.witnesses().len(), 2);
        assert!(signed.verify().is_ok());
        assert_eq!(
            signed.witnesses()[1].xpub,
            acct.xprv_at(Chain::External, 1).unwrap().public()
        );
    }

    #[test]
    fn sign_requires_one_signer_per_input() {
        let w = wallet();
        let acct = w.create_account("main", 0).unwrap();
        let sk = funded_skeleton(&acct);
        assert_eq!(
            acct.sign(&sk, &[Addressing::new(Chain::External, 0)]).unwrap_err(),
            WalletError::SignerCountMismatch { inputs: 2, signers: 1 }
        );
    }

    #[test]
    fn new_transaction_selects_and_balances() {
        let w = wallet();
        let acct = w.create_account("main", 0).unwrap();
        let available = vec![
            TxInput { utxo: UtxoRef::new(Hash256([9; 32]), 0), value: 2_000_000 },
            TxInput { utxo: UtxoRef::new(Hash256([8; 32]), 0), value: 5_000_000 },
        ];
        let outputs = vec![TxOutput {
            address: acct.address_at(Chain::External, 1).unwrap(),
            value: 1_500_000,
        }];
        let change = acct.address_at(Chain::Internal, 0).unwrap();
        let sk = acct
            .new_transaction(&available, &outputs, &change, &LinearFee::default(), SelectionStrategy::LargestFirst)
            .unwrap();
        assert_eq!(sk.inputs().len(), 1);
        assert_eq!(sk.inputs()[0].value, 5_000_000);
        assert_eq!(sk.total_input(), sk.total_output() + sk.fee());
        assert_eq!(sk.change_output().unwrap().address, change);
    }
}
