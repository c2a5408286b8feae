//! Hierarchical deterministic derivation over extended Ed25519 keys.
//!
//! Child keys are computed with HMAC-SHA512 keyed by the parent chain code.
//! Indices are serialized as 32-bit little-endian with hardened indices
//! offset by 2^31. The scalar half of a private child is
//! `kl + 8·Z[0..28]` (plain 256-bit integer addition), which keeps the
//! cofactor bits clear and makes normal derivation commute with taking the
//! public key:
//!
//! ```text
//! derive(xprv, i).public() == derive(xprv.public(), i)    (i not hardened)
//! ```
//!
//! Hardened steps mix the secret into the HMAC input and therefore need a
//! private parent.

use curve25519_dalek::constants::ED25519_BASEPOINT_TABLE;
use curve25519_dalek::edwards::CompressedEdwardsY;
use curve25519_dalek::scalar::Scalar;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

use crate::constants::{BIP44_COIN_TYPE, BIP44_PURPOSE, HARDENED_OFFSET};
use crate::crypto::{ExtendedKey, XPrv, XPub};
use crate::error::KeyError;

type HmacSha512 = Hmac<Sha512>;

/// HMAC domain tags: (key material, chain code) for each derivation kind.
const TAG_HARDENED_KEY: u8 = 0x00;
const TAG_HARDENED_CHAIN: u8 = 0x01;
const TAG_NORMAL_KEY: u8 = 0x02;
const TAG_NORMAL_CHAIN: u8 = 0x03;

/// A child index in the derivation tree.
///
/// Holds the raw 32-bit value; hardened indices carry the top bit. Callers
/// only ever see the 31-bit index and the hardened flag.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DerivationIndex(u32);

impl DerivationIndex {
    /// A normal (non-hardened) index. Fails if `index >= 2^31`.
    pub fn normal(index: u32) -> Result<Self, KeyError> {
        Self::new(index, false)
    }

    /// A hardened index. Fails if `index >= 2^31`.
    pub fn hardened(index: u32) -> Result<Self, KeyError> {
        Self::new(index, true)
    }

    pub fn new(index: u32, hardened: bool) -> Result<Self, KeyError> {
        if index >= HARDENED_OFFSET {
            return Err(KeyError::InvalidIndex(index));
        }
        Ok(Self(if hardened { index | HARDENED_OFFSET } else { index }))
    }

    /// Interpret a raw serialized index (top bit = hardened).
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw serialized value, hardened indices offset by 2^31.
    pub fn to_raw(self) -> u32 {
        self.0
    }

    /// The 31-bit index without the hardened marker.
    pub fn index(self) -> u32 {
        self.0 & !HARDENED_OFFSET
    }

    pub fn is_hardened(self) -> bool {
        self.0 & HARDENED_OFFSET != 0
    }
}

impl fmt::Debug for DerivationIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DerivationIndex({self})")
    }
}

impl fmt::Display for DerivationIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_hardened() {
            write!(f, "{}'", self.index())
        } else {
            write!(f, "{}", self.index())
        }
    }
}

impl FromStr for DerivationIndex {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (digits, hardened) = match s.strip_suffix('\'').or_else(|| s.strip_suffix('h')) {
            Some(rest) => (rest, true),
            None => (s, false),
        };
        let index: u32 = digits
            .parse()
            .map_err(|_| KeyError::InvalidPath(format!("bad index segment: {s}")))?;
        Self::new(index, hardened)
    }
}

impl TryFrom<String> for DerivationIndex {
    type Error = KeyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DerivationIndex> for String {
    fn from(index: DerivationIndex) -> Self {
        index.to_string()
    }
}

/// Address chain within an account (the BIP-44 "change" level).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    /// Receiving addresses handed out to payers.
    External,
    /// Change addresses used by the wallet itself.
    Internal,
}

impl Chain {
    /// The normal derivation index of this chain under an account key.
    pub fn index(self) -> DerivationIndex {
        match self {
            Chain::External => DerivationIndex(0),
            Chain::Internal => DerivationIndex(1),
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chain::External => write!(f, "external"),
            Chain::Internal => write!(f, "internal"),
        }
    }
}

/// An ordered sequence of derivation steps from a root key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct DerivationPath(Vec<DerivationIndex>);

impl DerivationPath {
    /// The empty path (the root itself).
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// `m/44'/1815'/account'`.
    pub fn bip44_account(account: u32) -> Result<Self, KeyError> {
        Ok(Self(vec![
            DerivationIndex::hardened(BIP44_PURPOSE)?,
            DerivationIndex::hardened(BIP44_COIN_TYPE)?,
            DerivationIndex::hardened(account)?,
        ]))
    }

    /// `m/44'/1815'/account'/chain/index`.
    pub fn bip44_address(account: u32, chain: Chain, index: u32) -> Result<Self, KeyError> {
        Ok(Self::bip44_account(account)?
            .child(chain.index())
            .child(DerivationIndex::normal(index)?))
    }

    /// This path extended by one step.
    pub fn child(mut self, index: DerivationIndex) -> Self {
        self.0.push(index);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &DerivationIndex> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for index in &self.0 {
            write!(f, "/{index}")?;
        }
        Ok(())
    }
}

impl FromStr for DerivationPath {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut segments = s.trim().split('/');
        if segments.next() != Some("m") {
            return Err(KeyError::InvalidPath(format!("path must start with 'm': {s}")));
        }
        segments
            .map(str::parse)
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

/// Derive the child of `parent` at `index`.
///
/// Private parents may take any step; public parents only normal steps.
pub fn derive(parent: &ExtendedKey, index: DerivationIndex) -> Result<ExtendedKey, KeyError> {
    match parent {
        ExtendedKey::Private(xprv) => derive_private(xprv, index).map(ExtendedKey::Private),
        ExtendedKey::Public(xpub) => derive_public(xpub, index).map(ExtendedKey::Public),
    }
}

/// Derive with an explicit `(index, hardened)` pair, validating the range.
pub fn derive_child(parent: &ExtendedKey, index: u32, hardened: bool) -> Result<ExtendedKey, KeyError> {
    derive(parent, DerivationIndex::new(index, hardened)?)
}

/// Apply every step of `path` starting from `root`.
pub fn derive_path(root: &ExtendedKey, path: &DerivationPath) -> Result<ExtendedKey, KeyError> {
    path.iter()
        .try_fold(root.clone(), |key, index| derive(&key, *index))
}

impl XPrv {
    pub fn derive(&self, index: DerivationIndex) -> Result<XPrv, KeyError> {
        derive_private(self, index)
    }
}

impl XPub {
    pub fn derive(&self, index: DerivationIndex) -> Result<XPub, KeyError> {
        derive_public(self, index)
    }
}

/// Private-parent derivation.
pub fn derive_private(parent: &XPrv, index: DerivationIndex) -> Result<XPrv, KeyError> {
    let raw = index.to_raw().to_le_bytes();
    let chain_code = parent.chain_code();

    let (z, i) = if index.is_hardened() {
        (
            hmac_sha512(chain_code, &[&[TAG_HARDENED_KEY], parent.kl(), parent.kr(), &raw])?,
            hmac_sha512(chain_code, &[&[TAG_HARDENED_CHAIN], parent.kl(), parent.kr(), &raw])?,
        )
    } else {
        let point = parent.public_key_bytes();
        (
            hmac_sha512(chain_code, &[&[TAG_NORMAL_KEY], &point, &raw])?,
            hmac_sha512(chain_code, &[&[TAG_NORMAL_CHAIN], &point, &raw])?,
        )
    };

    let kl = add_28_mul8(parent.kl(), &z[..28]);
    let kr = add_256(parent.kr(), &z[32..]);
    let mut child_chain_code = [0u8; 32];
    child_chain_code.copy_from_slice(&i[32..]);

    Ok(XPrv::from_halves(kl, kr, child_chain_code))
}

/// Public-parent derivation. Hardened steps are rejected.
pub fn derive_public(parent: &XPub, index: DerivationIndex) -> Result<XPub, KeyError> {
    if index.is_hardened() {
        return Err(KeyError::PublicDerivationOfHardenedChild);
    }
    let raw = index.to_raw().to_le_bytes();
    let point = parent.public_key_bytes();
    let chain_code = parent.chain_code();

    let z = hmac_sha512(chain_code, &[&[TAG_NORMAL_KEY], point, &raw])?;
    let i = hmac_sha512(chain_code, &[&[TAG_NORMAL_CHAIN], point, &raw])?;

    let parent_point = CompressedEdwardsY(*point)
        .decompress()
        .ok_or(KeyError::InvalidPublicKey)?;
    let tweak = Scalar::from_bytes_mod_order(add_28_mul8(&[0u8; 32], &z[..28]));
    let child_point = parent_point + &*ED25519_BASEPOINT_TABLE * &tweak;

    let mut child_chain_code = [0u8; 32];
    child_chain_code.copy_from_slice(&i[32..]);
    Ok(XPub::from_parts(child_point.compress().to_bytes(), child_chain_code))
}

fn hmac_sha512(key: &[u8], parts: &[&[u8]]) -> Result<Zeroizing<[u8; 64]>, KeyError> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|_| KeyError::InvalidExtendedKey("chain code rejected by HMAC".into()))?;
    for part in parts {
        mac.update(part);
    }
    let mut out = Zeroizing::new([0u8; 64]);
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// `x + 8·y` where `y` is 28 little-endian bytes; carry out of byte 31 is dropped.
fn add_28_mul8(x: &[u8; 32], y: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let mut carry: u16 = 0;
    for i in 0..32 {
        let y8 = if i < 28 { (y[i] as u16) << 3 } else { 0 };
        let r = x[i] as u16 + y8 + carry;
        out[i] = (r & 0xff) as u8;
        carry = r >> 8;
    }
    out
}

/// `x + y mod 2^256`, little-endian.
fn add_256(x: &[u8; 32], y: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let mut carry: u16 = 0;
    for i in 0..32 {
        let r = x[i] as u16 + y[i] as u16 + carry;
        out[i] = (r & 0xff) as u8;
        carry = r >> 8;
    }
    out
}
