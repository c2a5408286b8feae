//! Address encoding for Quill wallets.
//!
//! An address commits to an extended public key and a network:
//!
//! ```text
//! root    = BLAKE3("quill-address-v0" || protocol_magic_le32 || xpub(64))
//! payload = version(1) || network_tag(1) || root(32)
//! address = Base58Check(payload)
//! ```
//!
//! Base58Check appends the first four bytes of a double SHA-256 over the
//! payload, so any single-character corruption is rejected on decode.
//! Validation needs no key material.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::constants::ADDRESS_VERSION;
use crate::crypto::XPub;
use crate::error::AddressError;
use crate::types::Hash256;

/// Domain separator mixed into every address root.
const ADDRESS_DOMAIN: &[u8] = b"quill-address-v0";

/// version + network tag + root.
const PAYLOAD_LEN: usize = 1 + 1 + 32;

/// Network an address belongs to.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize,
    bincode::Encode, bincode::Decode,
)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    /// Protocol magic hashed into address roots.
    pub fn protocol_magic(&self) -> u32 {
        match self {
            Network::Mainnet => 764_824_073,
            Network::Testnet => 1_097_911_063,
        }
    }

    /// Single-byte tag carried in the address payload.
    pub fn tag(&self) -> u8 {
        match self {
            Network::Mainnet => 0x01,
            Network::Testnet => 0x00,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self, AddressError> {
        match tag {
            0x01 => Ok(Network::Mainnet),
            0x00 => Ok(Network::Testnet),
            other => Err(AddressError::UnknownNetwork(other)),
        }
    }

    /// Parse a network name as used in configuration ("mainnet" / "testnet").
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "main" => Some(Network::Mainnet),
            "testnet" | "test" => Some(Network::Testnet),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A Quill address: network, version byte and the 32-byte key root.
///
/// Immutable value object. Two addresses are equal iff their encodings are.
#[derive(Clone, Debug, PartialEq, Eq, Hash, bincode::Encode, bincode::Decode)]
pub struct Address {
    network: Network,
    version: u8,
    root: Hash256,
}

impl Address {
    /// Address committing to `xpub` on `network`.
    pub fn from_xpub(xpub: &XPub, network: Network) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(ADDRESS_DOMAIN);
        hasher.update(&network.protocol_magic().to_le_bytes());
        hasher.update(&xpub.to_bytes());
        Self::from_root(Hash256(hasher.finalize().into()), network)
    }

    pub fn from_root(root: Hash256, network: Network) -> Self {
        Self {
            network,
            version: ADDRESS_VERSION,
            root,
        }
    }

    pub fn root(&self) -> Hash256 {
        self.root
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// Raw payload before the checksum is appended.
    pub fn payload(&self) -> [u8; PAYLOAD_LEN] {
        let mut out = [0u8; PAYLOAD_LEN];
        out[0] = self.version;
        out[1] = self.network.tag();
        out[2..].copy_from_slice(self.root.as_bytes());
        out
    }

    /// Base58Check text form.
    pub fn encode(&self) -> String {
        bs58::encode(self.payload()).with_check().into_string()
    }

    /// Parse and fully validate an address string.
    pub fn decode(s: &str) -> Result<Self, AddressError> {
        let payload = bs58::decode(s)
            .with_check(None)
            .into_vec()
            .map_err(map_bs58_error)?;

        if payload.len() != PAYLOAD_LEN {
            return Err(AddressError::InvalidLength(payload.len()));
        }
        let version = payload[0];
        if version != ADDRESS_VERSION {
            return Err(AddressError::InvalidVersion(version));
        }
        let network = Network::from_tag(payload[1])?;

        let mut root = [0u8; 32];
        root.copy_from_slice(&payload[2..]);
        Ok(Self {
            network,
            version,
            root: Hash256(root),
        })
    }

    /// Whether `s` decodes to a well-formed address. `true` means valid.
    pub fn is_valid(s: &str) -> bool {
        Self::decode(s).is_ok()
    }
}

fn map_bs58_error(err: bs58::decode::Error) -> AddressError {
    match err {
        bs58::decode::Error::InvalidCharacter { character, .. } => {
            AddressError::InvalidCharacter(character)
        }
        bs58::decode::Error::InvalidChecksum { .. } => AddressError::InvalidChecksum,
        bs58::decode::Error::NoChecksum => AddressError::InvalidLength(0),
        other => AddressError::InvalidEncoding(other.to_string()),
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::decode(&s).map_err(serde::de::Error::custom)
    }
}
