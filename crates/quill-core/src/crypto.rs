//! Extended Ed25519 key material.
//!
//! An extended private key is a 64-byte extended secret (`kl || kr`) plus a
//! 32-byte chain code. `kl` is used directly as the Ed25519 scalar and `kr`
//! as the nonce prefix, so signing goes through the `hazmat` interface of
//! ed25519-dalek rather than re-hashing a 32-byte seed.
//!
//! The public half is the Ed25519 point `kl·B` plus the same chain code.
//! [`ExtendedKey`] is the tagged union the derivation engine matches on.

use curve25519_dalek::constants::ED25519_BASEPOINT_TABLE;
use curve25519_dalek::edwards::CompressedEdwardsY;
use curve25519_dalek::scalar::Scalar;
use ed25519_dalek::hazmat::{raw_sign, ExpandedSecretKey};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Sha512;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::constants::{CHAIN_CODE_SIZE, EXTENDED_SECRET_SIZE, SIGNATURE_SIZE, XPRV_SIZE, XPUB_SIZE};
use crate::error::{CryptoError, KeyError};

/// Extended private key: `kl || kr` plus chain code.
///
/// Secret material is zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct XPrv {
    kl: [u8; 32],
    kr: [u8; 32],
    chain_code: [u8; CHAIN_CODE_SIZE],
}

impl XPrv {
    /// Build a master key from 96 bytes of stretched seed material.
    ///
    /// Clears the lowest three bits and the top three bits of `kl`, then
    /// sets bit 254, so the scalar is a multiple of the cofactor and
    /// leaves headroom for child additions.
    pub fn from_normalized_seed(mut seed: [u8; XPRV_SIZE]) -> Self {
        seed[0] &= 0b1111_1000;
        seed[31] &= 0b0001_1111;
        seed[31] |= 0b0100_0000;
        let xprv = Self::from_parts_unchecked(&seed);
        seed.zeroize();
        xprv
    }

    /// Parse a serialized `kl || kr || cc`, rejecting malformed scalars.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != XPRV_SIZE {
            return Err(KeyError::InvalidLength {
                expected: XPRV_SIZE,
                actual: bytes.len(),
            });
        }
        if bytes[0] & 0b0000_0111 != 0 {
            return Err(KeyError::InvalidExtendedKey(
                "lowest three bits of the scalar must be cleared".into(),
            ));
        }
        if bytes[31] & 0b1000_0000 != 0 {
            return Err(KeyError::InvalidExtendedKey(
                "highest bit of the scalar must be cleared".into(),
            ));
        }
        if bytes[31] & 0b0100_0000 == 0 {
            return Err(KeyError::InvalidExtendedKey(
                "second highest bit of the scalar must be set".into(),
            ));
        }
        Ok(Self::from_parts_unchecked(bytes))
    }

    /// Parse a hex-encoded extended private key.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let mut bytes = hex::decode(s.trim()).map_err(|e| KeyError::InvalidHex(e.to_string()))?;
        let result = Self::from_bytes(&bytes);
        bytes.zeroize();
        result
    }

    pub(crate) fn from_parts_unchecked(bytes: &[u8]) -> Self {
        let mut kl = [0u8; 32];
        let mut kr = [0u8; 32];
        let mut chain_code = [0u8; CHAIN_CODE_SIZE];
        kl.copy_from_slice(&bytes[..32]);
        kr.copy_from_slice(&bytes[32..EXTENDED_SECRET_SIZE]);
        chain_code.copy_from_slice(&bytes[EXTENDED_SECRET_SIZE..XPRV_SIZE]);
        Self { kl, kr, chain_code }
    }

    pub(crate) fn from_halves(kl: [u8; 32], kr: [u8; 32], chain_code: [u8; 32]) -> Self {
        Self { kl, kr, chain_code }
    }

    /// Serialize as `kl || kr || cc`. Handle with care.
    pub fn to_bytes(&self) -> [u8; XPRV_SIZE] {
        let mut out = [0u8; XPRV_SIZE];
        out[..32].copy_from_slice(&self.kl);
        out[32..EXTENDED_SECRET_SIZE].copy_from_slice(&self.kr);
        out[EXTENDED_SECRET_SIZE..].copy_from_slice(&self.chain_code);
        out
    }

    /// The scalar half `kl`.
    pub(crate) fn kl(&self) -> &[u8; 32] {
        &self.kl
    }

    /// The nonce-prefix half `kr`.
    pub(crate) fn kr(&self) -> &[u8; 32] {
        &self.kr
    }

    pub fn chain_code(&self) -> &[u8; CHAIN_CODE_SIZE] {
        &self.chain_code
    }

    fn scalar(&self) -> Scalar {
        Scalar::from_bytes_mod_order(self.kl)
    }

    /// The Ed25519 point `kl·B` in compressed form.
    pub fn public_key_bytes(&self) -> [u8; 32] {
        (&*ED25519_BASEPOINT_TABLE * &self.scalar()).compress().to_bytes()
    }

    /// The extended public key sharing this key's chain code.
    pub fn public(&self) -> XPub {
        XPub {
            point: self.public_key_bytes(),
            chain_code: self.chain_code,
        }
    }

    /// Sign a message with the extended secret.
    ///
    /// The nonce is `H(kr || message)`, so signatures are deterministic.
    pub fn sign(&self, message: &[u8]) -> Result<[u8; SIGNATURE_SIZE], CryptoError> {
        let verifying_key = VerifyingKey::from_bytes(&self.public_key_bytes())
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        let esk = ExpandedSecretKey {
            scalar: self.scalar(),
            hash_prefix: self.kr,
        };
        Ok(raw_sign::<Sha512>(&esk, message, &verifying_key).to_bytes())
    }
}

impl Clone for XPrv {
    fn clone(&self) -> Self {
        Self {
            kl: self.kl,
            kr: self.kr,
            chain_code: self.chain_code,
        }
    }
}

impl PartialEq for XPrv {
    fn eq(&self, other: &Self) -> bool {
        self.kl == other.kl && self.kr == other.kr && self.chain_code == other.chain_code
    }
}

impl Eq for XPrv {}

impl fmt::Debug for XPrv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XPrv")
            .field("public", &self.public())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Extended public key: Ed25519 point plus chain code.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct XPub {
    point: [u8; 32],
    chain_code: [u8; CHAIN_CODE_SIZE],
}

impl XPub {
    /// Parse `point || cc`. The point must decompress to a curve point.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != XPUB_SIZE {
            return Err(KeyError::InvalidLength {
                expected: XPUB_SIZE,
                actual: bytes.len(),
            });
        }
        let mut point = [0u8; 32];
        let mut chain_code = [0u8; CHAIN_CODE_SIZE];
        point.copy_from_slice(&bytes[..32]);
        chain_code.copy_from_slice(&bytes[32..]);
        if CompressedEdwardsY(point).decompress().is_none() {
            return Err(KeyError::InvalidPublicKey);
        }
        Ok(Self { point, chain_code })
    }

    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s.trim()).map_err(|e| KeyError::InvalidHex(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    pub(crate) fn from_parts(point: [u8; 32], chain_code: [u8; 32]) -> Self {
        Self { point, chain_code }
    }

    pub fn to_bytes(&self) -> [u8; XPUB_SIZE] {
        let mut out = [0u8; XPUB_SIZE];
        out[..32].copy_from_slice(&self.point);
        out[32..].copy_from_slice(&self.chain_code);
        out
    }

    /// The compressed Ed25519 point.
    pub fn public_key_bytes(&self) -> &[u8; 32] {
        &self.point
    }

    pub fn chain_code(&self) -> &[u8; CHAIN_CODE_SIZE] {
        &self.chain_code
    }

    /// Verify an Ed25519 signature made by the matching [`XPrv`].
    pub fn verify(&self, message: &[u8], signature: &[u8; SIGNATURE_SIZE]) -> Result<(), CryptoError> {
        let vk = VerifyingKey::from_bytes(&self.point).map_err(|_| CryptoError::InvalidPublicKey)?;
        let sig = Signature::from_bytes(signature);
        vk.verify(message, &sig)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

impl fmt::Debug for XPub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "XPub({})", hex::encode(self.to_bytes()))
    }
}

impl fmt::Display for XPub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.to_bytes()))
    }
}

impl Serialize for XPub {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.to_bytes()))
    }
}

impl<'de> Deserialize<'de> for XPub {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Key material at a node of the derivation tree.
///
/// Derivation pattern-matches on the variant: only `Private` may take a
/// hardened step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExtendedKey {
    Private(XPrv),
    Public(XPub),
}

impl ExtendedKey {
    /// The public counterpart; a no-op for the `Public` variant.
    pub fn public(&self) -> XPub {
        match self {
            ExtendedKey::Private(xprv) => xprv.public(),
            ExtendedKey::Public(xpub) => *xpub,
        }
    }

    pub fn is_private(&self) -> bool {
        matches!(self, ExtendedKey::Private(_))
    }

    pub fn chain_code(&self) -> &[u8; CHAIN_CODE_SIZE] {
        match self {
            ExtendedKey::Private(xprv) => xprv.chain_code(),
            ExtendedKey::Public(xpub) => xpub.chain_code(),
        }
    }
}

impl From<XPrv> for ExtendedKey {
    fn from(xprv: XPrv) -> Self {
        ExtendedKey::Private(xprv)
    }
}

impl From<XPub> for ExtendedKey {
    fn from(xpub: XPub) -> Self {
        ExtendedKey::Public(xpub)
    }
}
