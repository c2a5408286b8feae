//! # quill-core
//! Key material, derivation engine, address encoding and transaction
//! skeleton types for the Quill wallet.

pub mod address;
pub mod constants;
pub mod crypto;
pub mod derivation;
pub mod error;
pub mod types;
