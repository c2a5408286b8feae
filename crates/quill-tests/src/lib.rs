//! Cross-crate test suite for the Quill wallet core.
//!
//! Integration tests drive the wallet the way a client would: entropy in,
//! addresses and balanced, signed transactions out. Property tests check
//! the invariants that must hold for every input.

pub mod helpers;
