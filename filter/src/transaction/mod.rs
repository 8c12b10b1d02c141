//! # Transaction Module
//!
//! The structured form of a raw Bitcoin transaction, and the code that
//! moves between that form and wire bytes.
//!
//! ## Architecture
//!
//! ```text
//! types.rs   — Transaction, TxIn, TxOut, OutPoint, Txid, Witness, LockTime
//! decode.rs  — Hex and wire-format decoding (legacy and segwit)
//! encode.rs  — Wire encoding, sizes, weight, txid/wtxid
//! ```
//!
//! ## Design Decisions
//!
//! - Transaction ids are stored in wire byte order. Only `Display`/`FromStr`
//!   reverse them, because that is the only place humans look at them.
//! - Witnesses live on the transaction as `Option<Vec<Witness>>`, not on the
//!   inputs: `Some` means the bytes carried the segwit marker and flag. That
//!   keeps `decode(encode(tx)) == tx` exact.
//! - Values are `u64` satoshis. Summing them is the policy layer's problem,
//!   and it does so with checked arithmetic.

pub mod decode;
pub mod encode;
pub mod types;

pub use decode::decode_hex;
pub use types::{
    LockTime, OutPoint, Transaction, TxIn, TxOut, Txid, Witness, LOCKTIME_THRESHOLD,
    MAX_BIP125_RBF_SEQUENCE, SEQUENCE_FINAL,
};
