//! # Wire Encoding Primitives
//!
//! Bitcoin's serialization is refreshingly boring: little-endian fixed-width
//! integers, plus one variable-length integer format ("compact size") used
//! for every count and length prefix. This module reads and writes both.
//!
//! ```text
//! cursor.rs  — Borrowing byte cursor with explicit position (the reader)
//! writer.rs  — Compact-size and length-prefixed writers (the encoder side)
//! error.rs   — DecodeError, shared by the codec and the transaction decoder
//! hash.rs    — Double SHA-256
//! ```
//!
//! Reading never allocates: every `read_*` hands back either a copy of a
//! fixed-width value or a slice borrowed from the input. Truncation is
//! detected *before* the cursor moves, so a failed read leaves the position
//! where it was and the error names the exact offset.

pub mod cursor;
pub mod error;
pub mod hash;
pub mod writer;

pub use cursor::Cursor;
pub use error::DecodeError;
pub use hash::sha256d;
pub use writer::{compact_size_len, write_compact_size, write_var_bytes};

/// Largest compact-size value accepted as a count or length.
///
/// Mirrors the reference node's `MAX_SIZE` (32 MiB). Anything bigger cannot
/// belong to a relayable transaction and would only invite huge allocations.
pub const MAX_COMPACT_SIZE: u64 = 0x0200_0000;
