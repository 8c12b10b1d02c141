//! Errors raised while turning hex or bytes into a transaction.

use thiserror::Error;

/// Everything that can go wrong before a [`Transaction`] exists.
///
/// Every variant is an *input* error: the bytes are bad, and no amount of
/// retrying will fix them. Offsets are byte positions into the decoded
/// (binary) input, not into the hex string.
///
/// [`Transaction`]: crate::transaction::Transaction
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The hex string has an odd length or contains non-hex characters.
    #[error("invalid hex encoding: {reason}")]
    InvalidHexEncoding {
        /// What the hex decoder tripped on.
        reason: String,
    },

    /// Fewer bytes remain than the field being read requires.
    #[error("truncated input at offset {offset}: needed {needed} bytes, {remaining} remaining")]
    TruncatedInput {
        /// Offset where the failed read started.
        offset: usize,
        /// Bytes the field needed.
        needed: usize,
        /// Bytes that were actually left.
        remaining: usize,
    },

    /// A field was present but its value makes no structural sense.
    #[error("malformed transaction at offset {offset}: expected {expected}, found {found}")]
    MalformedTransaction {
        /// Offset of the offending field.
        offset: usize,
        /// What the decoder wanted to see.
        expected: String,
        /// What it saw instead.
        found: String,
    },

    /// Bytes remain after the lock time.
    #[error("{remaining} trailing bytes after lock time at offset {offset}")]
    TrailingBytes {
        /// Offset of the first unexpected byte.
        offset: usize,
        /// Number of unexpected bytes.
        remaining: usize,
    },

    /// The transaction has no inputs or no outputs.
    #[error("transaction needs inputs and outputs (inputs: {inputs}, outputs: {outputs})")]
    EmptyInputsOrOutputs {
        /// Declared input count.
        inputs: usize,
        /// Declared output count.
        outputs: usize,
    },
}

impl DecodeError {
    /// Stable machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            DecodeError::InvalidHexEncoding { .. } => "invalid_hex_encoding",
            DecodeError::TruncatedInput { .. } => "truncated_input",
            DecodeError::MalformedTransaction { .. } => "malformed_transaction",
            DecodeError::TrailingBytes { .. } => "trailing_bytes",
            DecodeError::EmptyInputsOrOutputs { .. } => "empty_inputs_or_outputs",
        }
    }

    /// Shorthand for [`DecodeError::MalformedTransaction`].
    pub(crate) fn malformed(
        offset: usize,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::MalformedTransaction {
            offset,
            expected: expected.into(),
            found: found.into(),
        }
    }
}
