//! Errors that stop an evaluation before it can produce a verdict.
//!
//! A transaction failing a rule is *not* an error; it is a rejected
//! [`Verdict`](super::Verdict). These are the cases where no honest verdict
//! exists: the bytes are bad, or the caller did not supply enough context.

use thiserror::Error;

use crate::encoding::DecodeError;
use crate::transaction::OutPoint;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// The transaction could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// An input spends an output the context knows nothing about. Not the
    /// transaction's fault: fetch the prevout and try again.
    #[error("no prevout known for {outpoint}")]
    MissingPrevout { outpoint: OutPoint },

    /// Outputs are worth more than the inputs they spend.
    #[error("outputs ({output_value} sat) exceed inputs ({input_value} sat)")]
    NegativeFee { input_value: u64, output_value: u64 },

    /// A value sum overflowed or passed the 21M BTC cap.
    #[error("{what} out of range")]
    ValueOutOfRange { what: &'static str },
}

impl PolicyError {
    /// `true` when the context, not the transaction, is at fault.
    pub fn is_context_error(&self) -> bool {
        matches!(self, PolicyError::MissingPrevout { .. })
    }

    /// Stable machine-readable name, e.g. for an API error body.
    pub fn kind(&self) -> &'static str {
        match self {
            PolicyError::Decode(err) => err.kind(),
            PolicyError::MissingPrevout { .. } => "missing_prevout",
            PolicyError::NegativeFee { .. } => "negative_fee",
            PolicyError::ValueOutOfRange { .. } => "value_out_of_range",
        }
    }
}
