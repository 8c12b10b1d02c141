//! # Policy Module
//!
//! Decides whether a decoded transaction would be relayed by a node running
//! the stricter anti-spam policy.
//!
//! ## Architecture
//!
//! ```text
//! context.rs    — PolicyContext (prevouts + thresholds), PrevoutSource
//! fee.rs        — FeeRate (exact rational), fee, sigop-adjusted weight
//! dust.rs       — Per-class spend cost and the dust predicate
//! overlay.rs    — Data-carrier and overlay-protocol heuristics
//! evaluator.rs  — The rule engine: evaluate(), check_hex()
//! verdict.rs    — Verdict, RuleRecord, RuleName, Comparison
//! error.rs      — PolicyError
//! ```
//!
//! ## Error Model
//!
//! Failing a rule produces a rejected [`Verdict`], never an error. A
//! [`PolicyError`] means no verdict could be reached: either the input is
//! bad, or the context is missing a prevout
//! ([`PolicyError::is_context_error`]), in which case the caller should
//! fetch it and retry.

pub mod context;
pub mod dust;
pub mod error;
pub mod evaluator;
pub mod fee;
pub mod overlay;
pub mod verdict;

pub use context::{PolicyContext, PrevoutSource};
pub use dust::{estimated_input_vsize, is_dust, spend_cost};
pub use error::PolicyError;
pub use evaluator::{check_hex, evaluate};
pub use fee::{
    compute_fee, compute_fee_rate, sigop_adjusted_vsize, sigop_adjusted_weight, sigop_cost,
    FeeRate,
};
pub use overlay::{flag_overlay, OverlayKind, OverlaySignal};
pub use verdict::{
    Bound, Comparison, Outcome, Quantity, RuleName, RuleRecord, Subject, Verdict,
};
