//! The evaluator's answer.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::fee::FeeRate;
use super::overlay::OverlaySignal;
use crate::transaction::Txid;

/// The rules, in the order they run and are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleName {
    Structure,
    ScriptSig,
    OutputScripts,
    TxWeight,
    FeeRate,
    Dust,
    Overlay,
}

impl RuleName {
    pub const ALL: [RuleName; 7] = [
        RuleName::Structure,
        RuleName::ScriptSig,
        RuleName::OutputScripts,
        RuleName::TxWeight,
        RuleName::FeeRate,
        RuleName::Dust,
        RuleName::Overlay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleName::Structure => "structure",
            RuleName::ScriptSig => "script_sig",
            RuleName::OutputScripts => "output_scripts",
            RuleName::TxWeight => "tx_weight",
            RuleName::FeeRate => "fee_rate",
            RuleName::Dust => "dust",
            RuleName::Overlay => "overlay",
        }
    }
}

impl fmt::Display for RuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    Failed,
}

/// The unit a compared number is measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "unit", content = "value", rename_all = "snake_case")]
pub enum Quantity {
    Count(u64),
    Bytes(u64),
    Weight(u64),
    Sats(u64),
    FeeRate(FeeRate),
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantity::Count(n) => write!(f, "{}", n),
            Quantity::Bytes(n) => write!(f, "{} bytes", n),
            Quantity::Weight(n) => write!(f, "{} WU", n),
            Quantity::Sats(n) => write!(f, "{} sat", n),
            Quantity::FeeRate(rate) => write!(f, "{}", rate),
        }
    }
}

/// What a comparison was about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", content = "index", rename_all = "snake_case")]
pub enum Subject {
    Transaction,
    Input(usize),
    Output(usize),
}

/// Which side of the threshold is acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bound {
    /// `observed >= threshold`.
    AtLeast,
    /// `observed <= threshold`.
    AtMost,
}

/// One number a rule checked against its limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Comparison {
    pub subject: Subject,
    pub observed: Quantity,
    pub bound: Bound,
    pub threshold: Quantity,
    pub met: bool,
}

impl Comparison {
    pub fn at_least(subject: Subject, observed: Quantity, threshold: Quantity) -> Self {
        Self {
            subject,
            observed,
            bound: Bound::AtLeast,
            threshold,
            met: observed >= threshold,
        }
    }

    pub fn at_most(subject: Subject, observed: Quantity, threshold: Quantity) -> Self {
        Self {
            subject,
            observed,
            bound: Bound::AtMost,
            threshold,
            met: observed <= threshold,
        }
    }
}

/// How one rule went.
///
/// `detail` is for people. `comparisons` carries every numeric check the
/// rule made, met or not, so a renderer never parses `detail`. Checks with
/// no number behind them (push-only script-sigs, script templates,
/// duplicate inputs) appear only in `detail`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleRecord {
    pub rule: RuleName,
    pub outcome: Outcome,
    pub detail: String,
    pub comparisons: Vec<Comparison>,
}

impl RuleRecord {
    pub fn passed(rule: RuleName, detail: impl Into<String>) -> Self {
        Self {
            rule,
            outcome: Outcome::Passed,
            detail: detail.into(),
            comparisons: Vec::new(),
        }
    }

    pub fn failed(rule: RuleName, detail: impl Into<String>) -> Self {
        Self {
            rule,
            outcome: Outcome::Failed,
            detail: detail.into(),
            comparisons: Vec::new(),
        }
    }

    pub fn with_comparisons(mut self, comparisons: Vec<Comparison>) -> Self {
        self.comparisons = comparisons;
        self
    }

    pub fn is_failed(&self) -> bool {
        self.outcome == Outcome::Failed
    }

    /// Comparisons whose threshold was not met.
    pub fn unmet(&self) -> impl Iterator<Item = &Comparison> {
        self.comparisons.iter().filter(|c| !c.met)
    }
}

/// Result of evaluating one transaction against one context.
///
/// `records` holds exactly one entry per [`RuleName::ALL`] member, in that
/// order. `accepted` is `true` iff none of them failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub accepted: bool,
    pub txid: Txid,
    pub wtxid: Txid,
    pub weight: u64,
    pub vsize: u64,
    /// Satoshis.
    pub fee: u64,
    pub fee_rate: FeeRate,
    pub records: Vec<RuleRecord>,
    /// Every overlay finding, permitted or not.
    pub overlay_signals: Vec<OverlaySignal>,
}

impl Verdict {
    pub fn failures(&self) -> impl Iterator<Item = &RuleRecord> {
        self.records.iter().filter(|r| r.is_failed())
    }

    pub fn record(&self, rule: RuleName) -> Option<&RuleRecord> {
        self.records.iter().find(|r| r.rule == rule)
    }
}
