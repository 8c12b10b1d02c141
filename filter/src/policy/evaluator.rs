//! # Rule Engine
//!
//! Runs every rule in [`RuleName::ALL`] order and collects a record for
//! each. There is no short-circuit: a transaction that fails the fee rule is
//! still checked for dust, so the submitter sees every problem in one pass.
//!
//! Each rule fills a [`Findings`]: a failure line per violation and a
//! [`Comparison`] per numeric check. Details always name the value compared
//! and the threshold.

use std::collections::BTreeSet;

use tracing::{debug, info};

use super::context::PolicyContext;
use super::dust::{is_dust, spend_cost};
use super::error::PolicyError;
use super::fee::{compute_fee_rate, sigop_adjusted_weight, FeeRate};
use super::overlay::{flag_overlay, OverlaySignal};
use super::verdict::{Comparison, Quantity, RuleName, RuleRecord, Subject, Verdict};
use crate::script::{classify, is_push_only, ScriptClass};
use crate::transaction::Transaction;

/// Facts several rules need, computed once.
struct Facts {
    fee_rate: FeeRate,
    classes: Vec<ScriptClass>,
    signals: Vec<OverlaySignal>,
}

/// What one rule found.
#[derive(Default)]
struct Findings {
    failures: Vec<String>,
    comparisons: Vec<Comparison>,
}

impl Findings {
    fn fail(&mut self, detail: String) {
        self.failures.push(detail);
    }

    /// Keeps `comparison` and reports whether it was met.
    fn compare(&mut self, comparison: Comparison) -> bool {
        self.comparisons.push(comparison);
        comparison.met
    }

    fn into_record(self, rule: RuleName, passed: String) -> RuleRecord {
        let record = if self.failures.is_empty() {
            RuleRecord::passed(rule, passed)
        } else {
            RuleRecord::failed(rule, self.failures.join("; "))
        };
        record.with_comparisons(self.comparisons)
    }
}

/// Evaluates `tx` against `ctx`.
///
/// A transaction without inputs spends nothing and is priced at a zero fee,
/// so the structure rule gets to report it instead of the fee failing.
///
/// # Errors
///
/// Fails without a verdict when the fee cannot be computed:
/// [`PolicyError::MissingPrevout`] if the context lacks a spent output,
/// [`PolicyError::NegativeFee`] or [`PolicyError::ValueOutOfRange`] if the
/// values make no sense. Failed rules are not errors.
pub fn evaluate(tx: &Transaction, ctx: &PolicyContext) -> Result<Verdict, PolicyError> {
    let txid = tx.txid();
    let fee_rate = if tx.inputs.is_empty() {
        FeeRate::ZERO
    } else {
        compute_fee_rate(tx, ctx)?
    };
    let fee = fee_rate.sats();
    let vsize = tx.vsize();
    let facts = Facts {
        fee_rate,
        classes: tx
            .outputs
            .iter()
            .map(|output| classify(&output.script_pubkey))
            .collect(),
        signals: flag_overlay(tx, ctx),
    };

    let records: Vec<RuleRecord> = RuleName::ALL
        .iter()
        .map(|&rule| {
            let record = match rule {
                RuleName::Structure => check_structure(tx),
                RuleName::ScriptSig => check_script_sigs(tx, ctx),
                RuleName::OutputScripts => check_output_scripts(tx, ctx, &facts),
                RuleName::TxWeight => check_weight(tx, ctx),
                RuleName::FeeRate => check_fee_rate(ctx, &facts),
                RuleName::Dust => check_dust(tx, ctx, &facts),
                RuleName::Overlay => check_overlay(ctx, &facts),
            };
            debug!(
                %txid,
                rule = rule.as_str(),
                outcome = ?record.outcome,
                detail = %record.detail,
                "rule evaluated"
            );
            record
        })
        .collect();

    let accepted = !records.iter().any(RuleRecord::is_failed);
    info!(
        %txid,
        accepted,
        fee,
        vsize,
        fee_rate = %facts.fee_rate,
        failed = records.iter().filter(|r| r.is_failed()).count(),
        "transaction evaluated"
    );

    Ok(Verdict {
        accepted,
        txid,
        wtxid: tx.wtxid(),
        weight: tx.weight(),
        vsize,
        fee,
        fee_rate: facts.fee_rate,
        records,
        overlay_signals: facts.signals,
    })
}

/// Decodes a hex transaction and evaluates it.
pub fn check_hex(hex: &str, ctx: &PolicyContext) -> Result<Verdict, PolicyError> {
    let tx = Transaction::from_hex(hex)?;
    evaluate(&tx, ctx)
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

fn count(n: usize) -> Quantity {
    Quantity::Count(n as u64)
}

fn check_structure(tx: &Transaction) -> RuleRecord {
    let mut findings = Findings::default();
    let whole = Subject::Transaction;
    if !findings.compare(Comparison::at_least(whole, count(tx.inputs.len()), count(1))) {
        findings.fail("no inputs".to_string());
    }
    if !findings.compare(Comparison::at_least(whole, count(tx.outputs.len()), count(1))) {
        findings.fail("no outputs".to_string());
    }
    if let Some(witnesses) = &tx.witnesses {
        if witnesses.len() != tx.inputs.len() {
            findings.fail(format!(
                "{} witnesses for {} inputs",
                witnesses.len(),
                tx.inputs.len()
            ));
        }
    }
    let mut seen = BTreeSet::new();
    for input in &tx.inputs {
        if !seen.insert(input.previous_output) {
            findings.fail(format!("{} spent twice", input.previous_output));
        }
    }
    findings.into_record(
        RuleName::Structure,
        format!("{} inputs, {} outputs", tx.inputs.len(), tx.outputs.len()),
    )
}

fn check_script_sigs(tx: &Transaction, ctx: &PolicyContext) -> RuleRecord {
    let mut findings = Findings::default();
    let limit = Quantity::Bytes(ctx.max_script_sig_size as u64);
    for (index, input) in tx.inputs.iter().enumerate() {
        let size = input.script_sig.len();
        let within = Comparison::at_most(Subject::Input(index), Quantity::Bytes(size as u64), limit);
        if !findings.compare(within) {
            findings.fail(format!(
                "input {}: script_sig {} bytes > {}",
                index, size, ctx.max_script_sig_size
            ));
        }
        if !is_push_only(&input.script_sig) {
            findings.fail(format!("input {}: script_sig is not push-only", index));
        }
    }
    findings.into_record(
        RuleName::ScriptSig,
        format!(
            "all script_sigs push-only and <= {} bytes",
            ctx.max_script_sig_size
        ),
    )
}

fn check_output_scripts(tx: &Transaction, ctx: &PolicyContext, facts: &Facts) -> RuleRecord {
    let mut findings = Findings::default();
    for (index, (output, class)) in tx.outputs.iter().zip(&facts.classes).enumerate() {
        let accepted = ctx.accepted_scripts.contains(&class.kind())
            || ctx.whitelisted_scripts.contains(&output.script_pubkey);
        if !accepted {
            findings.fail(format!("output {}: {} not accepted", index, class));
        }
    }
    let kinds: Vec<_> = facts.classes.iter().map(ToString::to_string).collect();
    findings.into_record(
        RuleName::OutputScripts,
        format!("accepted: {}", kinds.join(", ")),
    )
}

fn check_weight(tx: &Transaction, ctx: &PolicyContext) -> RuleRecord {
    let mut findings = Findings::default();
    let weight = sigop_adjusted_weight(tx, ctx.bytes_per_sigop);
    let within = Comparison::at_most(
        Subject::Transaction,
        Quantity::Weight(weight),
        Quantity::Weight(ctx.max_standard_tx_weight),
    );
    if !findings.compare(within) {
        findings.fail(format!(
            "sigop-adjusted weight {} > {}",
            weight, ctx.max_standard_tx_weight
        ));
    }
    findings.into_record(
        RuleName::TxWeight,
        format!(
            "sigop-adjusted weight {} <= {}",
            weight, ctx.max_standard_tx_weight
        ),
    )
}

fn check_fee_rate(ctx: &PolicyContext, facts: &Facts) -> RuleRecord {
    let mut findings = Findings::default();
    let enough = Comparison::at_least(
        Subject::Transaction,
        Quantity::FeeRate(facts.fee_rate),
        Quantity::FeeRate(ctx.min_relay_fee_rate),
    );
    if !findings.compare(enough) {
        findings.fail(format!("{} < {}", facts.fee_rate, ctx.min_relay_fee_rate));
    }
    findings.into_record(
        RuleName::FeeRate,
        format!("{} >= {}", facts.fee_rate, ctx.min_relay_fee_rate),
    )
}

fn check_dust(tx: &Transaction, ctx: &PolicyContext, facts: &Facts) -> RuleRecord {
    let mut findings = Findings::default();
    for (index, (output, class)) in tx.outputs.iter().zip(&facts.classes).enumerate() {
        let subject = Subject::Output(index);
        let value = Quantity::Sats(output.value);
        if let ScriptClass::NullData { .. } = class {
            if !findings.compare(Comparison::at_most(subject, value, Quantity::Sats(0))) {
                findings.fail(format!(
                    "output {}: null data carries {} sat that can never be spent",
                    index, output.value
                ));
            }
            continue;
        }
        let cost = spend_cost(class, ctx.dust_relay_fee_rate);
        findings.compare(Comparison::at_least(subject, value, Quantity::Sats(cost)));
        if is_dust(output, class, ctx.dust_relay_fee_rate) {
            findings.fail(format!(
                "output {}: {} sat < {} sat to spend {} at {}",
                index,
                output.value,
                cost,
                class.kind(),
                ctx.dust_relay_fee_rate
            ));
        }
    }
    findings.into_record(
        RuleName::Dust,
        format!("no dust at {}", ctx.dust_relay_fee_rate),
    )
}

fn check_overlay(ctx: &PolicyContext, facts: &Facts) -> RuleRecord {
    let mut findings = Findings::default();
    let unpermitted: Vec<&OverlaySignal> = facts
        .signals
        .iter()
        .filter(|signal| !ctx.permitted_overlays.contains(&signal.kind()))
        .collect();
    findings.compare(Comparison::at_most(
        Subject::Transaction,
        count(unpermitted.len()),
        count(0),
    ));
    for signal in unpermitted {
        findings.fail(signal.to_string());
    }
    let passed = if facts.signals.is_empty() {
        "no overlay signals".to_string()
    } else {
        format!("{} permitted overlay signals", facts.signals.len())
    };
    findings.into_record(RuleName::Overlay, passed)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
