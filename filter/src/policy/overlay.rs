//! # Overlay-Protocol Heuristics
//!
//! Spots transactions that use Bitcoin as a data store or as the carrier of
//! some other token protocol. None of this is exact: an honest script can
//! look odd and a determined embedder can look honest. Every threshold is
//! configuration, and every finding is a [`OverlaySignal`] the caller can
//! inspect before the evaluator decides what to do with it.
//!
//! Checks, all of which always run:
//!
//! - **oversized null data**: `OP_RETURN` payload above the context limit.
//! - **witness payload**: a long run of data-like pushes in a witness stack
//!   or inside its witness script.
//! - **oversized script**: an output script above the context limit.
//! - **protocol marker**: a null-data payload containing a known overlay tag.
//! - **inscription envelope**: `OP_FALSE OP_IF … OP_ENDIF` in a witness script.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::context::PolicyContext;
use crate::script::opcodes::OP_IF;
use crate::script::{classify, instructions, null_data_payload, Instruction, ScriptClass};
use crate::transaction::{Transaction, Witness};

/// First byte of a taproot annex, when the stack has at least two items.
const ANNEX_TAG: u8 = 0x50;

/// Control-block leaf version byte, parity bit masked off.
const TAPROOT_CONTROL_TAG: u8 = 0xc0;

/// Which heuristic produced a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayKind {
    OversizedNullData,
    WitnessPayload,
    OversizedScript,
    ProtocolMarker,
    InscriptionEnvelope,
}

impl OverlayKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverlayKind::OversizedNullData => "oversized_null_data",
            OverlayKind::WitnessPayload => "witness_payload",
            OverlayKind::OversizedScript => "oversized_script",
            OverlayKind::ProtocolMarker => "protocol_marker",
            OverlayKind::InscriptionEnvelope => "inscription_envelope",
        }
    }
}

impl fmt::Display for OverlayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One heuristic finding, located by input or output index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverlaySignal {
    OversizedNullData {
        output: usize,
        payload: usize,
        limit: usize,
    },
    WitnessPayload {
        input: usize,
        run_bytes: usize,
        run_items: usize,
        limit: usize,
    },
    OversizedScript {
        output: usize,
        size: usize,
        limit: usize,
    },
    ProtocolMarker {
        output: usize,
        marker: String,
    },
    InscriptionEnvelope {
        input: usize,
    },
}

impl OverlaySignal {
    pub fn kind(&self) -> OverlayKind {
        match self {
            OverlaySignal::OversizedNullData { .. } => OverlayKind::OversizedNullData,
            OverlaySignal::WitnessPayload { .. } => OverlayKind::WitnessPayload,
            OverlaySignal::OversizedScript { .. } => OverlayKind::OversizedScript,
            OverlaySignal::ProtocolMarker { .. } => OverlayKind::ProtocolMarker,
            OverlaySignal::InscriptionEnvelope { .. } => OverlayKind::InscriptionEnvelope,
        }
    }
}

impl fmt::Display for OverlaySignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverlaySignal::OversizedNullData {
                output,
                payload,
                limit,
            } => write!(
                f,
                "output {}: null data payload {} bytes > {}",
                output, payload, limit
            ),
            OverlaySignal::WitnessPayload {
                input,
                run_bytes,
                run_items,
                limit,
            } => write!(
                f,
                "input {}: witness data run of {} bytes in {} pushes >= {}",
                input, run_bytes, run_items, limit
            ),
            OverlaySignal::OversizedScript {
                output,
                size,
                limit,
            } => write!(f, "output {}: script {} bytes > {}", output, size, limit),
            OverlaySignal::ProtocolMarker { output, marker } => {
                write!(f, "output {}: overlay protocol marker {:?}", output, marker)
            }
            OverlaySignal::InscriptionEnvelope { input } => {
                write!(f, "input {}: inscription envelope in witness script", input)
            }
        }
    }
}

/// Runs every overlay heuristic over `tx`. Never fails; a script that
/// cannot be parsed is inspected as far as it parses.
pub fn flag_overlay(tx: &Transaction, ctx: &PolicyContext) -> Vec<OverlaySignal> {
    let mut signals = Vec::new();

    for (output, txout) in tx.outputs.iter().enumerate() {
        if let ScriptClass::NullData { payload_size } = classify(&txout.script_pubkey) {
            if payload_size > ctx.max_null_data_size {
                signals.push(OverlaySignal::OversizedNullData {
                    output,
                    payload: payload_size,
                    limit: ctx.max_null_data_size,
                });
            }
        }
    }

    let witnesses = tx.witnesses.as_deref().unwrap_or_default();
    for (input, witness) in witnesses.iter().enumerate() {
        let run = longest_data_run(witness);
        if run.bytes >= ctx.witness.min_run_bytes {
            signals.push(OverlaySignal::WitnessPayload {
                input,
                run_bytes: run.bytes,
                run_items: run.items,
                limit: ctx.witness.min_run_bytes,
            });
        }
    }

    for (output, txout) in tx.outputs.iter().enumerate() {
        let size = txout.script_pubkey.len();
        if size > ctx.max_standard_script_size {
            signals.push(OverlaySignal::OversizedScript {
                output,
                size,
                limit: ctx.max_standard_script_size,
            });
        }
    }

    for (output, txout) in tx.outputs.iter().enumerate() {
        let payload = null_data_payload(&txout.script_pubkey);
        if payload.is_empty() {
            continue;
        }
        if let Some(marker) = ctx
            .overlay_markers
            .iter()
            .find(|marker| contains(&payload, marker))
        {
            signals.push(OverlaySignal::ProtocolMarker {
                output,
                marker: String::from_utf8_lossy(marker).into_owned(),
            });
        }
    }

    for (input, witness) in witnesses.iter().enumerate() {
        let parts = WitnessParts::split(witness);
        if parts.script.map_or(false, has_inscription_envelope) {
            signals.push(OverlaySignal::InscriptionEnvelope { input });
        }
    }

    signals
}

// ---------------------------------------------------------------------------
// Witness inspection
// ---------------------------------------------------------------------------

/// A witness stack split into its data items and the script it reveals,
/// if any.
#[derive(Debug)]
struct WitnessParts<'a> {
    stack: &'a [Vec<u8>],
    script: Option<&'a [u8]>,
}

impl<'a> WitnessParts<'a> {
    fn split(witness: &'a Witness) -> Self {
        let mut items = witness.items();

        if items.len() >= 2 && items.last().and_then(|i| i.first()) == Some(&ANNEX_TAG) {
            items = &items[..items.len() - 1];
        }

        // Taproot script path: [stack..., script, control block].
        if let [stack @ .., script, control] = items {
            if is_control_block(control) {
                return Self {
                    stack,
                    script: Some(script.as_slice()),
                };
            }
        }

        // P2WSH: [stack..., witness script]. A trailing key is P2WPKH.
        if let [stack @ .., last] = items {
            if !stack.is_empty()
                && !is_signature_shaped(last)
                && !is_key_shaped(last)
                && !last.is_empty()
                && instructions(last).all(|ins| ins.is_ok())
            {
                return Self {
                    stack,
                    script: Some(last.as_slice()),
                };
            }
        }

        Self {
            stack: items,
            script: None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct DataRun {
    bytes: usize,
    items: usize,
}

impl DataRun {
    fn extend(&mut self, len: usize) {
        self.bytes += len;
        self.items += 1;
    }

    fn max(self, other: DataRun) -> DataRun {
        if other.bytes > self.bytes {
            other
        } else {
            self
        }
    }
}

/// Longest run of consecutive data-like pushes, looking at the stack items
/// and at the pushes inside the revealed script. In a script, any opcode
/// ends a run; empty pushes neither extend nor end one.
fn longest_data_run(witness: &Witness) -> DataRun {
    let parts = WitnessParts::split(witness);
    let mut best = DataRun::default();

    let mut current = DataRun::default();
    for item in parts.stack {
        if is_data_like(item) {
            current.extend(item.len());
            best = best.max(current);
        } else {
            current = DataRun::default();
        }
    }

    if let Some(script) = parts.script {
        let mut current = DataRun::default();
        for ins in instructions(script) {
            match ins {
                Ok(Instruction::Push(data)) if data.is_empty() => {}
                Ok(Instruction::Push(data)) if is_data_like(data) => {
                    current.extend(data.len());
                    best = best.max(current);
                }
                Ok(_) | Err(_) => current = DataRun::default(),
            }
        }
    }

    best
}

fn is_data_like(item: &[u8]) -> bool {
    !item.is_empty() && !is_signature_shaped(item) && !is_key_shaped(item)
}

/// DER ECDSA (with or without sighash byte) or a 64/65-byte Schnorr sig.
fn is_signature_shaped(item: &[u8]) -> bool {
    let der = (9..=73).contains(&item.len())
        && item[0] == 0x30
        && matches!(usize::from(item[1]) + 2, n if n == item.len() || n + 1 == item.len());
    der || item.len() == 64 || item.len() == 65
}

/// Compressed, uncompressed or x-only public key.
fn is_key_shaped(item: &[u8]) -> bool {
    match item.len() {
        33 => matches!(item[0], 0x02 | 0x03),
        65 => item[0] == 0x04,
        32 => true,
        _ => false,
    }
}

fn is_control_block(item: &[u8]) -> bool {
    item.len() >= 33 && (item.len() - 33) % 32 == 0 && item[0] & 0xfe == TAPROOT_CONTROL_TAG
}

/// `OP_FALSE OP_IF`: a branch that never executes, so its pushes are free
/// storage.
fn has_inscription_envelope(script: &[u8]) -> bool {
    let mut previous_was_false = false;
    for ins in instructions(script) {
        let Ok(ins) = ins else { return false };
        if previous_was_false && ins == Instruction::Op(OP_IF) {
            return true;
        }
        previous_was_false = ins == Instruction::Push(&[]);
    }
    false
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::opcodes::*;
    use crate::transaction::{OutPoint, TxIn, TxOut, Txid};

    fn tx_with(outputs: Vec<Vec<u8>>, witnesses: Option<Vec<Witness>>) -> Transaction {
        let inputs = witnesses.as_ref().map_or(1, Vec::len);
        Transaction {
            version: 2,
            inputs: (0..inputs)
                .map(|i| {
                    TxIn::new(
                        OutPoint::new(Txid::from_bytes([i as u8; 32]), 0),
                        vec![],
                        0xffff_fffd,
                    )
                })
                .collect(),
            outputs: outputs.into_iter().map(|s| TxOut::new(0, s)).collect(),
            witnesses,
            lock_time: 0,
        }
    }

    fn null_data(payload: &[u8]) -> Vec<u8> {
        let mut s = vec![OP_RETURN];
        match payload.len() {
            0..=75 => s.push(payload.len() as u8),
            _ => s.extend_from_slice(&[OP_PUSHDATA1, payload.len() as u8]),
        }
        s.extend_from_slice(payload);
        s
    }

    fn der_sig() -> Vec<u8> {
        let mut sig = vec![0x30, 0x44];
        sig.extend_from_slice(&[0x01; 68]);
        sig.push(0x01);
        sig
    }

    fn compressed_key() -> Vec<u8> {
        let mut key = vec![0x02];
        key.extend_from_slice(&[0x07; 32]);
        key
    }

    /// `OP_FALSE OP_IF "ord" <chunks...> OP_ENDIF <key> OP_CHECKSIG`
    fn inscription_script(chunks: usize) -> Vec<u8> {
        let mut s = vec![OP_0, OP_IF, 0x03, b'o', b'r', b'd', OP_1, 0x01, b'x', OP_0];
        for _ in 0..chunks {
            s.extend_from_slice(&[OP_PUSHDATA2, 0x08, 0x02]);
            s.extend_from_slice(&[0xee; 520]);
        }
        s.push(OP_ENDIF);
        s.push(0x20);
        s.extend_from_slice(&[0x09; 32]);
        s.push(OP_CHECKSIG);
        s
    }

    fn control_block() -> Vec<u8> {
        let mut cb = vec![0xc1];
        cb.extend_from_slice(&[0x05; 32]);
        cb
    }

    #[test]
    fn forty_byte_null_data_is_clean() {
        let tx = tx_with(vec![null_data(&[0x42; 40])], None);
        assert!(flag_overlay(&tx, &PolicyContext::default()).is_empty());
    }

    #[test]
    fn oversized_null_data_flagged() {
        let tx = tx_with(vec![null_data(&[0x42; 81])], None);
        assert_eq!(
            flag_overlay(&tx, &PolicyContext::default()),
            vec![OverlaySignal::OversizedNullData {
                output: 0,
                payload: 81,
                limit: 80
            }]
        );
    }

    #[test]
    fn oversized_script_flagged() {
        let tx = tx_with(vec![vec![OP_NOP; 1_651]], None);
        let signals = flag_overlay(&tx, &PolicyContext::default());
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].kind(), OverlayKind::OversizedScript);
    }

    #[test]
    fn protocol_marker_found_across_pushes() {
        let mut script = vec![OP_RETURN, 0x02, b'O', b'm', 0x03, b'n', b'i', 0x00];
        script.push(0x01);
        script.push(0xff);
        let tx = tx_with(vec![script], None);
        assert_eq!(
            flag_overlay(&tx, &PolicyContext::default()),
            vec![OverlaySignal::ProtocolMarker {
                output: 0,
                marker: "Omni".into()
            }]
        );

        // Outside null data the bytes mean nothing.
        let tx = tx_with(vec![vec![0x04, b'O', b'm', b'n', b'i', OP_DROP]], None);
        assert!(flag_overlay(&tx, &PolicyContext::default()).is_empty());
    }

    #[test]
    fn key_path_and_p2wpkh_witnesses_are_clean() {
        let tx = tx_with(
            vec![vec![OP_0]],
            Some(vec![
                Witness::new(vec![der_sig(), compressed_key()]),
                Witness::new(vec![vec![0xaa; 64]]),
            ]),
        );
        assert!(flag_overlay(&tx, &PolicyContext::default()).is_empty());
    }

    #[test]
    fn inscription_reveal_flags_payload_and_envelope() {
        let tx = tx_with(
            vec![vec![OP_0]],
            Some(vec![Witness::new(vec![
                vec![0xaa; 64],
                inscription_script(3),
                control_block(),
            ])]),
        );
        let signals = flag_overlay(&tx, &PolicyContext::default());
        // The one-byte content type joins the body: OP_0 does not end a run.
        assert_eq!(
            signals,
            vec![
                OverlaySignal::WitnessPayload {
                    input: 0,
                    run_bytes: 1 + 3 * 520,
                    run_items: 4,
                    limit: 256
                },
                OverlaySignal::InscriptionEnvelope { input: 0 },
            ]
        );
    }

    #[test]
    fn small_envelope_still_flagged_as_envelope() {
        let tx = tx_with(
            vec![vec![OP_0]],
            Some(vec![Witness::new(vec![
                vec![0xaa; 64],
                inscription_script(0),
                control_block(),
            ])]),
        );
        let kinds: Vec<_> = flag_overlay(&tx, &PolicyContext::default())
            .iter()
            .map(OverlaySignal::kind)
            .collect();
        assert_eq!(kinds, vec![OverlayKind::InscriptionEnvelope]);
    }

    #[test]
    fn raw_stack_data_run_flagged() {
        // Junk pushed straight onto a P2WSH stack ahead of the script.
        let witness_script = vec![OP_2DROP, OP_2DROP, OP_1];
        let tx = tx_with(
            vec![vec![OP_0]],
            Some(vec![Witness::new(vec![
                vec![0x11; 200],
                vec![0x22; 200],
                vec![0x33; 10],
                witness_script,
            ])]),
        );
        assert_eq!(
            flag_overlay(&tx, &PolicyContext::default()),
            vec![OverlaySignal::WitnessPayload {
                input: 0,
                run_bytes: 410,
                run_items: 3,
                limit: 256
            }]
        );
    }

    #[test]
    fn signatures_break_runs() {
        let witness_script = vec![OP_2DROP, OP_2DROP, OP_1];
        let tx = tx_with(
            vec![vec![OP_0]],
            Some(vec![Witness::new(vec![
                vec![0x11; 200],
                der_sig(),
                vec![0x22; 200],
                witness_script,
            ])]),
        );
        assert!(flag_overlay(&tx, &PolicyContext::default()).is_empty());
    }

    #[test]
    fn annex_is_ignored() {
        let mut annex = vec![ANNEX_TAG];
        annex.extend_from_slice(&[0x00; 400]);
        let tx = tx_with(
            vec![vec![OP_0]],
            Some(vec![Witness::new(vec![vec![0xaa; 64], annex])]),
        );
        assert!(flag_overlay(&tx, &PolicyContext::default()).is_empty());
    }

    #[test]
    fn thresholds_come_from_context() {
        let tx = tx_with(
            vec![null_data(&[0x42; 81])],
            Some(vec![Witness::new(vec![
                vec![0xaa; 64],
                inscription_script(1),
                control_block(),
            ])]),
        );
        let mut ctx = PolicyContext::default();
        ctx.max_null_data_size = 100;
        ctx.witness.min_run_bytes = 1_000;
        let kinds: Vec<_> = flag_overlay(&tx, &ctx).iter().map(OverlaySignal::kind).collect();
        assert_eq!(kinds, vec![OverlayKind::InscriptionEnvelope]);
    }

    #[test]
    fn shape_predicates() {
        assert!(is_signature_shaped(&der_sig()));
        assert!(is_signature_shaped(&[0xab; 64]));
        assert!(!is_signature_shaped(&[0x30, 0x05, 0x00]));
        assert!(is_key_shaped(&compressed_key()));
        assert!(!is_key_shaped(&[0x05; 33]));
        assert!(is_control_block(&control_block()));
        assert!(!is_control_block(&[0xc0; 34]));
        assert!(has_inscription_envelope(&inscription_script(0)));
        assert!(!has_inscription_envelope(&[OP_1, OP_IF, OP_ENDIF]));
    }
}
