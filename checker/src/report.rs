//! Human- and machine-readable renderings of decoded transactions and
//! verdicts.

use serde::Serialize;
use std::fmt;

use knots_filter::policy::{Outcome, Verdict};
use knots_filter::script::{address, classify, to_asm, Network, ScriptClass};
use knots_filter::transaction::{Transaction, Txid};

/// Decoded transaction with the derived fields `decode` and `POST /decode`
/// show alongside the raw structure.
#[derive(Debug, Serialize)]
pub struct TransactionView {
    pub txid: Txid,
    pub wtxid: Txid,
    pub version: i32,
    pub lock_time: u32,
    pub size: usize,
    pub base_size: usize,
    pub weight: u64,
    pub vsize: u64,
    pub segwit: bool,
    pub rbf: bool,
    pub inputs: Vec<InputView>,
    pub outputs: Vec<OutputView>,
}

#[derive(Debug, Serialize)]
pub struct InputView {
    pub prevout: String,
    pub script_sig: String,
    pub script_sig_asm: String,
    pub sequence: u32,
    /// Hex of each witness item; empty for legacy inputs.
    pub witness: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct OutputView {
    pub value: u64,
    pub script_pubkey: String,
    pub script_pubkey_asm: String,
    pub class: ScriptClass,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl TransactionView {
    pub fn new(tx: &Transaction, network: Network) -> Self {
        let inputs = tx
            .inputs
            .iter()
            .enumerate()
            .map(|(i, input)| InputView {
                prevout: input.previous_output.to_string(),
                script_sig: hex::encode(&input.script_sig),
                script_sig_asm: to_asm(&input.script_sig),
                sequence: input.sequence,
                witness: tx
                    .witness(i)
                    .map(|w| w.items().iter().map(hex::encode).collect())
                    .unwrap_or_default(),
            })
            .collect();

        let outputs = tx
            .outputs
            .iter()
            .map(|output| OutputView {
                value: output.value,
                script_pubkey: hex::encode(&output.script_pubkey),
                script_pubkey_asm: to_asm(&output.script_pubkey),
                class: classify(&output.script_pubkey),
                address: address(&output.script_pubkey, network),
            })
            .collect();

        Self {
            txid: tx.txid(),
            wtxid: tx.wtxid(),
            version: tx.version,
            lock_time: tx.lock_time,
            size: tx.total_size(),
            base_size: tx.base_size(),
            weight: tx.weight(),
            vsize: tx.vsize(),
            segwit: tx.is_segwit(),
            rbf: tx.signals_rbf(),
            inputs,
            outputs,
        }
    }
}

/// Multi-line terminal rendering of a verdict.
pub struct VerdictReport<'a>(pub &'a Verdict);

impl fmt::Display for VerdictReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = self.0;
        writeln!(f, "txid    {}", verdict.txid)?;
        if verdict.wtxid != verdict.txid {
            writeln!(f, "wtxid   {}", verdict.wtxid)?;
        }
        writeln!(f, "size    {} vB ({} WU)", verdict.vsize, verdict.weight)?;
        writeln!(f, "fee     {} sat ({})", verdict.fee, verdict.fee_rate)?;
        writeln!(f)?;

        for record in &verdict.records {
            let mark = match record.outcome {
                Outcome::Passed => "pass",
                Outcome::Failed => "FAIL",
            };
            writeln!(f, "  [{}] {:<15} {}", mark, record.rule.as_str(), record.detail)?;
        }

        if !verdict.overlay_signals.is_empty() {
            writeln!(f)?;
            writeln!(f, "overlay signals:")?;
            for signal in &verdict.overlay_signals {
                writeln!(f, "  - {}", signal)?;
            }
        }

        writeln!(f)?;
        if verdict.accepted {
            writeln!(f, "ACCEPTED")
        } else {
            let failed: Vec<&str> = verdict.failures().map(|r| r.rule.as_str()).collect();
            writeln!(f, "REJECTED ({})", failed.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use knots_filter::policy::{check_hex, PolicyContext};
    use knots_filter::transaction::TxOut;

    use crate::test_vectors::{PAYMENT_HEX, PAYMENT_PREVOUT};

    #[test]
    fn view_carries_classes_and_addresses() {
        let tx = Transaction::from_hex(PAYMENT_HEX).unwrap();
        let view = TransactionView::new(&tx, Network::Mainnet);
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["vsize"], 153);
        assert_eq!(json["segwit"], true);
        assert_eq!(json["inputs"][0]["prevout"], PAYMENT_PREVOUT);
        assert_eq!(json["inputs"][0]["witness"].as_array().unwrap().len(), 2);
        assert_eq!(json["outputs"][0]["class"]["type"], "p2tr");
        assert_eq!(
            json["outputs"][1]["address"],
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"
        );
        assert!(json["outputs"][1]["script_pubkey_asm"]
            .as_str()
            .unwrap()
            .starts_with("OP_0 "));
    }

    #[test]
    fn testnet_view_uses_testnet_addresses() {
        let tx = Transaction::from_hex(PAYMENT_HEX).unwrap();
        let view = TransactionView::new(&tx, Network::Testnet);
        assert_eq!(
            view.outputs[1].address.as_deref(),
            Some("tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx")
        );
    }

    #[test]
    fn pretty_verdict_lists_every_rule() {
        let ctx = PolicyContext::default()
            .with_prevout(PAYMENT_PREVOUT.parse().unwrap(), TxOut::new(100_000, vec![0x51]));
        let verdict = check_hex(PAYMENT_HEX, &ctx).unwrap();
        let text = VerdictReport(&verdict).to_string();

        assert_eq!(text.matches("[pass]").count(), verdict.records.len());
        assert!(text.contains("6.535 sat/vB >= 1 sat/vB"));
        assert!(text.trim_end().ends_with("ACCEPTED"));
    }

    #[test]
    fn pretty_verdict_names_failed_rules() {
        let ctx = PolicyContext::default()
            .with_prevout(PAYMENT_PREVOUT.parse().unwrap(), TxOut::new(100_000, vec![0x51]))
            .with_min_relay_fee_rate(knots_filter::policy::FeeRate::from_sat_per_vb(10));
        let verdict = check_hex(PAYMENT_HEX, &ctx).unwrap();
        let text = VerdictReport(&verdict).to_string();

        assert!(text.contains("[FAIL] fee_rate"));
        assert!(text.trim_end().ends_with("REJECTED (fee_rate)"));
    }
}
