//! Wire encoding, size accounting and transaction ids.
//!
//! Sizes are computed arithmetically from the structure rather than by
//! serializing and measuring, so the policy layer can ask for weight on
//! every check without allocating.

use super::types::{Transaction, TxIn, TxOut, Txid, Witness};
use crate::encoding::{compact_size_len, sha256d, write_compact_size, write_var_bytes};

/// Weight units per non-witness byte.
pub const WITNESS_SCALE_FACTOR: u64 = 4;

impl Transaction {
    /// Serializes the transaction the way it was decoded: with the segwit
    /// marker, flag and witnesses when `witnesses` is `Some`, legacy otherwise.
    pub fn encode(&self) -> Vec<u8> {
        match &self.witnesses {
            Some(witnesses) => self.encode_with_witnesses(witnesses),
            None => self.encode_legacy(),
        }
    }

    /// Serializes without marker, flag or witnesses. This is what the txid
    /// commits to.
    pub fn encode_legacy(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.base_size());
        buf.extend_from_slice(&self.version.to_le_bytes());
        self.encode_body(&mut buf);
        buf.extend_from_slice(&self.lock_time.to_le_bytes());
        buf
    }

    fn encode_with_witnesses(&self, witnesses: &[Witness]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.total_size());
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(&[0x00, 0x01]);
        self.encode_body(&mut buf);
        for witness in witnesses {
            write_compact_size(&mut buf, witness.len() as u64);
            for item in witness.items() {
                write_var_bytes(&mut buf, item);
            }
        }
        buf.extend_from_slice(&self.lock_time.to_le_bytes());
        buf
    }

    fn encode_body(&self, buf: &mut Vec<u8>) {
        write_compact_size(buf, self.inputs.len() as u64);
        for input in &self.inputs {
            buf.extend_from_slice(input.previous_output.txid.as_bytes());
            buf.extend_from_slice(&input.previous_output.vout.to_le_bytes());
            write_var_bytes(buf, &input.script_sig);
            buf.extend_from_slice(&input.sequence.to_le_bytes());
        }
        write_compact_size(buf, self.outputs.len() as u64);
        for output in &self.outputs {
            buf.extend_from_slice(&output.value.to_le_bytes());
            write_var_bytes(buf, &output.script_pubkey);
        }
    }

    // -----------------------------------------------------------------------
    // Sizes
    // -----------------------------------------------------------------------

    /// Size in bytes of the legacy serialization ("stripped size").
    pub fn base_size(&self) -> usize {
        4 + compact_size_len(self.inputs.len() as u64)
            + self.inputs.iter().map(input_size).sum::<usize>()
            + compact_size_len(self.outputs.len() as u64)
            + self.outputs.iter().map(output_size).sum::<usize>()
            + 4
    }

    /// Bytes the marker, flag and witness stacks add on top of
    /// [`base_size`](Self::base_size). Zero for legacy transactions.
    pub fn witness_size(&self) -> usize {
        match &self.witnesses {
            Some(witnesses) => 2 + witnesses.iter().map(witness_stack_size).sum::<usize>(),
            None => 0,
        }
    }

    /// Size in bytes of [`encode`](Self::encode)'s output.
    pub fn total_size(&self) -> usize {
        self.base_size() + self.witness_size()
    }

    /// BIP-141 weight: `base_size * 3 + total_size`.
    pub fn weight(&self) -> u64 {
        self.base_size() as u64 * WITNESS_SCALE_FACTOR + self.witness_size() as u64
    }

    /// Virtual size: weight divided by four, rounded up.
    pub fn vsize(&self) -> u64 {
        weight_to_vsize(self.weight())
    }

    // -----------------------------------------------------------------------
    // Identifiers
    // -----------------------------------------------------------------------

    /// Double SHA-256 of the legacy serialization.
    pub fn txid(&self) -> Txid {
        Txid::from_bytes(sha256d(&self.encode_legacy()))
    }

    /// Double SHA-256 of the full serialization. Equal to the txid when the
    /// transaction carries no witnesses.
    pub fn wtxid(&self) -> Txid {
        match &self.witnesses {
            Some(_) => Txid::from_bytes(sha256d(&self.encode())),
            None => self.txid(),
        }
    }
}

/// Rounds weight units up to whole virtual bytes.
pub fn weight_to_vsize(weight: u64) -> u64 {
    (weight + WITNESS_SCALE_FACTOR - 1) / WITNESS_SCALE_FACTOR
}

fn var_bytes_size(bytes: &[u8]) -> usize {
    compact_size_len(bytes.len() as u64) + bytes.len()
}

fn input_size(input: &TxIn) -> usize {
    32 + 4 + var_bytes_size(&input.script_sig) + 4
}

fn output_size(output: &TxOut) -> usize {
    8 + var_bytes_size(&output.script_pubkey)
}

fn witness_stack_size(witness: &Witness) -> usize {
    compact_size_len(witness.len() as u64)
        + witness
            .items()
            .iter()
            .map(|item| var_bytes_size(item))
            .sum::<usize>()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{OutPoint, TxIn, TxOut};

    const GENESIS_COINBASE_HEX: &str = "01000000010000000000000000000000000000000000000000000000000000000000000000ffffffff4d04ffff001d0104455468652054696d65732030332f4a616e2f32303039204368616e63656c6c6f72206f6e206272696e6b206f66207365636f6e64206261696c6f757420666f722062616e6b73ffffffff0100f2052a01000000434104678afdb0fe5548271967f1a67130b7105cd6a828e03909a67962e0ea1f61deb649f6bc3f4cef38c4f35504e51ec112de5c384df7ba0b8d578a4c702b6bf11d5fac00000000";

    fn segwit_tx() -> Transaction {
        let mut p2wpkh = vec![0x00, 0x14];
        p2wpkh.extend_from_slice(&[0x11; 20]);
        Transaction {
            version: 2,
            inputs: vec![TxIn::new(
                OutPoint::new(Txid::from_bytes([0x42; 32]), 1),
                vec![],
                0xffff_fffd,
            )],
            outputs: vec![TxOut::new(90_000, p2wpkh)],
            witnesses: Some(vec![Witness::new(vec![vec![0x30; 71], vec![0x02; 33]])]),
            lock_time: 840_000,
        }
    }

    #[test]
    fn genesis_coinbase_txid() {
        let tx = Transaction::from_hex(GENESIS_COINBASE_HEX).unwrap();
        assert_eq!(
            tx.txid().to_string(),
            "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b"
        );
        assert_eq!(tx.wtxid(), tx.txid());
    }

    #[test]
    fn legacy_sizes() {
        let tx = Transaction::from_hex(GENESIS_COINBASE_HEX).unwrap();
        assert_eq!(tx.base_size(), 204);
        assert_eq!(tx.witness_size(), 0);
        assert_eq!(tx.total_size(), 204);
        assert_eq!(tx.weight(), 816);
        assert_eq!(tx.vsize(), 204);
    }

    #[test]
    fn legacy_round_trip_is_byte_exact() {
        let bytes = hex::decode(GENESIS_COINBASE_HEX).unwrap();
        let tx = Transaction::decode(&bytes).unwrap();
        assert_eq!(tx.encode(), bytes);
        assert_eq!(tx.encode_legacy(), bytes);
    }

    #[test]
    fn segwit_sizes_match_serialization() {
        let tx = segwit_tx();
        assert_eq!(tx.base_size(), 82);
        assert_eq!(tx.base_size(), tx.encode_legacy().len());
        assert_eq!(tx.witness_size(), 109);
        assert_eq!(tx.total_size(), tx.encode().len());
        assert_eq!(tx.weight(), 82 * 4 + 109);
        // 437 / 4 = 109.25, rounded up.
        assert_eq!(tx.vsize(), 110);
    }

    #[test]
    fn segwit_ids_differ() {
        let tx = segwit_tx();
        assert_ne!(tx.txid(), tx.wtxid());

        // Witness data does not move the txid.
        let mut stripped = tx.clone();
        stripped.witnesses = None;
        assert_eq!(stripped.txid(), tx.txid());
    }

    #[test]
    fn vsize_rounds_up() {
        assert_eq!(weight_to_vsize(0), 0);
        assert_eq!(weight_to_vsize(1), 1);
        assert_eq!(weight_to_vsize(4), 1);
        assert_eq!(weight_to_vsize(5), 2);
    }
}
