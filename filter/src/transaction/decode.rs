//! Wire-format decoding.
//!
//! ```text
//! version        i32 LE
//! [marker, flag] 0x00 0x01 — only when witness-encoded
//! input count    compact size
//!   txid         32 bytes (wire order, never reversed here)
//!   vout         u32 LE
//!   script_sig   compact-size length + bytes
//!   sequence     u32 LE
//! output count   compact size
//!   value        u64 LE
//!   script       compact-size length + bytes
//! witnesses      one per input, only when witness-encoded:
//!   item count   compact size
//!   item         compact-size length + bytes
//! lock time      u32 LE
//! ```

use std::cmp;

use tracing::trace;

use super::types::{OutPoint, Transaction, TxIn, TxOut, Txid, Witness};
use crate::encoding::{Cursor, DecodeError};

/// Segwit marker byte, in the position a legacy decoder expects the input count.
const SEGWIT_MARKER: u8 = 0x00;

/// Segwit flag byte. Only `0x01` has ever been defined.
const SEGWIT_FLAG: u8 = 0x01;

/// Smallest possible serialized input: txid + vout + empty script + sequence.
const MIN_TXIN_SIZE: usize = 32 + 4 + 1 + 4;

/// Smallest possible serialized output: value + empty script.
const MIN_TXOUT_SIZE: usize = 8 + 1;

/// Decodes a hex string into raw bytes.
///
/// Leading and trailing whitespace is ignored (pasted hex usually has some);
/// anything else that isn't an even number of hex digits is
/// [`DecodeError::InvalidHexEncoding`].
pub fn decode_hex(input: &str) -> Result<Vec<u8>, DecodeError> {
    hex::decode(input.trim()).map_err(|e| DecodeError::InvalidHexEncoding {
        reason: e.to_string(),
    })
}

impl Transaction {
    /// Decodes a hex-encoded transaction.
    pub fn from_hex(input: &str) -> Result<Self, DecodeError> {
        Self::decode(&decode_hex(input)?)
    }

    /// Decodes a transaction from its wire serialization.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::TruncatedInput`] when the bytes run out mid-field.
    /// - [`DecodeError::MalformedTransaction`] for non-canonical or oversized
    ///   lengths, and for a witness section whose stacks are all empty.
    /// - [`DecodeError::EmptyInputsOrOutputs`] when either count is zero.
    /// - [`DecodeError::TrailingBytes`] when bytes follow the lock time.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut cursor = Cursor::new(bytes);

        let version = cursor.read_i32_le()?;

        let segwit = cursor.peek(2) == Some(&[SEGWIT_MARKER, SEGWIT_FLAG][..]);
        if segwit {
            cursor.read_bytes(2)?;
        }
        trace!(version, segwit, "decoding transaction");

        let input_count = read_count(&mut cursor)?;
        let mut inputs = Vec::with_capacity(cmp::min(
            input_count,
            cursor.remaining() / MIN_TXIN_SIZE,
        ));
        for _ in 0..input_count {
            inputs.push(read_input(&mut cursor)?);
        }

        let output_count = read_count(&mut cursor)?;
        if input_count == 0 || output_count == 0 {
            return Err(DecodeError::EmptyInputsOrOutputs {
                inputs: input_count,
                outputs: output_count,
            });
        }

        let mut outputs = Vec::with_capacity(cmp::min(
            output_count,
            cursor.remaining() / MIN_TXOUT_SIZE,
        ));
        for _ in 0..output_count {
            outputs.push(read_output(&mut cursor)?);
        }

        let witnesses = if segwit {
            let witness_offset = cursor.position();
            let witnesses = inputs
                .iter()
                .map(|_| read_witness(&mut cursor))
                .collect::<Result<Vec<_>, _>>()?;
            if witnesses.iter().all(Witness::is_empty) {
                return Err(DecodeError::malformed(
                    witness_offset,
                    "at least one non-empty witness after segwit marker",
                    "only empty witness stacks",
                ));
            }
            Some(witnesses)
        } else {
            None
        };

        let lock_time = cursor.read_u32_le()?;

        if !cursor.is_empty() {
            return Err(DecodeError::TrailingBytes {
                offset: cursor.position(),
                remaining: cursor.remaining(),
            });
        }

        trace!(
            inputs = inputs.len(),
            outputs = outputs.len(),
            lock_time,
            "transaction decoded"
        );

        Ok(Transaction {
            version,
            inputs,
            outputs,
            witnesses,
            lock_time,
        })
    }
}

/// Reads a canonical count. Bounded by `MAX_COMPACT_SIZE`, so it fits a usize.
fn read_count(cursor: &mut Cursor<'_>) -> Result<usize, DecodeError> {
    Ok(cursor.read_compact_size_canonical()? as usize)
}

fn read_input(cursor: &mut Cursor<'_>) -> Result<TxIn, DecodeError> {
    let txid = Txid::from_bytes(cursor.read_array::<32>()?);
    let vout = cursor.read_u32_le()?;
    let script_sig = cursor.read_var_bytes()?.to_vec();
    let sequence = cursor.read_u32_le()?;
    Ok(TxIn::new(OutPoint::new(txid, vout), script_sig, sequence))
}

fn read_output(cursor: &mut Cursor<'_>) -> Result<TxOut, DecodeError> {
    let value = cursor.read_u64_le()?;
    let script_pubkey = cursor.read_var_bytes()?.to_vec();
    Ok(TxOut::new(value, script_pubkey))
}

fn read_witness(cursor: &mut Cursor<'_>) -> Result<Witness, DecodeError> {
    let count = read_count(cursor)?;
    // Each item costs at least its one-byte length prefix.
    let mut items = Vec::with_capacity(cmp::min(count, cursor.remaining()));
    for _ in 0..count {
        items.push(cursor.read_var_bytes()?.to_vec());
    }
    Ok(Witness::new(items))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// One input spending the null outpoint, one 10 BTC P2PKH output.
    const LEGACY_HEX: &str = "01000000\
        01\
        0000000000000000000000000000000000000000000000000000000000000000ffffffff\
        0504ffff001d\
        ffffffff\
        01\
        00ca9a3b00000000\
        1976a914000000000000000000000000000000000000000088ac\
        00000000";

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
    fn decodes_legacy_transaction() {
        let tx = Transaction::from_hex(LEGACY_HEX).unwrap();
        assert_eq!(tx.version, 1);
        assert!(!tx.is_segwit());
        assert!(tx.is_coinbase());
        assert_eq!(tx.inputs[0].script_sig, vec![0x04, 0xff, 0xff, 0x00, 0x1d]);
        assert_eq!(tx.inputs[0].sequence, 0xffff_ffff);
        assert_eq!(tx.outputs[0].value, 1_000_000_000);
        assert_eq!(tx.outputs[0].script_pubkey.len(), 25);
        assert_eq!(tx.lock_time, 0);
    }

    #[test]
    fn txid_bytes_are_kept_in_wire_order() {
        let mut bytes = hex::decode(LEGACY_HEX).unwrap();
        // First byte of the previous txid sits right after version + count.
        bytes[5] = 0xab;
        let tx = Transaction::decode(&bytes).unwrap();
        assert_eq!(tx.inputs[0].previous_output.txid.as_bytes()[0], 0xab);
    }

    #[test]
    fn decodes_segwit_transaction() {
        let tx = segwit_tx();
        let bytes = tx.encode();
        assert_eq!(&bytes[4..6], &[0x00, 0x01]);

        let decoded = Transaction::decode(&bytes).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(decoded.witness(0).unwrap().len(), 2);
    }

    #[test]
    fn rejects_invalid_hex() {
        for bad in ["0", "zz", "01000000g0"] {
            assert!(matches!(
                Transaction::from_hex(bad),
                Err(DecodeError::InvalidHexEncoding { .. })
            ));
        }
    }

    #[test]
    fn tolerates_surrounding_whitespace() {
        let padded = format!("  {}\n", LEGACY_HEX);
        assert!(Transaction::from_hex(&padded).is_ok());
    }

    #[test]
    fn rejects_trailing_bytes() {
        let hex = format!("{}00", LEGACY_HEX);
        let len = hex.len() / 2;
        assert_eq!(
            Transaction::from_hex(&hex).unwrap_err(),
            DecodeError::TrailingBytes {
                offset: len - 1,
                remaining: 1
            }
        );
    }

    #[test]
    fn rejects_empty_outputs() {
        let mut tx = Transaction::from_hex(LEGACY_HEX).unwrap();
        tx.outputs.clear();
        assert_eq!(
            Transaction::decode(&tx.encode()).unwrap_err(),
            DecodeError::EmptyInputsOrOutputs {
                inputs: 1,
                outputs: 0
            }
        );
    }

    #[test]
    fn rejects_empty_inputs() {
        // Version, zero inputs, zero outputs, lock time. A zero input count
        // followed by 0x01 would read as the segwit marker instead.
        let bytes = hex::decode("01000000000000000000").unwrap();
        assert_eq!(
            Transaction::decode(&bytes).unwrap_err(),
            DecodeError::EmptyInputsOrOutputs {
                inputs: 0,
                outputs: 0
            }
        );
    }

    #[test]
    fn rejects_superfluous_witness() {
        let mut tx = segwit_tx();
        tx.witnesses = Some(vec![Witness::default()]);
        assert!(matches!(
            Transaction::decode(&tx.encode()),
            Err(DecodeError::MalformedTransaction { .. })
        ));
    }

    #[test]
    fn every_prefix_fails() {
        for full in [hex::decode(LEGACY_HEX).unwrap(), segwit_tx().encode()] {
            for len in 0..full.len() {
                match Transaction::decode(&full[..len]) {
                    Err(DecodeError::TruncatedInput { .. })
                    | Err(DecodeError::MalformedTransaction { .. }) => {}
                    other => panic!("prefix of length {} gave {:?}", len, other),
                }
            }
        }
    }

    #[test]
    fn huge_declared_count_does_not_preallocate() {
        // Version, then a canonical input count of 0x0200_0000 and nothing else.
        let bytes = hex::decode("01000000fe00000002").unwrap();
        assert!(matches!(
            Transaction::decode(&bytes),
            Err(DecodeError::TruncatedInput { .. })
        ));
    }
}
