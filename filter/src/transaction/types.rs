//! Core type definitions for decoded transactions.
//!
//! These types are plain data. Decoding builds them once, and nothing in the
//! crate mutates them afterwards. They serialize to JSON with scripts and
//! witness items as hex strings, so a renderer never has to touch bytes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::encoding::DecodeError;

/// Sequence number that disables lock time and replacement for an input.
pub const SEQUENCE_FINAL: u32 = 0xffff_ffff;

/// Highest sequence number that still signals BIP-125 replaceability.
pub const MAX_BIP125_RBF_SEQUENCE: u32 = 0xffff_fffd;

/// Lock times below this are block heights; at or above, Unix timestamps.
pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;

// ---------------------------------------------------------------------------
// Txid
// ---------------------------------------------------------------------------

/// A 32-byte transaction identifier, stored in wire (internal) byte order.
///
/// Block explorers and RPC show ids byte-reversed. [`fmt::Display`] and
/// [`FromStr`] speak that display order; [`Txid::as_bytes`] gives you the
/// bytes exactly as they appear inside a serialized transaction.
/// Witness ids (`wtxid`) use the same type.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Txid([u8; 32]);

impl Txid {
    /// Wraps 32 bytes in wire order.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The bytes in wire order.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parses the byte-reversed display form used by explorers and RPC.
    pub fn from_display_hex(s: &str) -> Result<Self, DecodeError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s.trim(), &mut bytes).map_err(|e| {
            DecodeError::InvalidHexEncoding {
                reason: format!("txid: {}", e),
            }
        })?;
        bytes.reverse();
        Ok(Self(bytes))
    }

    /// Hex in display (byte-reversed) order.
    pub fn to_display_hex(&self) -> String {
        let mut reversed = self.0;
        reversed.reverse();
        hex::encode(reversed)
    }
}

impl fmt::Display for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_hex())
    }
}

impl fmt::Debug for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Txid({})", self.to_display_hex())
    }
}

impl FromStr for Txid {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_display_hex(s)
    }
}

impl Serialize for Txid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Txid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_display_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// OutPoint
// ---------------------------------------------------------------------------

/// Reference to a previous transaction output: `txid:vout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    /// Id of the transaction that created the output.
    pub txid: Txid,
    /// Index of the output within that transaction.
    pub vout: u32,
}

impl OutPoint {
    /// The outpoint a coinbase input "spends".
    pub const NULL: OutPoint = OutPoint {
        txid: Txid([0; 32]),
        vout: u32::MAX,
    };

    pub fn new(txid: Txid, vout: u32) -> Self {
        Self { txid, vout }
    }

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

impl FromStr for OutPoint {
    type Err = DecodeError;

    /// Parses `"<display txid>:<vout>"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (txid, vout) = s.rsplit_once(':').ok_or_else(|| DecodeError::InvalidHexEncoding {
            reason: format!("outpoint {:?} is not of the form txid:vout", s),
        })?;
        let vout = vout.parse::<u32>().map_err(|e| DecodeError::InvalidHexEncoding {
            reason: format!("outpoint index {:?}: {}", vout, e),
        })?;
        Ok(Self::new(txid.parse()?, vout))
    }
}

// ---------------------------------------------------------------------------
// TxIn / TxOut
// ---------------------------------------------------------------------------

/// A transaction input. It carries no value; the value lives on the output
/// it spends and has to be looked up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    /// The output being spent.
    pub previous_output: OutPoint,
    /// Unlocking script, raw.
    #[serde(with = "hex")]
    pub script_sig: Vec<u8>,
    /// Sequence number (relative lock time / replaceability signal).
    pub sequence: u32,
}

impl TxIn {
    pub fn new(previous_output: OutPoint, script_sig: Vec<u8>, sequence: u32) -> Self {
        Self {
            previous_output,
            script_sig,
            sequence,
        }
    }
}

/// A transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    /// Value in satoshis.
    pub value: u64,
    /// Locking script, raw.
    #[serde(with = "hex")]
    pub script_pubkey: Vec<u8>,
}

impl TxOut {
    pub fn new(value: u64, script_pubkey: Vec<u8>) -> Self {
        Self {
            value,
            script_pubkey,
        }
    }
}

// ---------------------------------------------------------------------------
// Witness
// ---------------------------------------------------------------------------

/// The witness stack of one input: an ordered list of byte strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Witness(Vec<Vec<u8>>);

impl Witness {
    pub fn new(items: Vec<Vec<u8>>) -> Self {
        Self(items)
    }

    pub fn items(&self) -> &[Vec<u8>] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The last stack item, which for script-path spends is the script
    /// (P2WSH) or the control block (taproot).
    pub fn last(&self) -> Option<&[u8]> {
        self.0.last().map(Vec::as_slice)
    }
}

impl From<Vec<Vec<u8>>> for Witness {
    fn from(items: Vec<Vec<u8>>) -> Self {
        Self(items)
    }
}

impl Serialize for Witness {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().map(hex::encode))
    }
}

impl<'de> Deserialize<'de> for Witness {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = Vec::<String>::deserialize(deserializer)?;
        items
            .iter()
            .map(hex::decode)
            .collect::<Result<Vec<_>, _>>()
            .map(Witness)
            .map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// LockTime
// ---------------------------------------------------------------------------

/// Interpretation of the raw `nLockTime` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum LockTime {
    /// Zero: no lock.
    Unlocked,
    /// Not valid before this block height.
    Height(u32),
    /// Not valid before this Unix timestamp (median time past).
    Time(u32),
}

impl LockTime {
    pub fn from_consensus(raw: u32) -> Self {
        match raw {
            0 => Self::Unlocked,
            n if n < LOCKTIME_THRESHOLD => Self::Height(n),
            n => Self::Time(n),
        }
    }
}

impl fmt::Display for LockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlocked => write!(f, "unlocked"),
            Self::Height(h) => write!(f, "height {}", h),
            Self::Time(t) => write!(f, "time {}", t),
        }
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A decoded Bitcoin transaction.
///
/// `witnesses` is `Some` exactly when the transaction was (or will be)
/// serialized with the segwit marker and flag; in that case it holds one
/// [`Witness`] per input, possibly empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub witnesses: Option<Vec<Witness>>,
    pub lock_time: u32,
}

impl Transaction {
    /// `true` if the transaction carries witness data.
    pub fn is_segwit(&self) -> bool {
        self.witnesses.is_some()
    }

    /// Witness stack for input `index`, if the transaction has witnesses.
    pub fn witness(&self, index: usize) -> Option<&Witness> {
        self.witnesses.as_ref()?.get(index)
    }

    /// A single input spending the null outpoint.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].previous_output.is_null()
    }

    pub fn lock_time(&self) -> LockTime {
        LockTime::from_consensus(self.lock_time)
    }

    /// Lock time is only enforced if at least one input is non-final.
    pub fn is_lock_time_enabled(&self) -> bool {
        self.inputs.iter().any(|i| i.sequence != SEQUENCE_FINAL)
    }

    /// BIP-125 opt-in replace-by-fee signal.
    pub fn signals_rbf(&self) -> bool {
        self.inputs
            .iter()
            .any(|i| i.sequence <= MAX_BIP125_RBF_SEQUENCE)
    }

    /// Sum of output values, or `None` on overflow.
    pub fn output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, o| acc.checked_add(o.value))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
