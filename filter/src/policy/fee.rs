//! Fee, fee rate and sigop-adjusted size.
//!
//! A fee rate is kept as the fraction `sats / vbytes` and compared by
//! cross-multiplying in 128 bits. Dividing first would round, and a rate
//! that rounds across a threshold flips a verdict.

use std::cmp::Ordering;
use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use super::context::PolicyContext;
use super::error::PolicyError;
use crate::config::MAX_MONEY;
use crate::script::legacy_sigop_count;
use crate::transaction::encode::{weight_to_vsize, WITNESS_SCALE_FACTOR};
use crate::transaction::Transaction;

// ---------------------------------------------------------------------------
// FeeRate
// ---------------------------------------------------------------------------

/// An exact fee rate: `sats` satoshis per `vbytes` virtual bytes.
///
/// `vbytes` is never zero. Equality and ordering compare the value of the
/// fraction, so `2/2 == 1/1`.
#[derive(Debug, Clone, Copy)]
pub struct FeeRate {
    sats: u64,
    vbytes: u64,
}

impl FeeRate {
    pub const ZERO: FeeRate = FeeRate { sats: 0, vbytes: 1 };

    /// `sats / vbytes`, or `None` when `vbytes` is zero.
    pub fn new(sats: u64, vbytes: u64) -> Option<Self> {
        (vbytes != 0).then_some(Self { sats, vbytes })
    }

    pub const fn from_sat_per_vb(sat_per_vb: u64) -> Self {
        Self {
            sats: sat_per_vb,
            vbytes: 1,
        }
    }

    /// The unit node configuration uses (`-minrelaytxfee`, `-dustrelayfee`).
    pub const fn from_sat_per_kvb(sat_per_kvb: u64) -> Self {
        Self {
            sats: sat_per_kvb,
            vbytes: 1_000,
        }
    }

    pub fn sats(&self) -> u64 {
        self.sats
    }

    pub fn vbytes(&self) -> u64 {
        self.vbytes
    }

    /// Fee for `vsize` virtual bytes at this rate, rounded up.
    /// Saturates at `u64::MAX`.
    pub fn fee_for_vsize(&self, vsize: u64) -> u64 {
        let numerator = u128::from(self.sats) * u128::from(vsize);
        let fee = numerator.div_ceil(u128::from(self.vbytes));
        u64::try_from(fee).unwrap_or(u64::MAX)
    }

    /// `true` if `value` satoshis is less than the cost of `vsize` virtual
    /// bytes at this rate, compared exactly.
    pub fn exceeds(&self, value: u64, vsize: u64) -> bool {
        u128::from(value) * u128::from(self.vbytes) < u128::from(self.sats) * u128::from(vsize)
    }

    /// Rate in thousandths of a sat/vB, rounded down.
    fn millisats_per_vb(&self) -> u128 {
        u128::from(self.sats) * 1_000 / u128::from(self.vbytes)
    }
}

impl PartialEq for FeeRate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FeeRate {}

impl PartialOrd for FeeRate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FeeRate {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = u128::from(self.sats) * u128::from(other.vbytes);
        let rhs = u128::from(other.sats) * u128::from(self.vbytes);
        lhs.cmp(&rhs)
    }
}

impl fmt::Display for FeeRate {
    /// `"5 sat/vB"`, or up to three decimals (truncated) when fractional:
    /// `"1.234 sat/vB"`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let milli = self.millisats_per_vb();
        let (whole, frac) = (milli / 1_000, milli % 1_000);
        if frac == 0 {
            write!(f, "{} sat/vB", whole)
        } else {
            let digits = format!("{:03}", frac);
            write!(f, "{}.{} sat/vB", whole, digits.trim_end_matches('0'))
        }
    }
}

impl Serialize for FeeRate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("FeeRate", 3)?;
        state.serialize_field("sats", &self.sats)?;
        state.serialize_field("vbytes", &self.vbytes)?;
        state.serialize_field("display", &self.to_string())?;
        state.end()
    }
}

// ---------------------------------------------------------------------------
// Fee
// ---------------------------------------------------------------------------

/// Sum of spent prevout values minus sum of output values.
///
/// # Errors
///
/// - [`PolicyError::MissingPrevout`] for the first input whose prevout the
///   context does not know.
/// - [`PolicyError::ValueOutOfRange`] if a sum overflows or passes
///   [`MAX_MONEY`].
/// - [`PolicyError::NegativeFee`] if outputs are worth more than inputs.
pub fn compute_fee(tx: &Transaction, ctx: &PolicyContext) -> Result<u64, PolicyError> {
    let mut input_value: u64 = 0;
    for input in &tx.inputs {
        let prevout = ctx
            .prevout(&input.previous_output)
            .ok_or(PolicyError::MissingPrevout {
                outpoint: input.previous_output,
            })?;
        input_value = input_value
            .checked_add(prevout.value)
            .filter(|sum| *sum <= MAX_MONEY)
            .ok_or(PolicyError::ValueOutOfRange { what: "input value" })?;
    }

    let output_value = tx
        .output_value()
        .filter(|sum| *sum <= MAX_MONEY)
        .ok_or(PolicyError::ValueOutOfRange {
            what: "output value",
        })?;

    input_value
        .checked_sub(output_value)
        .ok_or(PolicyError::NegativeFee {
            input_value,
            output_value,
        })
}

/// Fee divided by virtual size, exactly.
pub fn compute_fee_rate(tx: &Transaction, ctx: &PolicyContext) -> Result<FeeRate, PolicyError> {
    let fee = compute_fee(tx, ctx)?;
    Ok(FeeRate {
        sats: fee,
        // A serialized transaction is never shorter than ten bytes.
        vbytes: tx.vsize().max(1),
    })
}

// ---------------------------------------------------------------------------
// Sigops
// ---------------------------------------------------------------------------

/// Legacy sigop cost: every sigop in script-sigs and script-pubkeys, scaled
/// to weight units.
pub fn sigop_cost(tx: &Transaction) -> u64 {
    let sigops: usize = tx
        .inputs
        .iter()
        .map(|input| legacy_sigop_count(&input.script_sig))
        .chain(
            tx.outputs
                .iter()
                .map(|output| legacy_sigop_count(&output.script_pubkey)),
        )
        .sum();
    sigops as u64 * WITNESS_SCALE_FACTOR
}

/// Weight, or the sigop cost priced at `bytes_per_sigop`, whichever is larger.
pub fn sigop_adjusted_weight(tx: &Transaction, bytes_per_sigop: u64) -> u64 {
    tx.weight()
        .max(sigop_cost(tx).saturating_mul(bytes_per_sigop))
}

/// [`sigop_adjusted_weight`] in virtual bytes, rounded up.
pub fn sigop_adjusted_vsize(tx: &Transaction, bytes_per_sigop: u64) -> u64 {
    weight_to_vsize(sigop_adjusted_weight(tx, bytes_per_sigop))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{OutPoint, TxIn, TxOut, Txid};

    fn outpoint(n: u8) -> OutPoint {
        OutPoint::new(Txid::from_bytes([n; 32]), 0)
    }

    fn tx(inputs: &[OutPoint], outputs: &[u64]) -> Transaction {
        Transaction {
            version: 2,
            inputs: inputs
                .iter()
                .map(|op| TxIn::new(*op, vec![], 0xffff_ffff))
                .collect(),
            outputs: outputs.iter().map(|v| TxOut::new(*v, vec![0x51])).collect(),
            witnesses: None,
            lock_time: 0,
        }
    }

    #[test]
    fn fee_rates_compare_as_fractions() {
        assert_eq!(FeeRate::new(2, 2).unwrap(), FeeRate::from_sat_per_vb(1));
        assert_eq!(FeeRate::from_sat_per_kvb(1_000), FeeRate::from_sat_per_vb(1));
        assert!(FeeRate::new(999, 1_000).unwrap() < FeeRate::from_sat_per_vb(1));
        assert!(FeeRate::new(1_001, 1_000).unwrap() > FeeRate::from_sat_per_vb(1));
        assert!(FeeRate::new(1, 0).is_none());
    }

    #[test]
    fn comparison_survives_huge_values() {
        let a = FeeRate::new(u64::MAX, u64::MAX - 1).unwrap();
        let b = FeeRate::new(u64::MAX - 1, u64::MAX - 2).unwrap();
        // Both are just above 1; a float comparison would call them equal.
        assert!(a < b);
    }

    #[test]
    fn display_formats() {
        assert_eq!(FeeRate::from_sat_per_vb(5).to_string(), "5 sat/vB");
        assert_eq!(FeeRate::from_sat_per_kvb(1_500).to_string(), "1.5 sat/vB");
        assert_eq!(FeeRate::new(1, 3).unwrap().to_string(), "0.333 sat/vB");
        assert_eq!(FeeRate::ZERO.to_string(), "0 sat/vB");
    }

    #[test]
    fn fee_for_vsize_rounds_up() {
        let rate = FeeRate::from_sat_per_kvb(3_000);
        assert_eq!(rate.fee_for_vsize(68), 204);
        assert_eq!(FeeRate::new(1, 3).unwrap().fee_for_vsize(1), 1);
        assert_eq!(FeeRate::new(110, 68).unwrap().fee_for_vsize(68), 110);
        assert_eq!(FeeRate::from_sat_per_vb(u64::MAX).fee_for_vsize(2), u64::MAX);
    }

    #[test]
    fn serializes_with_display() {
        let json = serde_json::to_value(FeeRate::from_sat_per_vb(2)).unwrap();
        assert_eq!(json["sats"], 2);
        assert_eq!(json["vbytes"], 1);
        assert_eq!(json["display"], "2 sat/vB");
    }

    #[test]
    fn fee_is_inputs_minus_outputs() {
        let ctx = PolicyContext::default()
            .with_prevout(outpoint(1), TxOut::new(7_000, vec![]))
            .with_prevout(outpoint(2), TxOut::new(3_000, vec![]));
        let tx = tx(&[outpoint(1), outpoint(2)], &[4_000, 5_000]);
        assert_eq!(compute_fee(&tx, &ctx).unwrap(), 1_000);

        let rate = compute_fee_rate(&tx, &ctx).unwrap();
        assert_eq!(rate, FeeRate::new(1_000, tx.vsize()).unwrap());
    }

    #[test]
    fn missing_prevout_is_context_error() {
        let ctx = PolicyContext::default().with_prevout(outpoint(1), TxOut::new(7_000, vec![]));
        let tx = tx(&[outpoint(1), outpoint(2)], &[1]);
        match compute_fee(&tx, &ctx) {
            Err(err @ PolicyError::MissingPrevout { .. }) => {
                assert!(err.is_context_error());
                assert_eq!(err, PolicyError::MissingPrevout { outpoint: outpoint(2) });
            }
            other => panic!("expected MissingPrevout, got {:?}", other),
        }
    }

    #[test]
    fn negative_fee_is_input_error() {
        let ctx = PolicyContext::default().with_prevout(outpoint(1), TxOut::new(100, vec![]));
        let err = compute_fee(&tx(&[outpoint(1)], &[101]), &ctx).unwrap_err();
        assert_eq!(
            err,
            PolicyError::NegativeFee {
                input_value: 100,
                output_value: 101
            }
        );
        assert!(!err.is_context_error());
    }

    #[test]
    fn oversized_values_are_out_of_range() {
        let ctx = PolicyContext::default()
            .with_prevout(outpoint(1), TxOut::new(MAX_MONEY, vec![]))
            .with_prevout(outpoint(2), TxOut::new(1, vec![]));
        assert!(matches!(
            compute_fee(&tx(&[outpoint(1), outpoint(2)], &[1]), &ctx),
            Err(PolicyError::ValueOutOfRange { .. })
        ));

        let ctx = PolicyContext::default().with_prevout(outpoint(1), TxOut::new(1, vec![]));
        assert!(matches!(
            compute_fee(&tx(&[outpoint(1)], &[u64::MAX, 1]), &ctx),
            Err(PolicyError::ValueOutOfRange {
                what: "output value"
            })
        ));
    }

    #[test]
    fn sigops_inflate_adjusted_size() {
        let mut heavy = tx(&[outpoint(1)], &[1]);
        // 100 bare CHECKSIGs: 400 sigop cost, 8000 weight at 20 bytes each.
        heavy.outputs[0].script_pubkey = vec![0xac; 100];
        assert_eq!(sigop_cost(&heavy), 400);
        assert!(heavy.weight() < 8_000);
        assert_eq!(sigop_adjusted_weight(&heavy, 20), 8_000);
        assert_eq!(sigop_adjusted_vsize(&heavy, 20), 2_000);

        // With sigops priced at zero the plain weight wins.
        assert_eq!(sigop_adjusted_weight(&heavy, 0), heavy.weight());
    }
}
