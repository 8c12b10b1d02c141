//! Dust: outputs worth less than it would cost to spend them.
//!
//! The cost of spending is estimated from the output's template alone: a
//! fixed input size per class, priced at the dust relay fee rate.

use super::fee::FeeRate;
use crate::script::ScriptClass;
use crate::transaction::TxOut;

/// Estimated virtual size of the input that will one day spend an output of
/// this class.
///
/// | class          | vB  | spend                                       |
/// |----------------|-----|---------------------------------------------|
/// | P2PKH          | 148 | outpoint, sequence, DER sig, 33-byte key    |
/// | P2SH           | 148 | unknown redeem script, priced like P2PKH    |
/// | P2WPKH         | 68  | witness sig and key at a quarter the weight |
/// | P2WSH          | 104 | unknown witness script                      |
/// | P2TR           | 58  | key path, one 64-byte Schnorr signature     |
/// | bare multisig  | 148 | legacy spend                                |
/// | non-standard   | 300 | nobody knows; assume expensive              |
/// | null data      | 0   | unspendable                                 |
pub fn estimated_input_vsize(class: &ScriptClass) -> u64 {
    match class {
        ScriptClass::P2pkh => 148,
        ScriptClass::P2sh => 148,
        ScriptClass::P2wpkh => 68,
        ScriptClass::P2wsh => 104,
        ScriptClass::P2tr => 58,
        ScriptClass::BareMultisig { .. } => 148,
        ScriptClass::NonStandard => 300,
        ScriptClass::NullData { .. } => 0,
    }
}

/// What spending an output of this class costs at `dust_fee_rate`, rounded
/// up to whole satoshis.
pub fn spend_cost(class: &ScriptClass, dust_fee_rate: FeeRate) -> u64 {
    dust_fee_rate.fee_for_vsize(estimated_input_vsize(class))
}

/// `true` if the output is worth less than the cost of spending it.
///
/// The comparison is exact: `value < rate * vsize` without rounding the
/// right-hand side. Null data estimates a zero-size spend and is therefore
/// never dust here; whether a valued null-data output is acceptable is the
/// evaluator's call.
pub fn is_dust(output: &TxOut, class: &ScriptClass, dust_fee_rate: FeeRate) -> bool {
    dust_fee_rate.exceeds(output.value, estimated_input_vsize(class))
}
