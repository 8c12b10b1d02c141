//! Output script template matching.
//!
//! `classify` never fails. A script that matches no template, or cannot
//! even be parsed, is simply [`ScriptClass::NonStandard`].

use std::fmt;

use serde::{Deserialize, Serialize};

use super::instruction::{instructions, parse, Instruction};
use super::opcodes::{
    small_int, OP_0, OP_1, OP_CHECKMULTISIG, OP_CHECKSIG, OP_DUP, OP_EQUAL, OP_EQUALVERIFY,
    OP_HASH160, OP_RETURN,
};

/// Recognized output script shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScriptClass {
    /// `OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG`
    P2pkh,
    /// `OP_HASH160 <20> OP_EQUAL`
    P2sh,
    /// `OP_0 <20>`
    P2wpkh,
    /// `OP_0 <32>`
    P2wsh,
    /// `OP_1 <32>`
    P2tr,
    /// `OP_m <key>... OP_n OP_CHECKMULTISIG`
    BareMultisig { required: u8, total: u8 },
    /// `OP_RETURN` followed only by pushes. `payload_size` is the number of
    /// pushed data bytes, not counting opcodes or length prefixes.
    NullData { payload_size: usize },
    NonStandard,
}

/// [`ScriptClass`] without its parameters, for sets and configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptKind {
    P2pkh,
    P2sh,
    P2wpkh,
    P2wsh,
    P2tr,
    BareMultisig,
    NullData,
    NonStandard,
}

impl ScriptClass {
    pub fn kind(&self) -> ScriptKind {
        match self {
            ScriptClass::P2pkh => ScriptKind::P2pkh,
            ScriptClass::P2sh => ScriptKind::P2sh,
            ScriptClass::P2wpkh => ScriptKind::P2wpkh,
            ScriptClass::P2wsh => ScriptKind::P2wsh,
            ScriptClass::P2tr => ScriptKind::P2tr,
            ScriptClass::BareMultisig { .. } => ScriptKind::BareMultisig,
            ScriptClass::NullData { .. } => ScriptKind::NullData,
            ScriptClass::NonStandard => ScriptKind::NonStandard,
        }
    }

    /// Native segwit output (any witness version we recognize).
    pub fn is_witness_program(&self) -> bool {
        matches!(
            self,
            ScriptClass::P2wpkh | ScriptClass::P2wsh | ScriptClass::P2tr
        )
    }
}

impl ScriptKind {
    pub const ALL: [ScriptKind; 8] = [
        ScriptKind::P2pkh,
        ScriptKind::P2sh,
        ScriptKind::P2wpkh,
        ScriptKind::P2wsh,
        ScriptKind::P2tr,
        ScriptKind::BareMultisig,
        ScriptKind::NullData,
        ScriptKind::NonStandard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptKind::P2pkh => "p2pkh",
            ScriptKind::P2sh => "p2sh",
            ScriptKind::P2wpkh => "p2wpkh",
            ScriptKind::P2wsh => "p2wsh",
            ScriptKind::P2tr => "p2tr",
            ScriptKind::BareMultisig => "bare_multisig",
            ScriptKind::NullData => "null_data",
            ScriptKind::NonStandard => "non_standard",
        }
    }
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ScriptClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptClass::BareMultisig { required, total } => {
                write!(f, "bare_multisig({}-of-{})", required, total)
            }
            ScriptClass::NullData { payload_size } => write!(f, "null_data({} bytes)", payload_size),
            other => f.write_str(other.kind().as_str()),
        }
    }
}

/// Classifies an output script.
///
/// Templates are tried in a fixed order: witness programs, then the legacy
/// hash templates, then bare multisig, then null data.
pub fn classify(script: &[u8]) -> ScriptClass {
    if let Some(class) = match_witness_program(script) {
        return class;
    }
    if is_p2pkh(script) {
        return ScriptClass::P2pkh;
    }
    if is_p2sh(script) {
        return ScriptClass::P2sh;
    }
    if let Some((required, total)) = match_multisig(script) {
        return ScriptClass::BareMultisig { required, total };
    }
    if let Some(payload_size) = match_null_data(script) {
        return ScriptClass::NullData { payload_size };
    }
    ScriptClass::NonStandard
}

/// Version and program of a recognized witness output.
pub fn witness_program(script: &[u8]) -> Option<(u8, &[u8])> {
    match (script.first(), script.get(1)) {
        (Some(&OP_0), Some(&0x14)) if script.len() == 22 => Some((0, &script[2..])),
        (Some(&OP_0), Some(&0x20)) if script.len() == 34 => Some((0, &script[2..])),
        (Some(&OP_1), Some(&0x20)) if script.len() == 34 => Some((1, &script[2..])),
        _ => None,
    }
}

fn match_witness_program(script: &[u8]) -> Option<ScriptClass> {
    let (version, program) = witness_program(script)?;
    Some(match (version, program.len()) {
        (0, 20) => ScriptClass::P2wpkh,
        (0, _) => ScriptClass::P2wsh,
        _ => ScriptClass::P2tr,
    })
}

fn is_p2pkh(script: &[u8]) -> bool {
    script.len() == 25
        && script[0] == OP_DUP
        && script[1] == OP_HASH160
        && script[2] == 0x14
        && script[23] == OP_EQUALVERIFY
        && script[24] == OP_CHECKSIG
}

fn is_p2sh(script: &[u8]) -> bool {
    script.len() == 23 && script[0] == OP_HASH160 && script[1] == 0x14 && script[22] == OP_EQUAL
}

/// The 20-byte hash inside a P2PKH or P2SH script.
pub fn legacy_hash(script: &[u8]) -> Option<&[u8]> {
    if is_p2pkh(script) {
        Some(&script[3..23])
    } else if is_p2sh(script) {
        Some(&script[2..22])
    } else {
        None
    }
}

fn match_multisig(script: &[u8]) -> Option<(u8, u8)> {
    if script.last() != Some(&OP_CHECKMULTISIG) {
        return None;
    }
    let parsed = parse(script).ok()?;
    let (first, rest) = parsed.split_first()?;
    let (_checkmultisig, rest) = rest.split_last()?;
    let (last, keys) = rest.split_last()?;

    let required = op_small_int(first)?;
    let total = op_small_int(last)?;
    if required == 0 || required > total || usize::from(total) != keys.len() {
        return None;
    }
    let keys_ok = keys.iter().all(|key| {
        matches!(key, Instruction::Push(bytes) if bytes.len() == 33 || bytes.len() == 65)
    });
    keys_ok.then_some((required, total))
}

fn op_small_int(ins: &Instruction<'_>) -> Option<u8> {
    match ins {
        Instruction::Op(op) => small_int(*op).filter(|n| *n > 0),
        Instruction::Push(_) => None,
    }
}

fn match_null_data(script: &[u8]) -> Option<usize> {
    let (&first, rest) = script.split_first()?;
    if first != OP_RETURN {
        return None;
    }
    let mut payload = 0;
    for ins in instructions(rest) {
        let ins = ins.ok()?;
        if !ins.is_push() {
            return None;
        }
        payload += ins.push_bytes().map_or(0, <[u8]>::len);
    }
    Some(payload)
}

/// Concatenated data pushed by a null-data script, for marker scanning.
/// Empty for anything that is not null data.
pub fn null_data_payload(script: &[u8]) -> Vec<u8> {
    if match_null_data(script).is_none() {
        return Vec::new();
    }
    instructions(&script[1..])
        .filter_map(Result::ok)
        .filter_map(|ins| ins.push_bytes().map(<[u8]>::to_vec))
        .flatten()
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
