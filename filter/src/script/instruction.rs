//! Push-aware script parsing.
//!
//! A script is a byte string, but not every byte is an opcode: push opcodes
//! are followed by their data. [`Instructions`] walks a script one opcode at
//! a time and hands out pushed data as borrowed slices.

use std::fmt;

use thiserror::Error;

use super::opcodes::{self, OP_16, OP_PUSHBYTES_75, OP_PUSHDATA1, OP_PUSHDATA2, OP_PUSHDATA4};
use crate::encoding::{Cursor, DecodeError};

/// Failure to parse a script into instructions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    /// A push opcode announced more data than the script holds.
    #[error("truncated push at offset {offset}: needed {needed} bytes, {remaining} remaining")]
    TruncatedPush {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    /// Any other byte-level failure.
    #[error("malformed script: {reason}")]
    Malformed { reason: String },
}

impl From<DecodeError> for ScriptError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::TruncatedInput {
                offset,
                needed,
                remaining,
            } => ScriptError::TruncatedPush {
                offset,
                needed,
                remaining,
            },
            other => ScriptError::Malformed {
                reason: other.to_string(),
            },
        }
    }
}

/// One parsed script element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction<'a> {
    /// Data pushed by `OP_0`, a direct push, or `OP_PUSHDATA1/2/4`.
    /// `OP_0` pushes the empty slice.
    Push(&'a [u8]),
    /// Any other opcode, including `OP_1NEGATE` and `OP_1..=OP_16`.
    Op(u8),
}

impl Instruction<'_> {
    /// Whether the instruction only puts a constant on the stack.
    pub fn is_push(&self) -> bool {
        match self {
            Instruction::Push(_) => true,
            Instruction::Op(op) => *op <= OP_16,
        }
    }

    /// Pushed bytes, for [`Instruction::Push`] only.
    pub fn push_bytes(&self) -> Option<&[u8]> {
        match self {
            Instruction::Push(data) => Some(data),
            Instruction::Op(_) => None,
        }
    }
}

impl fmt::Display for Instruction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Push(data) if data.is_empty() => f.write_str("OP_0"),
            Instruction::Push(data) => f.write_str(&hex::encode(data)),
            Instruction::Op(op) => match (opcodes::small_int(*op), opcodes::name(*op)) {
                (Some(n), _) => write!(f, "OP_{}", n),
                (None, Some(name)) => f.write_str(name),
                (None, None) => write!(f, "OP_UNKNOWN_{:#04x}", op),
            },
        }
    }
}

/// Iterator over the instructions of a script.
///
/// Yields `Err` once on a truncated push and then stops.
#[derive(Debug, Clone)]
pub struct Instructions<'a> {
    cursor: Cursor<'a>,
    failed: bool,
}

impl<'a> Instructions<'a> {
    pub fn new(script: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(script),
            failed: false,
        }
    }

    fn read_next(&mut self) -> Result<Instruction<'a>, ScriptError> {
        let op = self.cursor.read_u8()?;
        let len = match op {
            0x00..=OP_PUSHBYTES_75 => usize::from(op),
            OP_PUSHDATA1 => usize::from(self.cursor.read_u8()?),
            OP_PUSHDATA2 => usize::from(self.cursor.read_u16_le()?),
            OP_PUSHDATA4 => self.cursor.read_u32_le()? as usize,
            _ => return Ok(Instruction::Op(op)),
        };
        Ok(Instruction::Push(self.cursor.read_bytes(len)?))
    }
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Result<Instruction<'a>, ScriptError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.cursor.is_empty() {
            return None;
        }
        let next = self.read_next();
        self.failed = next.is_err();
        Some(next)
    }
}

/// Shorthand for [`Instructions::new`].
pub fn instructions(script: &[u8]) -> Instructions<'_> {
    Instructions::new(script)
}

/// Parses the whole script, failing on the first truncated push.
pub fn parse(script: &[u8]) -> Result<Vec<Instruction<'_>>, ScriptError> {
    instructions(script).collect()
}

/// `true` if the script parses and contains only push instructions
/// (opcodes up to and including `OP_16`).
pub fn is_push_only(script: &[u8]) -> bool {
    instructions(script).all(|ins| ins.map_or(false, |ins| ins.is_push()))
}

/// Counts signature operations the way legacy sigop accounting does, except
/// that `CHECKMULTISIG` preceded by `OP_1..=OP_16` counts that many keys
/// instead of the worst-case 20. Parsing stops at the first malformed push.
pub fn legacy_sigop_count(script: &[u8]) -> usize {
    let mut count = 0;
    let mut last_op = None;
    for ins in instructions(script) {
        let Ok(ins) = ins else { break };
        if let Instruction::Op(op) = ins {
            match op {
                opcodes::OP_CHECKSIG | opcodes::OP_CHECKSIGVERIFY => count += 1,
                opcodes::OP_CHECKMULTISIG | opcodes::OP_CHECKMULTISIGVERIFY => {
                    count += match last_op.and_then(opcodes::small_int) {
                        Some(n) if n > 0 => usize::from(n),
                        _ => 20,
                    };
                }
                _ => {}
            }
        }
        last_op = match ins {
            Instruction::Op(op) => Some(op),
            Instruction::Push(_) => None,
        };
    }
    count
}

/// Space-separated human-readable form. A malformed tail is shown as
/// `[error]`.
pub fn to_asm(script: &[u8]) -> String {
    let mut parts = Vec::new();
    for ins in instructions(script) {
        match ins {
            Ok(ins) => parts.push(ins.to_string()),
            Err(_) => parts.push("[error]".to_string()),
        }
    }
    parts.join(" ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
