//! # Script Module
//!
//! Just enough script understanding to apply relay policy: we never execute
//! anything, we only recognize shapes.
//!
//! ```text
//! opcodes.rs      — Opcode constants and small-integer helpers
//! instruction.rs  — Push-aware instruction iterator, push-only, sigop count
//! classify.rs     — Output template classification (ScriptClass)
//! address.rs      — Base58Check / Bech32 / Bech32m rendering per Network
//! ```

pub mod address;
pub mod classify;
pub mod instruction;
pub mod opcodes;

pub use address::{address, Network};
pub use classify::{classify, null_data_payload, witness_program, ScriptClass, ScriptKind};
pub use instruction::{
    instructions, is_push_only, legacy_sigop_count, parse, to_asm, Instruction, Instructions,
    ScriptError,
};
