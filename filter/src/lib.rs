// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Knots Filter — Core Library
//!
//! Answers one question before you broadcast: would a node running the
//! stricter Knots-style relay policy accept this transaction, or bounce it
//! as spam?
//!
//! The library never talks to a node. It decodes the raw bytes you hand it,
//! looks up previous outputs in a [`policy::PolicyContext`] you populated,
//! and returns a [`policy::Verdict`] listing every rule and how the
//! transaction fared against it.
//!
//! ## Architecture
//!
//! - **encoding** — Byte cursor and Bitcoin's compact-size integers.
//! - **transaction** — Transaction model, wire decoding/encoding, txid, weight.
//! - **script** — Opcodes, push parsing, template classification, addresses.
//! - **policy** — Fee rate, dust, overlay heuristics, and the rule engine.
//! - **config** — Policy defaults and the serde-loadable configuration.
//!
//! ## Design Philosophy
//!
//! 1. Consensus is not our job. We check relay policy, and say so.
//! 2. Satoshis are integers and fee rates are fractions. No floats, ever.
//! 3. Every rule runs. A submitter should see all of their problems at once.
//! 4. Bad input is an error; a failed rule is an answer.
//!
//! ## Example
//!
//! ```
//! use knots_filter::policy::{evaluate, PolicyContext};
//! use knots_filter::transaction::{OutPoint, Transaction, TxIn, TxOut, Txid};
//!
//! let prevout = OutPoint::new(Txid::from_bytes([7; 32]), 0);
//! let mut script_pubkey = vec![0x00, 0x14];
//! script_pubkey.extend_from_slice(&[0xab; 20]);
//!
//! let tx = Transaction {
//!     version: 2,
//!     inputs: vec![TxIn::new(prevout, vec![0x51], 0xffff_ffff)],
//!     outputs: vec![TxOut::new(50_000, script_pubkey.clone())],
//!     witnesses: None,
//!     lock_time: 0,
//! };
//!
//! let ctx = PolicyContext::default().with_prevout(prevout, TxOut::new(60_000, script_pubkey));
//! let verdict = evaluate(&tx, &ctx).unwrap();
//! assert_eq!(verdict.fee, 10_000);
//! ```

pub mod config;
pub mod encoding;
pub mod policy;
pub mod script;
pub mod transaction;
