//! Everything an evaluation needs besides the transaction itself.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::debug;

use super::error::PolicyError;
use super::fee::FeeRate;
use super::overlay::OverlayKind;
use crate::config::{PolicyConfig, WitnessHeuristics};
use crate::script::ScriptKind;
use crate::transaction::{OutPoint, Transaction, TxOut};

/// Somewhere previous outputs can be looked up: a node, an index, a map.
///
/// Lookups are synchronous. An implementation backed by a remote node is
/// expected to have fetched what it needs before evaluation starts.
pub trait PrevoutSource {
    fn prevout(&self, outpoint: &OutPoint) -> Option<TxOut>;
}

impl PrevoutSource for BTreeMap<OutPoint, TxOut> {
    fn prevout(&self, outpoint: &OutPoint) -> Option<TxOut> {
        self.get(outpoint).cloned()
    }
}

impl PrevoutSource for HashMap<OutPoint, TxOut> {
    fn prevout(&self, outpoint: &OutPoint) -> Option<TxOut> {
        self.get(outpoint).cloned()
    }
}

/// Prevouts and policy thresholds for one or more evaluations.
///
/// The evaluator only ever borrows a context. Build one per request, or
/// share one across threads; nothing in it changes during evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyContext {
    pub prevouts: BTreeMap<OutPoint, TxOut>,
    pub min_relay_fee_rate: FeeRate,
    pub dust_relay_fee_rate: FeeRate,
    pub max_null_data_size: usize,
    pub max_standard_script_size: usize,
    pub max_script_sig_size: usize,
    pub max_standard_tx_weight: u64,
    pub bytes_per_sigop: u64,
    pub accepted_scripts: BTreeSet<ScriptKind>,
    pub whitelisted_scripts: BTreeSet<Vec<u8>>,
    pub permitted_overlays: BTreeSet<OverlayKind>,
    pub witness: WitnessHeuristics,
    pub overlay_markers: Vec<Vec<u8>>,
}

impl Default for PolicyContext {
    fn default() -> Self {
        Self::from_config(&PolicyConfig::default())
    }
}

impl PolicyContext {
    /// Builds a context from configuration, including any prevouts it lists.
    pub fn from_config(config: &PolicyConfig) -> Self {
        Self {
            prevouts: config
                .prevouts
                .iter()
                .map(|entry| (entry.outpoint(), entry.txout()))
                .collect(),
            min_relay_fee_rate: FeeRate::from_sat_per_kvb(config.min_relay_fee_sat_per_kvb),
            dust_relay_fee_rate: FeeRate::from_sat_per_kvb(config.dust_relay_fee_sat_per_kvb),
            max_null_data_size: config.max_null_data_size,
            max_standard_script_size: config.max_standard_script_size,
            max_script_sig_size: config.max_script_sig_size,
            max_standard_tx_weight: config.max_standard_tx_weight,
            bytes_per_sigop: config.bytes_per_sigop,
            accepted_scripts: config.accepted_scripts.clone(),
            whitelisted_scripts: config
                .whitelisted_scripts
                .iter()
                .map(|script| script.0.clone())
                .collect(),
            permitted_overlays: config.permitted_overlays.clone(),
            witness: config.witness,
            overlay_markers: config
                .overlay_markers
                .iter()
                .map(|marker| marker.as_bytes().to_vec())
                .collect(),
        }
    }

    pub fn with_prevout(mut self, outpoint: OutPoint, txout: TxOut) -> Self {
        self.prevouts.insert(outpoint, txout);
        self
    }

    pub fn with_min_relay_fee_rate(mut self, rate: FeeRate) -> Self {
        self.min_relay_fee_rate = rate;
        self
    }

    pub fn with_dust_relay_fee_rate(mut self, rate: FeeRate) -> Self {
        self.dust_relay_fee_rate = rate;
        self
    }

    pub fn with_max_null_data_size(mut self, size: usize) -> Self {
        self.max_null_data_size = size;
        self
    }

    pub fn permit_overlay(mut self, kind: OverlayKind) -> Self {
        self.permitted_overlays.insert(kind);
        self
    }

    pub fn prevout(&self, outpoint: &OutPoint) -> Option<&TxOut> {
        self.prevouts.get(outpoint)
    }

    /// Fills in the prevouts `tx` spends from `source`, skipping ones
    /// already known.
    ///
    /// Stops at the first outpoint `source` cannot supply and reports it as
    /// [`PolicyError::MissingPrevout`]. Prevouts resolved before that point
    /// stay in the map.
    pub fn resolve_prevouts<S>(&mut self, tx: &Transaction, source: &S) -> Result<(), PolicyError>
    where
        S: PrevoutSource + ?Sized,
    {
        for input in &tx.inputs {
            let outpoint = input.previous_output;
            if self.prevouts.contains_key(&outpoint) {
                continue;
            }
            let txout = source
                .prevout(&outpoint)
                .ok_or(PolicyError::MissingPrevout { outpoint })?;
            debug!(%outpoint, value = txout.value, "resolved prevout");
            self.prevouts.insert(outpoint, txout);
        }
        Ok(())
    }
}
