//! # Policy Configuration & Constants
//!
//! Every policy number the checker compares against lives here, with the
//! default a stock Knots node ships. If you're hardcoding a threshold
//! somewhere else, it belongs in this file instead.
//!
//! [`PolicyConfig`] is the serde-facing view of the same numbers: a JSON
//! file where every field is optional and falls back to the constant below.
//! The policy layer turns it into a [`PolicyContext`] before evaluating.
//!
//! [`PolicyContext`]: crate::policy::PolicyContext

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::policy::OverlayKind;
use crate::script::ScriptKind;
use crate::transaction::{OutPoint, TxOut, Txid};

// ---------------------------------------------------------------------------
// Money
// ---------------------------------------------------------------------------

/// Satoshis per bitcoin.
pub const COIN: u64 = 100_000_000;

/// No amount, and no sum of amounts, may exceed 21 million BTC.
pub const MAX_MONEY: u64 = 21_000_000 * COIN;

// ---------------------------------------------------------------------------
// Fee Rates
// ---------------------------------------------------------------------------

/// Minimum relay fee, in satoshis per 1000 virtual bytes. 1 sat/vB.
pub const DEFAULT_MIN_RELAY_FEE_SAT_PER_KVB: u64 = 1_000;

/// Fee rate used to price the future spend of an output when deciding
/// whether it is dust. 3 sat/vB.
pub const DUST_RELAY_FEE_SAT_PER_KVB: u64 = 3_000;

// ---------------------------------------------------------------------------
// Size Limits
// ---------------------------------------------------------------------------

/// Largest sigop-adjusted weight a standard transaction may have.
pub const MAX_STANDARD_TX_WEIGHT: u64 = 400_000;

/// Largest standard script-sig. Big enough for a 15-of-15 P2SH multisig
/// spend with compressed keys.
pub const MAX_STANDARD_SCRIPT_SIG_SIZE: usize = 1_650;

/// Virtual bytes charged per sigop when sigops outweigh the transaction.
pub const DEFAULT_BYTES_PER_SIGOP: u64 = 20;

/// Largest null-data payload (pushed bytes after `OP_RETURN`).
pub const DEFAULT_MAX_NULL_DATA_SIZE: usize = 80;

/// Largest output script that is not flagged as oversized.
pub const DEFAULT_MAX_STANDARD_SCRIPT_SIZE: usize = 1_650;

// ---------------------------------------------------------------------------
// Overlay Heuristics
// ---------------------------------------------------------------------------

/// Witness data runs at least this long are treated as an embedded payload.
/// Well above any honest multisig or timelock witness.
pub const DEFAULT_WITNESS_MIN_RUN_BYTES: usize = 256;

/// Byte tags of token/asset overlay protocols that ride on null-data outputs.
pub const DEFAULT_OVERLAY_MARKERS: &[&str] = &["omni", "Omni", "RSK"];

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Default HTTP API port of `knots-checker serve`.
pub const DEFAULT_API_PORT: u16 = 8337;

/// Default Prometheus metrics port.
pub const DEFAULT_METRICS_PORT: u16 = 9337;

/// Output templates accepted by default: everything with a known spend path
/// except bare multisig, plus null data.
pub fn default_accepted_scripts() -> BTreeSet<ScriptKind> {
    [
        ScriptKind::P2pkh,
        ScriptKind::P2sh,
        ScriptKind::P2wpkh,
        ScriptKind::P2wsh,
        ScriptKind::P2tr,
        ScriptKind::NullData,
    ]
    .into_iter()
    .collect()
}

// ---------------------------------------------------------------------------
// PolicyConfig
// ---------------------------------------------------------------------------

/// Errors from loading a [`PolicyConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse policy configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid policy configuration: {field} {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Thresholds for the witness-payload heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WitnessHeuristics {
    /// Shortest run of data-like witness bytes that gets flagged.
    pub min_run_bytes: usize,
}

impl Default for WitnessHeuristics {
    fn default() -> Self {
        Self {
            min_run_bytes: DEFAULT_WITNESS_MIN_RUN_BYTES,
        }
    }
}

/// A raw script, hex in JSON.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScriptBytes(#[serde(with = "hex")] pub Vec<u8>);

/// One known previous output, as supplied in a context file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrevoutEntry {
    /// Funding transaction id, in display order.
    pub txid: Txid,
    pub vout: u32,
    /// Value in satoshis.
    pub value: u64,
    #[serde(with = "hex")]
    pub script_pubkey: Vec<u8>,
}

impl PrevoutEntry {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.txid, self.vout)
    }

    pub fn txout(&self) -> TxOut {
        TxOut::new(self.value, self.script_pubkey.clone())
    }
}

/// Operator-facing policy configuration.
///
/// Every field has a default, so `{}` is a valid configuration and an
/// operator only writes down what they want to change:
///
/// ```json
/// {
///   "min_relay_fee_sat_per_kvb": 5000,
///   "permitted_overlays": ["protocol_marker"],
///   "prevouts": [
///     { "txid": "…", "vout": 0, "value": 60000, "script_pubkey": "0014…" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    pub min_relay_fee_sat_per_kvb: u64,
    pub dust_relay_fee_sat_per_kvb: u64,
    pub max_null_data_size: usize,
    pub max_standard_script_size: usize,
    pub max_script_sig_size: usize,
    pub max_standard_tx_weight: u64,
    pub bytes_per_sigop: u64,
    /// Output templates the `output_scripts` rule lets through.
    pub accepted_scripts: BTreeSet<ScriptKind>,
    /// Exact scripts accepted regardless of template.
    pub whitelisted_scripts: Vec<ScriptBytes>,
    /// Overlay kinds that are reported but do not fail the `overlay` rule.
    pub permitted_overlays: BTreeSet<OverlayKind>,
    pub witness: WitnessHeuristics,
    /// Tags searched for in null-data payloads.
    pub overlay_markers: Vec<String>,
    /// Previous outputs known up front.
    pub prevouts: Vec<PrevoutEntry>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            min_relay_fee_sat_per_kvb: DEFAULT_MIN_RELAY_FEE_SAT_PER_KVB,
            dust_relay_fee_sat_per_kvb: DUST_RELAY_FEE_SAT_PER_KVB,
            max_null_data_size: DEFAULT_MAX_NULL_DATA_SIZE,
            max_standard_script_size: DEFAULT_MAX_STANDARD_SCRIPT_SIZE,
            max_script_sig_size: MAX_STANDARD_SCRIPT_SIG_SIZE,
            max_standard_tx_weight: MAX_STANDARD_TX_WEIGHT,
            bytes_per_sigop: DEFAULT_BYTES_PER_SIGOP,
            accepted_scripts: default_accepted_scripts(),
            whitelisted_scripts: Vec::new(),
            permitted_overlays: BTreeSet::new(),
            witness: WitnessHeuristics::default(),
            overlay_markers: DEFAULT_OVERLAY_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            prevouts: Vec::new(),
        }
    }
}

impl PolicyConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would make every verdict meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_standard_tx_weight == 0 {
            return Err(ConfigError::Invalid {
                field: "max_standard_tx_weight",
                reason: "must be positive".into(),
            });
        }
        if self.witness.min_run_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "witness.min_run_bytes",
                reason: "must be positive".into(),
            });
        }
        if let Some(marker) = self.overlay_markers.iter().find(|m| m.is_empty()) {
            return Err(ConfigError::Invalid {
                field: "overlay_markers",
                reason: format!("contains an empty marker {:?}", marker),
            });
        }
        if let Some(entry) = self.prevouts.iter().find(|p| p.value > MAX_MONEY) {
            return Err(ConfigError::Invalid {
                field: "prevouts",
                reason: format!("{} has value {} above MAX_MONEY", entry.outpoint(), entry.value),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_is_default() {
        let config = PolicyConfig::from_json_str("{}").unwrap();
        assert_eq!(config, PolicyConfig::default());
    }

    #[test]
    fn test_defaults_match_constants() {
        let config = PolicyConfig::default();
        assert_eq!(config.min_relay_fee_sat_per_kvb, 1_000);
        assert_eq!(config.dust_relay_fee_sat_per_kvb, 3_000);
        assert_eq!(config.max_null_data_size, 80);
        assert_eq!(config.max_standard_tx_weight, 400_000);
        assert!(!config.accepted_scripts.contains(&ScriptKind::BareMultisig));
        assert!(!config.accepted_scripts.contains(&ScriptKind::NonStandard));
        assert!(config.permitted_overlays.is_empty());
    }

    #[test]
    fn test_partial_override() {
        let json = r#"{
            "min_relay_fee_sat_per_kvb": 5000,
            "accepted_scripts": ["p2wpkh", "p2tr"],
            "permitted_overlays": ["protocol_marker"],
            "witness": { "min_run_bytes": 1024 },
            "whitelisted_scripts": ["51"]
        }"#;
        let config = PolicyConfig::from_json_str(json).unwrap();
        assert_eq!(config.min_relay_fee_sat_per_kvb, 5000);
        assert_eq!(config.dust_relay_fee_sat_per_kvb, 3000);
        assert_eq!(config.accepted_scripts.len(), 2);
        assert!(config
            .permitted_overlays
            .contains(&OverlayKind::ProtocolMarker));
        assert_eq!(config.witness.min_run_bytes, 1024);
        assert_eq!(config.whitelisted_scripts, vec![ScriptBytes(vec![0x51])]);
    }

    #[test]
    fn test_prevout_entries() {
        let txid = "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";
        let json = format!(
            r#"{{ "prevouts": [ {{ "txid": "{}", "vout": 0, "value": 5000000000, "script_pubkey": "6a" }} ] }}"#,
            txid
        );
        let config = PolicyConfig::from_json_str(&json).unwrap();
        let entry = &config.prevouts[0];
        assert_eq!(entry.outpoint().to_string(), format!("{}:0", txid));
        assert_eq!(entry.txout(), TxOut::new(5_000_000_000, vec![0x6a]));
    }

    #[test]
    fn test_unknown_field_rejected() {
        match PolicyConfig::from_json_str(r#"{ "min_relay_fee": 1 }"#) {
            Err(ConfigError::Parse(_)) => {}
            other => panic!("expected Parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_validation() {
        match PolicyConfig::from_json_str(r#"{ "witness": { "min_run_bytes": 0 } }"#) {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "witness.min_run_bytes"),
            other => panic!("expected Invalid, got {:?}", other),
        }
        assert!(PolicyConfig::from_json_str(r#"{ "overlay_markers": [""] }"#).is_err());
    }

    #[test]
    fn test_money_constants() {
        assert_eq!(MAX_MONEY, 2_100_000_000_000_000);
        assert!(DUST_RELAY_FEE_SAT_PER_KVB > DEFAULT_MIN_RELAY_FEE_SAT_PER_KVB);
    }
}
