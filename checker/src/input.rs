//! Turning command-line arguments into a transaction hex string and a
//! [`PolicyContext`].

use anyhow::{anyhow, bail, Context, Result};
use std::io::Read;
use std::path::Path;

use knots_filter::config::PolicyConfig;
use knots_filter::policy::PolicyContext;
use knots_filter::transaction::{OutPoint, Txid, TxOut};

/// Resolves a `--tx` argument: literal hex, `@path`, or `-` for stdin.
pub fn read_tx_arg(arg: &str) -> Result<String> {
    if arg == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read transaction from stdin")?;
        return Ok(buf);
    }
    if let Some(path) = arg.strip_prefix('@') {
        return std::fs::read_to_string(path)
            .with_context(|| format!("failed to read transaction from {}", path));
    }
    Ok(arg.to_string())
}

/// Loads a policy configuration file, or the defaults when none is given.
pub fn load_config(path: Option<&Path>) -> Result<PolicyConfig> {
    let Some(path) = path else {
        return Ok(PolicyConfig::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read context file {}", path.display()))?;
    let config = PolicyConfig::from_json_str(&json)
        .with_context(|| format!("failed to load context file {}", path.display()))?;
    tracing::debug!(
        path = %path.display(),
        prevouts = config.prevouts.len(),
        "policy context loaded"
    );
    Ok(config)
}

/// Parses `TXID:VOUT:VALUE:SCRIPTHEX`.
pub fn parse_prevout(spec: &str) -> Result<(OutPoint, TxOut)> {
    let parts: Vec<&str> = spec.split(':').collect();
    let [txid, vout, value, script] = parts.as_slice() else {
        bail!("prevout {:?} is not TXID:VOUT:VALUE:SCRIPTHEX", spec);
    };
    let txid: Txid = txid
        .parse()
        .map_err(|e| anyhow!("prevout {:?}: bad txid: {}", spec, e))?;
    let vout: u32 = vout
        .parse()
        .with_context(|| format!("prevout {:?}: bad vout", spec))?;
    let value: u64 = value
        .parse()
        .with_context(|| format!("prevout {:?}: bad value", spec))?;
    let script_pubkey =
        hex::decode(script).with_context(|| format!("prevout {:?}: bad script hex", spec))?;
    Ok((OutPoint::new(txid, vout), TxOut::new(value, script_pubkey)))
}

/// Builds the evaluation context for `check`: the context file first, then
/// each `--prevout` on top of it.
pub fn build_context(path: Option<&Path>, prevouts: &[String]) -> Result<PolicyContext> {
    let config = load_config(path)?;
    let mut ctx = PolicyContext::from_config(&config);
    for spec in prevouts {
        let (outpoint, txout) = parse_prevout(spec)?;
        ctx = ctx.with_prevout(outpoint, txout);
    }
    Ok(ctx)
}
