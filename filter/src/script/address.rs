//! Address rendering for the output templates that have one.
//!
//! Legacy hash templates render as Base58Check, witness programs as Bech32
//! (version 0) or Bech32m (version 1). Everything else has no address.

use std::fmt;
use std::str::FromStr;

use bech32::{hrp, segwit, Fe32, Hrp};
use serde::{Deserialize, Serialize};

use super::classify::{legacy_hash, witness_program, ScriptClass};
use crate::encoding::sha256d;

/// The chain an address is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
    Signet,
    Regtest,
}

impl Network {
    fn p2pkh_prefix(self) -> u8 {
        match self {
            Network::Mainnet => 0x00,
            _ => 0x6f,
        }
    }

    fn p2sh_prefix(self) -> u8 {
        match self {
            Network::Mainnet => 0x05,
            _ => 0xc4,
        }
    }

    fn hrp(self) -> Hrp {
        match self {
            Network::Mainnet => hrp::BC,
            Network::Testnet | Network::Signet => hrp::TB,
            Network::Regtest => hrp::BCRT,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Signet => "signet",
            Network::Regtest => "regtest",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "main" | "bitcoin" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            "signet" => Ok(Network::Signet),
            "regtest" => Ok(Network::Regtest),
            other => Err(format!("unknown network: {}", other)),
        }
    }
}

/// Renders the address of an output script, if its template has one.
pub fn address(script: &[u8], network: Network) -> Option<String> {
    match super::classify(script) {
        ScriptClass::P2pkh => Some(base58check(network.p2pkh_prefix(), legacy_hash(script)?)),
        ScriptClass::P2sh => Some(base58check(network.p2sh_prefix(), legacy_hash(script)?)),
        ScriptClass::P2wpkh | ScriptClass::P2wsh | ScriptClass::P2tr => {
            let (version, program) = witness_program(script)?;
            let version = match version {
                0 => segwit::VERSION_0,
                _ => segwit::VERSION_1,
            };
            segwit_address(network.hrp(), version, program)
        }
        _ => None,
    }
}

fn segwit_address(hrp: Hrp, version: Fe32, program: &[u8]) -> Option<String> {
    segwit::encode(hrp, version, program).ok()
}

fn base58check(prefix: u8, payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(1 + payload.len() + 4);
    data.push(prefix);
    data.extend_from_slice(payload);
    let checksum = sha256d(&data);
    data.extend_from_slice(&checksum[..4]);
    bs58::encode(data).into_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(prefix: &[u8], body: &str, suffix: &[u8]) -> Vec<u8> {
        let mut s = prefix.to_vec();
        s.extend_from_slice(&hex::decode(body).unwrap());
        s.extend_from_slice(suffix);
        s
    }

    #[test]
    fn p2pkh_mainnet_and_testnet() {
        let spk = script(
            &[0x76, 0xa9, 0x14],
            "62e907b15cbf27d5425399ebf6f0fb50ebb88f18",
            &[0x88, 0xac],
        );
        assert_eq!(
            address(&spk, Network::Mainnet).unwrap(),
            "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"
        );
        assert_eq!(
            address(&spk, Network::Testnet).unwrap(),
            "mpXwg4jMtRhuSpVq4xS3HFHmCmWp9NyGKt"
        );
    }

    #[test]
    fn p2sh_mainnet() {
        let spk = script(&[0xa9, 0x14], "8f55563b9a19f321c211e9b9f38cdf686ea07845", &[0x87]);
        assert_eq!(
            address(&spk, Network::Mainnet).unwrap(),
            "3EktnHQD7RiAE6uzMj2ZifT9YgRrkSgzQX"
        );
    }

    #[test]
    fn p2wpkh_bech32() {
        let spk = script(&[0x00, 0x14], "751e76e8199196d454941c45d1b3a323f1433bd6", &[]);
        assert_eq!(
            address(&spk, Network::Mainnet).unwrap(),
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"
        );
        assert_eq!(
            address(&spk, Network::Testnet).unwrap(),
            "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx"
        );
    }

    #[test]
    fn p2tr_bech32m() {
        let spk = script(
            &[0x51, 0x20],
            "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798",
            &[],
        );
        assert_eq!(
            address(&spk, Network::Mainnet).unwrap(),
            "bc1p0xlxvlhemja6c4dqv22uapctqupfhlxm9h8z3k2e72q4k9hcz7vqzk5jj0"
        );
    }

    #[test]
    fn no_address_for_data_or_nonstandard() {
        assert_eq!(address(&[0x6a, 0x01, 0x00], Network::Mainnet), None);
        assert_eq!(address(&[0xff], Network::Mainnet), None);
    }

    #[test]
    fn network_parsing() {
        assert_eq!("Mainnet".parse::<Network>().unwrap(), Network::Mainnet);
        assert_eq!("signet".parse::<Network>().unwrap(), Network::Signet);
        assert!("moon".parse::<Network>().is_err());
    }
}
