//! Transactions shared by the unit tests of this binary.

/// P2WPKH spend paying 40 000 sat to P2TR and 59 000 sat of P2WPKH change.
/// Funded by [`FUNDING_TXID`]:0 for 100 000 sat it pays a 1 000 sat fee.
pub const PAYMENT_HEX: &str = "0200000000010101aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa0000000000fdffffff02409c00000000000022512079be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f8179878e6000000000000160014751e76e8199196d454941c45d1b3a323f1433bd6024730441111111111111111111111111111111111111111111111111111111111111111111111111111111111111111111111111111111111111111111111111111111111111111012102222222222222222222222222222222222222222222222222222222222222222200000000";
pub const PAYMENT_TXID: &str = "b135cc1f61106d822307e9dfee6efe622131f2091f5a58c66b99da2c98dd3fbf";
pub const FUNDING_TXID: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa01";
pub const PAYMENT_PREVOUT: &str =
    "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa01:0";

#[test]
fn payment_spends_the_funding_output() {
    use knots_filter::transaction::Transaction;

    let tx = Transaction::from_hex(PAYMENT_HEX).unwrap();
    assert_eq!(tx.txid().to_string(), PAYMENT_TXID);
    assert_eq!(tx.inputs[0].previous_output.to_string(), PAYMENT_PREVOUT);
    assert_eq!(tx.inputs[0].previous_output.txid.to_string(), FUNDING_TXID);
}
