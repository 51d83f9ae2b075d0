use std::collections::HashMap;

use secp256k1::SecretKey;
use utxo_ledger::address::{encode_address, public_key_hash};
use utxo_ledger::builder::coinbase_tx;
use utxo_ledger::transaction::{
    Transaction, TransactionError, TxInput, TxOutput, COINBASE_OUT_INDEX, SIGNATURE_LENGTH,
};
use utxo_ledger::wallet::Wallet;

// 辅助函数：用固定私钥创建钱包，保证测试可重复
fn wallet(seed: u8) -> Wallet {
    Wallet::from_secret_key(SecretKey::from_slice(&[seed; 32]).unwrap())
}

fn prev_map(txs: &[&Transaction]) -> HashMap<String, Transaction> {
    txs.iter().map(|tx| (tx.id_hex(), (*tx).clone())).collect()
}

fn spend(from: &Wallet, prev: &[(&Transaction, i32)], outputs: Vec<TxOutput>) -> Transaction {
    let inputs = prev
        .iter()
        .map(|(tx, out)| TxInput {
            txid: tx.id.clone(),
            out: *out,
            signature: None,
            pub_key: from.public_key.clone(),
        })
        .collect();
    Transaction::new(inputs, outputs).unwrap()
}

// 创建一笔由alice签名、花费两笔coinbase的交易
fn signed_fixture() -> (Transaction, HashMap<String, Transaction>) {
    let alice = wallet(1);
    let bob = wallet(2);
    let cb1 = coinbase_tx(&alice.address, "first", 100).unwrap();
    let cb2 = coinbase_tx(&alice.address, "second", 100).unwrap();

    let mut tx = spend(
        &alice,
        &[(&cb1, 0), (&cb2, 0)],
        vec![
            TxOutput::new(150, &bob.address).unwrap(),
            TxOutput::new(50, &alice.address).unwrap(),
        ],
    );
    let prev_txs = prev_map(&[&cb1, &cb2]);
    tx.sign(&alice.private_key, &prev_txs).unwrap();
    (tx, prev_txs)
}

#[test]
fn test_is_coinbase() {
    let alice = wallet(1);
    let cb = coinbase_tx(&alice.address, "", 100).unwrap();
    assert!(cb.is_coinbase());

    let mut with_txid = cb.clone();
    with_txid.inputs[0].txid = vec![1];
    assert!(!with_txid.is_coinbase());

    let mut with_index = cb.clone();
    with_index.inputs[0].out = 0;
    assert!(!with_index.is_coinbase());

    let mut two_inputs = cb.clone();
    two_inputs.inputs.push(cb.inputs[0].clone());
    assert!(!two_inputs.is_coinbase());
}

#[test]
fn test_coinbase_default_memo_and_output() {
    let alice = wallet(1);
    let cb = coinbase_tx(&alice.address, "", 100).unwrap();

    assert_eq!(cb.inputs.len(), 1);
    assert!(cb.inputs[0].txid.is_empty());
    assert_eq!(cb.inputs[0].out, COINBASE_OUT_INDEX);
    assert!(cb.inputs[0].signature.is_none());
    assert_eq!(
        String::from_utf8(cb.inputs[0].pub_key.clone()).unwrap(),
        format!("payment to {}", alice.address)
    );

    assert_eq!(cb.outputs.len(), 1);
    assert_eq!(cb.outputs[0].value, 100);
    assert!(cb.outputs[0].is_locked_with_key(&alice.pub_key_hash()));
    assert_eq!(cb.id, cb.hash().unwrap());
}

#[test]
fn test_coinbase_always_verifies() {
    let alice = wallet(1);
    let mut cb = coinbase_tx(&alice.address, "genesis", 100).unwrap();
    assert!(cb.verify(&HashMap::new()).unwrap());

    cb.inputs[0].signature = Some(vec![0xde, 0xad]);
    assert!(cb.verify(&HashMap::new()).unwrap());

    // 签名对Coinbase交易无效果
    let before = cb.clone();
    cb.sign(&alice.private_key, &HashMap::new()).unwrap();
    assert_eq!(cb, before);
}

#[test]
fn test_coinbase_rejects_malformed_address() {
    let result = coinbase_tx("not-an-address", "", 100);
    assert!(matches!(result, Err(TransactionError::MalformedAddress(_))));
}

#[test]
fn test_sign_then_verify() {
    let (tx, prev_txs) = signed_fixture();

    for input in &tx.inputs {
        assert_eq!(input.signature.as_ref().unwrap().len(), SIGNATURE_LENGTH);
    }
    // 两个输入花费不同的输出，签名各不相同
    assert_ne!(tx.inputs[0].signature, tx.inputs[1].signature);
    assert!(tx.verify(&prev_txs).unwrap());
}

#[test]
fn test_sign_keeps_id() {
    let alice = wallet(1);
    let cb = coinbase_tx(&alice.address, "", 100).unwrap();
    let mut tx = spend(&alice, &[(&cb, 0)], vec![TxOutput::new(100, &alice.address).unwrap()]);
    let id = tx.id.clone();

    tx.sign(&alice.private_key, &prev_map(&[&cb])).unwrap();
    assert_eq!(tx.id, id);
}

#[test]
fn test_resigning_is_independent_of_previous_signatures() {
    let (mut tx, prev_txs) = signed_fixture();
    let alice = wallet(1);

    tx.inputs[0].signature = Some(vec![7; SIGNATURE_LENGTH]);
    tx.sign(&alice.private_key, &prev_txs).unwrap();
    assert!(tx.verify(&prev_txs).unwrap());
}

#[test]
fn test_tampered_locking_hash_fails() {
    let (tx, prev_txs) = signed_fixture();

    for out in 0..tx.outputs.len() {
        for byte in 0..tx.outputs[out].pub_key_hash.len() {
            let mut tampered = tx.clone();
            tampered.outputs[out].pub_key_hash[byte] ^= 0x01;
            assert!(!tampered.verify(&prev_txs).unwrap(), "output {} byte {}", out, byte);
        }
    }
}

#[test]
fn test_tampered_value_fails() {
    let (mut tx, prev_txs) = signed_fixture();
    tx.outputs[0].value += 1;
    assert!(!tx.verify(&prev_txs).unwrap());
}

#[test]
fn test_tampered_signature_fails() {
    let (tx, prev_txs) = signed_fixture();

    for input in 0..tx.inputs.len() {
        for byte in 0..SIGNATURE_LENGTH {
            let mut tampered = tx.clone();
            tampered.inputs[input].signature.as_mut().unwrap()[byte] ^= 0x01;
            assert!(!tampered.verify(&prev_txs).unwrap(), "input {} byte {}", input, byte);
        }
    }
}

#[test]
fn test_swapped_signatures_fail() {
    let (mut tx, prev_txs) = signed_fixture();
    let first = tx.inputs[0].signature.clone();
    tx.inputs[0].signature = tx.inputs[1].signature.clone();
    tx.inputs[1].signature = first;
    assert!(!tx.verify(&prev_txs).unwrap());
}

#[test]
fn test_missing_or_truncated_signature_fails() {
    let (tx, prev_txs) = signed_fixture();

    let mut unsigned = tx.clone();
    unsigned.inputs[1].signature = None;
    assert!(!unsigned.verify(&prev_txs).unwrap());

    let mut truncated = tx.clone();
    truncated.inputs[0].signature.as_mut().unwrap().pop();
    assert!(!truncated.verify(&prev_txs).unwrap());
}

#[test]
fn test_wrong_key_fails() {
    let alice = wallet(1);
    let mallory = wallet(3);
    let cb = coinbase_tx(&alice.address, "", 100).unwrap();
    let prev_txs = prev_map(&[&cb]);

    // mallory用自己的公钥和私钥花费alice的输出
    let mut stolen = spend(&mallory, &[(&cb, 0)], vec![TxOutput::new(100, &mallory.address).unwrap()]);
    stolen.sign(&mallory.private_key, &prev_txs).unwrap();
    assert!(!stolen.inputs[0].uses_key(&alice.pub_key_hash()));
    assert!(!stolen.verify(&prev_txs).unwrap());

    // 签名者和公钥不一致
    let mut forged = spend(&alice, &[(&cb, 0)], vec![TxOutput::new(100, &mallory.address).unwrap()]);
    forged.sign(&mallory.private_key, &prev_txs).unwrap();
    assert!(!forged.verify(&prev_txs).unwrap());
}

#[test]
fn test_malformed_public_key_fails() {
    let (mut tx, prev_txs) = signed_fixture();
    tx.inputs[0].pub_key = vec![0; 64];
    assert!(!tx.verify(&prev_txs).unwrap());

    tx.inputs[0].pub_key = vec![1, 2, 3];
    assert!(!tx.verify(&prev_txs).unwrap());
}

#[test]
fn test_unresolved_reference() {
    let alice = wallet(1);
    let cb = coinbase_tx(&alice.address, "", 100).unwrap();
    let mut tx = spend(&alice, &[(&cb, 0)], vec![TxOutput::new(100, &alice.address).unwrap()]);
    let before = tx.clone();

    let err = tx.sign(&alice.private_key, &HashMap::new()).unwrap_err();
    assert!(matches!(err, TransactionError::UnresolvedReference(id) if id == cb.id_hex()));
    assert_eq!(tx, before);

    assert!(matches!(
        tx.verify(&HashMap::new()),
        Err(TransactionError::UnresolvedReference(_))
    ));
}

#[test]
fn test_missing_output_index() {
    let alice = wallet(1);
    let cb = coinbase_tx(&alice.address, "", 100).unwrap();
    let prev_txs = prev_map(&[&cb]);

    let mut tx = spend(&alice, &[(&cb, 3)], vec![TxOutput::new(100, &alice.address).unwrap()]);
    assert!(matches!(
        tx.sign(&alice.private_key, &prev_txs),
        Err(TransactionError::MissingOutput { index: 3, .. })
    ));

    tx.inputs[0].out = -1;
    tx.inputs.push(tx.inputs[0].clone());
    assert!(matches!(
        tx.verify(&prev_txs),
        Err(TransactionError::MissingOutput { index: -1, .. })
    ));
}

#[test]
fn test_trimmed_copy_clears_signing_fields() {
    let (tx, _) = signed_fixture();
    let trimmed = tx.trimmed_copy();

    assert_eq!(trimmed.id, tx.id);
    assert_eq!(trimmed.outputs, tx.outputs);
    for (trimmed_input, input) in trimmed.inputs.iter().zip(&tx.inputs) {
        assert_eq!(trimmed_input.txid, input.txid);
        assert_eq!(trimmed_input.out, input.out);
        assert!(trimmed_input.signature.is_none());
        assert!(trimmed_input.pub_key.is_empty());
    }
}

#[test]
fn test_hash_ignores_id() {
    let (mut tx, _) = signed_fixture();
    let hash = tx.hash().unwrap();
    tx.id = vec![9; 32];
    assert_eq!(tx.hash().unwrap(), hash);
}

#[test]
fn test_lock_and_key_checks() {
    let alice = wallet(1);
    let bob = wallet(2);

    let mut output = TxOutput::new(10, &alice.address).unwrap();
    assert!(output.is_locked_with_key(&alice.pub_key_hash()));
    assert!(!output.is_locked_with_key(&bob.pub_key_hash()));

    output.lock(&encode_address(&bob.pub_key_hash())).unwrap();
    assert!(output.is_locked_with_key(&bob.pub_key_hash()));
    assert!(output.lock("garbage").is_err());

    let input = TxInput {
        txid: vec![1],
        out: 0,
        signature: None,
        pub_key: alice.public_key.clone(),
    };
    assert!(input.uses_key(&public_key_hash(&alice.public_key)));
    assert!(!input.uses_key(&bob.pub_key_hash()));
}

#[test]
fn test_serialization_round_trip_keeps_validity() {
    let (tx, prev_txs) = signed_fixture();
    let bytes = tx.serialize().unwrap();
    let decoded = Transaction::deserialize(&bytes).unwrap();

    assert_eq!(decoded, tx);
    assert!(decoded.verify(&prev_txs).unwrap());
    assert!(Transaction::deserialize(b"{not json").is_err());
}

#[test]
fn test_display() {
    let (tx, _) = signed_fixture();
    let text = tx.to_string();

    assert!(text.starts_with(&format!("--- Transaction {}:", tx.id_hex())));
    assert!(text.contains("Input 1:"));
    assert!(text.contains("Output 1:"));
    assert!(text.contains("Value:  150"));
}
