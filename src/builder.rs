//! # 交易组装模块
//!
//! 根据账本返回的可花费输出组装转账交易，计算找零并签名；
//! 以及创建发行新币的Coinbase交易。

use log::{debug, info};

use crate::address;
use crate::ledger::{SpendableOutputs, TransactionLookup};
use crate::transaction::{Transaction, TransactionError, TxInput, TxOutput, COINBASE_OUT_INDEX};
use crate::wallet::KeyStore;

/// 创建一笔已签名的转账交易
///
/// # 参数
///
/// * `from` - 发送者地址，必须存在于 `keys` 中
/// * `to` - 接收者地址
/// * `amount` - 转账金额
/// * `keys` - 钱包能力
/// * `ledger` - 提供可花费输出和之前交易的账本
///
/// # 返回值
///
/// 余额不足时返回 `InsufficientFunds`，不会产生部分交易。
/// 有找零时交易包含两个输出：接收者在前，找零在后。
pub fn new_transaction<K, L>(
    from: &str,
    to: &str,
    amount: u64,
    keys: &K,
    ledger: &L,
) -> Result<Transaction, TransactionError>
where
    K: KeyStore + ?Sized,
    L: SpendableOutputs + TransactionLookup + ?Sized,
{
    if amount == 0 {
        return Err(TransactionError::InvalidAmount);
    }

    let pub_key = keys
        .public_key(from)
        .ok_or_else(|| TransactionError::UnknownWallet(from.to_string()))?;
    let private_key = keys
        .private_key(from)
        .ok_or_else(|| TransactionError::UnknownWallet(from.to_string()))?;
    let pub_key_hash = address::public_key_hash(&pub_key);

    let (accumulated, valid_outputs) = ledger.find_spendable_outputs(&pub_key_hash, amount)?;
    debug!(
        "found {} spendable for {} across {} transactions",
        accumulated,
        from,
        valid_outputs.len()
    );

    if accumulated < amount {
        return Err(TransactionError::InsufficientFunds {
            required: amount,
            available: accumulated,
        });
    }

    let mut inputs = Vec::new();
    for (txid, outs) in &valid_outputs {
        let txid = hex::decode(txid)
            .map_err(|e| TransactionError::Lookup(format!("invalid transaction id {}: {}", txid, e)))?;
        for &out in outs {
            inputs.push(TxInput {
                txid: txid.clone(),
                out,
                signature: None,
                pub_key: pub_key.clone(),
            });
        }
    }

    let mut outputs = vec![TxOutput::new(amount, to)?];
    if accumulated > amount {
        outputs.push(TxOutput::new(accumulated - amount, from)?);
    }

    let mut tx = Transaction::new(inputs, outputs)?;
    let prev_txs = ledger.prior_transactions(&tx)?;
    tx.sign(&private_key, &prev_txs)?;

    info!(
        "built transaction {}: {} from {} to {}",
        tx.id_hex(),
        amount,
        from,
        to
    );
    Ok(tx)
}

/// 创建Coinbase交易
///
/// `data` 为空时使用 `"payment to <address>"` 作为附带数据。
pub fn coinbase_tx(to: &str, data: &str, subsidy: u64) -> Result<Transaction, TransactionError> {
    let data = if data.is_empty() {
        format!("payment to {}", to)
    } else {
        data.to_string()
    };

    let input = TxInput {
        txid: Vec::new(),
        out: COINBASE_OUT_INDEX,
        signature: None,
        pub_key: data.into_bytes(),
    };
    let output = TxOutput::new(subsidy, to)?;

    let tx = Transaction::new(vec![input], vec![output])?;
    info!("built coinbase {} paying {} to {}", tx.id_hex(), subsidy, to);
    Ok(tx)
}
