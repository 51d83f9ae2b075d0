//! # 账本模块
//!
//! 交易核心所依赖的外部账本能力，以及一个内存中的参考实现。

use std::collections::{BTreeMap, HashMap};

use log::{info, warn};
use secp256k1::SecretKey;

use crate::address;
use crate::builder;
use crate::config::Config;
use crate::transaction::{Transaction, TransactionError, TxOutput};

/// 可花费输出，键为十六进制交易ID，值为输出索引列表
pub type SpendableSet = BTreeMap<String, Vec<i32>>;

/// 查询可花费输出的能力
pub trait SpendableOutputs {
    /// 为公钥哈希选出未花费的输出，使其总额尽量达到 `amount`
    ///
    /// # 返回值
    ///
    /// 返回 (累计金额, 选中的输出)。累计金额可能小于 `amount`，由调用方判断是否足够。
    fn find_spendable_outputs(
        &self,
        pub_key_hash: &[u8],
        amount: u64,
    ) -> Result<(u64, SpendableSet), TransactionError>;
}

/// 按ID查找交易的能力
pub trait TransactionLookup {
    /// 查找交易，不存在时返回 `Ok(None)`
    fn find_transaction(&self, id: &[u8]) -> Result<Option<Transaction>, TransactionError>;

    /// 收集交易所有输入引用的之前交易
    ///
    /// 任一引用无法解析时返回 `UnresolvedReference`。Coinbase交易返回空集合。
    fn prior_transactions(
        &self,
        tx: &Transaction,
    ) -> Result<HashMap<String, Transaction>, TransactionError> {
        let mut prev_txs = HashMap::new();
        if tx.is_coinbase() {
            return Ok(prev_txs);
        }

        for input in &tx.inputs {
            let txid = hex::encode(&input.txid);
            if prev_txs.contains_key(&txid) {
                continue;
            }
            let prev_tx = self
                .find_transaction(&input.txid)?
                .ok_or_else(|| TransactionError::UnresolvedReference(txid.clone()))?;
            prev_txs.insert(txid, prev_tx);
        }
        Ok(prev_txs)
    }
}

/// 内存账本，按接收顺序保存已接受的交易
pub struct MemoryLedger {
    transactions: Vec<Transaction>,
    index: HashMap<String, usize>,
    pub config: Config,
}

impl MemoryLedger {
    pub fn new(config: Config) -> Self {
        MemoryLedger {
            transactions: Vec::new(),
            index: HashMap::new(),
            config,
        }
    }

    /// 创建账本并向 `address` 发行一笔创世Coinbase交易
    pub fn with_genesis(address: &str, config: Config) -> Result<Self, TransactionError> {
        let mut ledger = Self::new(config);
        let genesis = builder::coinbase_tx(address, "", ledger.config.subsidy)?;
        ledger.add_transaction(genesis)?;
        Ok(ledger)
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// 验证交易并加入账本
    ///
    /// 签名无效或ID重复的交易会被拒绝。
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<(), TransactionError> {
        let id = tx.id_hex();
        if tx.id.is_empty() || self.index.contains_key(&id) {
            warn!("rejecting transaction with empty or duplicate id {}", id);
            return Err(TransactionError::Rejected(format!("duplicate id {}", id)));
        }
        if !self.verify_transaction(&tx)? {
            warn!("rejecting transaction {}: invalid signature", id);
            return Err(TransactionError::Rejected(format!(
                "invalid signature in {}",
                id
            )));
        }

        info!(
            "accepted transaction {} ({} inputs, {} outputs)",
            id,
            tx.inputs.len(),
            tx.outputs.len()
        );
        self.index.insert(id, self.transactions.len());
        self.transactions.push(tx);
        Ok(())
    }

    /// 从账本收集之前交易后签名
    pub fn sign_transaction(
        &self,
        tx: &mut Transaction,
        private_key: &SecretKey,
    ) -> Result<(), TransactionError> {
        let prev_txs = self.prior_transactions(tx)?;
        tx.sign(private_key, &prev_txs)
    }

    /// 从账本收集之前交易后验证
    pub fn verify_transaction(&self, tx: &Transaction) -> Result<bool, TransactionError> {
        let prev_txs = self.prior_transactions(tx)?;
        tx.verify(&prev_txs)
    }

    /// 已被花费的输出：十六进制交易ID -> 输出索引
    fn spent_outputs(&self, pub_key_hash: &[u8]) -> HashMap<String, Vec<i32>> {
        let mut spent: HashMap<String, Vec<i32>> = HashMap::new();
        for tx in self.transactions.iter().filter(|tx| !tx.is_coinbase()) {
            for input in tx.inputs.iter().filter(|input| input.uses_key(pub_key_hash)) {
                spent
                    .entry(hex::encode(&input.txid))
                    .or_default()
                    .push(input.out);
            }
        }
        spent
    }

    /// 按账本顺序列出锁定到公钥哈希的未花费输出：(交易ID, 输出索引, 输出)
    fn unspent_outputs(&self, pub_key_hash: &[u8]) -> Vec<(String, i32, &TxOutput)> {
        let spent = self.spent_outputs(pub_key_hash);
        let mut unspent = Vec::new();

        for tx in &self.transactions {
            let txid = tx.id_hex();
            let spent_here = spent.get(&txid);
            for (index, output) in tx.outputs.iter().enumerate() {
                let Some(index) = output_index(index) else {
                    break;
                };
                if spent_here.is_some_and(|outs| outs.contains(&index)) {
                    continue;
                }
                if output.is_locked_with_key(pub_key_hash) {
                    unspent.push((txid.clone(), index, output));
                }
            }
        }
        unspent
    }

    /// 返回锁定到公钥哈希的所有未花费输出
    pub fn find_utxo(&self, pub_key_hash: &[u8]) -> Vec<TxOutput> {
        self.unspent_outputs(pub_key_hash)
            .into_iter()
            .map(|(_, _, output)| output.clone())
            .collect()
    }

    /// 计算地址余额
    ///
    /// 未花费输出总额超出 `u64` 时返回 `ValueOverflow`。
    pub fn balance(&self, address: &str) -> Result<u64, TransactionError> {
        let pub_key_hash = address::decode_address(address)?;
        self.find_utxo(&pub_key_hash)
            .iter()
            .try_fold(0u64, |total, out| total.checked_add(out.value))
            .ok_or(TransactionError::ValueOverflow)
    }
}

/// 输出位置转换为输入中使用的 `i32` 索引，超出范围时返回 `None`
fn output_index(position: usize) -> Option<i32> {
    i32::try_from(position).ok()
}

impl SpendableOutputs for MemoryLedger {
    fn find_spendable_outputs(
        &self,
        pub_key_hash: &[u8],
        amount: u64,
    ) -> Result<(u64, SpendableSet), TransactionError> {
        let mut accumulated = 0u64;
        let mut selected = SpendableSet::new();

        for (txid, index, output) in self.unspent_outputs(pub_key_hash) {
            if accumulated >= amount {
                break;
            }
            accumulated = accumulated
                .checked_add(output.value)
                .ok_or(TransactionError::ValueOverflow)?;
            selected.entry(txid).or_default().push(index);
        }
        Ok((accumulated, selected))
    }
}

impl TransactionLookup for MemoryLedger {
    fn find_transaction(&self, id: &[u8]) -> Result<Option<Transaction>, TransactionError> {
        Ok(self
            .index
            .get(&hex::encode(id))
            .map(|&position| self.transactions[position].clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_index_range() {
        assert_eq!(output_index(0), Some(0));
        assert_eq!(output_index(i32::MAX as usize), Some(i32::MAX));
        assert_eq!(output_index(i32::MAX as usize + 1), None);
        assert_eq!(output_index(usize::MAX), None);
    }
}
