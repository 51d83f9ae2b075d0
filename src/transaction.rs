//! # 交易模块
//!
//! 定义交易、交易输入和交易输出，并实现交易的哈希、签名和验证。
//!
//! 签名的载荷是交易的"裁剪副本"：输入只保留引用的交易ID和输出索引，
//! 签名和公钥字段被清空。对每个输入签名时，临时把该输入的公钥字段设为
//! 被花费输出的锁定哈希，再对裁剪副本求哈希，这样每个签名只绑定一个被花费的输出。

use std::collections::HashMap;
use std::fmt;

use log::{debug, warn};
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::address::{self, AddressError};

/// Coinbase交易输入使用的输出索引
pub const COINBASE_OUT_INDEX: i32 = -1;
/// 紧凑签名长度：r和s各32字节
pub const SIGNATURE_LENGTH: usize = 64;
/// 公钥长度：X和Y坐标各32字节
pub const PUBLIC_KEY_LENGTH: usize = 64;

const UNCOMPRESSED_TAG: u8 = 0x04;

/// 交易构建、签名和验证过程中可能出现的错误
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("Previous transaction {0} could not be resolved")]
    UnresolvedReference(String),

    #[error("Previous transaction {txid} has no output at index {index}")]
    MissingOutput { txid: String, index: i32 },

    #[error("Malformed address: {0}")]
    MalformedAddress(#[from] AddressError),

    #[error("No wallet found for address {0}")]
    UnknownWallet(String),

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Transaction rejected: {0}")]
    Rejected(String),

    #[error("Value overflow while summing outputs")]
    ValueOverflow,

    #[error("Output lookup failed: {0}")]
    Lookup(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Crypto error: {0}")]
    Crypto(#[from] secp256k1::Error),
}

/// 交易输入，引用之前交易的某个输出
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// 被引用交易的ID，Coinbase交易为空
    pub txid: Vec<u8>,
    /// 被引用输出的索引，Coinbase交易为 -1
    pub out: i32,
    /// 签名（r ‖ s），签名前为空
    pub signature: Option<Vec<u8>>,
    /// 花费者的原始公钥（X ‖ Y）；Coinbase交易中存放任意数据
    pub pub_key: Vec<u8>,
}

/// 交易输出，锁定到某个公钥哈希
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// 输出金额（最小单位）
    pub value: u64,
    /// 锁定哈希，即所有者公钥的哈希
    pub pub_key_hash: Vec<u8>,
}

/// 交易结构
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// 交易ID，即清空ID字段后的内容哈希
    pub id: Vec<u8>,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl TxInput {
    /// 判断该输入携带的公钥是否对应给定的公钥哈希
    pub fn uses_key(&self, pub_key_hash: &[u8]) -> bool {
        address::public_key_hash(&self.pub_key) == pub_key_hash
    }
}

impl TxOutput {
    /// 创建一个新的输出并锁定到给定地址
    ///
    /// # 参数
    ///
    /// * `value` - 输出金额
    /// * `address` - 接收者地址
    ///
    /// # 返回值
    ///
    /// 地址格式错误时返回 `AddressError`
    pub fn new(value: u64, address: &str) -> Result<Self, AddressError> {
        let mut output = TxOutput {
            value,
            pub_key_hash: Vec::new(),
        };
        output.lock(address)?;
        Ok(output)
    }

    /// 将输出锁定到地址中嵌入的公钥哈希
    pub fn lock(&mut self, address: &str) -> Result<(), AddressError> {
        self.pub_key_hash = address::decode_address(address)?;
        Ok(())
    }

    pub fn is_locked_with_key(&self, pub_key_hash: &[u8]) -> bool {
        self.pub_key_hash == pub_key_hash
    }
}

impl Transaction {
    /// 创建新交易并计算其ID
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Result<Self, TransactionError> {
        let mut tx = Transaction {
            id: Vec::new(),
            inputs,
            outputs,
        };
        tx.set_id()?;
        Ok(tx)
    }

    /// 是否为Coinbase交易：恰好一个输入，引用ID为空且索引为 -1
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1
            && self.inputs[0].txid.is_empty()
            && self.inputs[0].out == COINBASE_OUT_INDEX
    }

    /// 计算交易的内容哈希
    ///
    /// 哈希前清空ID字段，因此结果与当前ID无关。
    pub fn hash(&self) -> Result<Vec<u8>, TransactionError> {
        let copy = Transaction {
            id: Vec::new(),
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
        };
        let encoded = serde_json::to_vec(&copy)?;
        Ok(Sha256::digest(&encoded).to_vec())
    }

    /// 重新计算并设置交易ID
    pub fn set_id(&mut self) -> Result<(), TransactionError> {
        self.id = self.hash()?;
        Ok(())
    }

    /// 十六进制表示的交易ID
    pub fn id_hex(&self) -> String {
        hex::encode(&self.id)
    }

    /// 构造用于签名的裁剪副本
    ///
    /// 输入只保留 (txid, out)，签名和公钥被清空；输出原样复制。
    pub fn trimmed_copy(&self) -> Transaction {
        let inputs = self
            .inputs
            .iter()
            .map(|input| TxInput {
                txid: input.txid.clone(),
                out: input.out,
                signature: None,
                pub_key: Vec::new(),
            })
            .collect();

        let outputs = self
            .outputs
            .iter()
            .map(|output| TxOutput {
                value: output.value,
                pub_key_hash: output.pub_key_hash.clone(),
            })
            .collect();

        Transaction {
            id: self.id.clone(),
            inputs,
            outputs,
        }
    }

    /// 对交易的每个输入签名
    ///
    /// # 参数
    ///
    /// * `private_key` - 花费者私钥
    /// * `prev_txs` - 被引用的之前交易，键为十六进制交易ID
    ///
    /// # 返回值
    ///
    /// 任一输入引用的交易或输出不存在时返回错误，此时交易不会被修改。
    /// Coinbase交易直接返回。
    pub fn sign(
        &mut self,
        private_key: &SecretKey,
        prev_txs: &HashMap<String, Transaction>,
    ) -> Result<(), TransactionError> {
        if self.is_coinbase() {
            return Ok(());
        }

        let locking_hashes = self.spent_locking_hashes(prev_txs)?;
        let secp = Secp256k1::signing_only();
        let mut trimmed = self.trimmed_copy();

        for (index, locking_hash) in locking_hashes.iter().enumerate() {
            let digest = trimmed.input_signing_hash(index, locking_hash)?;
            let message = Message::from_slice(&digest)?;
            let signature = secp.sign_ecdsa(&message, private_key);

            debug!(
                "signed input {} of {}: digest={}",
                index,
                self.id_hex(),
                hex::encode(&digest)
            );

            self.inputs[index].signature = Some(signature.serialize_compact().to_vec());
        }

        Ok(())
    }

    /// 验证交易的每个输入签名
    ///
    /// # 返回值
    ///
    /// 所有输入签名有效且公钥哈希与被花费输出的锁定哈希一致时返回 `Ok(true)`，
    /// 遇到第一个无效输入立即返回 `Ok(false)`。
    /// 引用的交易无法解析时返回错误。Coinbase交易总是有效。
    pub fn verify(&self, prev_txs: &HashMap<String, Transaction>) -> Result<bool, TransactionError> {
        if self.is_coinbase() {
            return Ok(true);
        }

        let locking_hashes = self.spent_locking_hashes(prev_txs)?;
        let secp = Secp256k1::verification_only();
        let mut trimmed = self.trimmed_copy();

        for (index, locking_hash) in locking_hashes.iter().enumerate() {
            let digest = trimmed.input_signing_hash(index, locking_hash)?;
            let message = Message::from_slice(&digest)?;
            let input = &self.inputs[index];

            if !input.uses_key(locking_hash) {
                warn!("input {} of {} does not own the output it spends", index, self.id_hex());
                return Ok(false);
            }

            let signature = match input.signature.as_deref().and_then(parse_signature) {
                Some(signature) => signature,
                None => {
                    warn!("input {} of {} has a missing or malformed signature", index, self.id_hex());
                    return Ok(false);
                }
            };

            let public_key = match parse_public_key(&input.pub_key) {
                Some(public_key) => public_key,
                None => {
                    warn!("input {} of {} has a malformed public key", index, self.id_hex());
                    return Ok(false);
                }
            };

            if secp.verify_ecdsa(&message, &signature, &public_key).is_err() {
                warn!("signature check failed for input {} of {}", index, self.id_hex());
                return Ok(false);
            }

            debug!("verified input {} of {}", index, self.id_hex());
        }

        Ok(true)
    }

    /// 以JSON格式序列化交易
    pub fn serialize(&self) -> Result<Vec<u8>, TransactionError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// 从JSON字节反序列化交易
    pub fn deserialize(data: &[u8]) -> Result<Self, TransactionError> {
        Ok(serde_json::from_slice(data)?)
    }

    /// 按输入顺序解析每个输入所花费输出的锁定哈希
    fn spent_locking_hashes(
        &self,
        prev_txs: &HashMap<String, Transaction>,
    ) -> Result<Vec<Vec<u8>>, TransactionError> {
        self.inputs
            .iter()
            .map(|input| {
                let txid = hex::encode(&input.txid);
                let prev_tx = prev_txs
                    .get(&txid)
                    .filter(|prev_tx| !prev_tx.id.is_empty())
                    .ok_or_else(|| TransactionError::UnresolvedReference(txid.clone()))?;

                usize::try_from(input.out)
                    .ok()
                    .and_then(|out| prev_tx.outputs.get(out))
                    .map(|output| output.pub_key_hash.clone())
                    .ok_or(TransactionError::MissingOutput {
                        txid,
                        index: input.out,
                    })
            })
            .collect()
    }

    /// 计算第 `index` 个输入的签名哈希
    ///
    /// 只能在裁剪副本上调用。返回前把公钥字段恢复为空，
    /// 保证下一个输入的载荷不受影响。
    fn input_signing_hash(
        &mut self,
        index: usize,
        locking_hash: &[u8],
    ) -> Result<Vec<u8>, TransactionError> {
        self.inputs[index].signature = None;
        self.inputs[index].pub_key = locking_hash.to_vec();
        let digest = self.hash();
        self.inputs[index].pub_key = Vec::new();
        digest
    }
}

fn parse_signature(bytes: &[u8]) -> Option<Signature> {
    if bytes.len() != SIGNATURE_LENGTH {
        return None;
    }
    Signature::from_compact(bytes).ok()
}

fn parse_public_key(bytes: &[u8]) -> Option<PublicKey> {
    if bytes.len() != PUBLIC_KEY_LENGTH {
        return None;
    }
    let mut encoded = Vec::with_capacity(PUBLIC_KEY_LENGTH + 1);
    encoded.push(UNCOMPRESSED_TAG);
    encoded.extend_from_slice(bytes);
    PublicKey::from_slice(&encoded).ok()
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Transaction {}:", self.id_hex())?;
        for (i, input) in self.inputs.iter().enumerate() {
            writeln!(f, "     Input {}:", i)?;
            writeln!(f, "       TXID:      {}", hex::encode(&input.txid))?;
            writeln!(f, "       Out:       {}", input.out)?;
            writeln!(
                f,
                "       Signature: {}",
                input.signature.as_deref().map(hex::encode).unwrap_or_default()
            )?;
            writeln!(f, "       PubKey:    {}", hex::encode(&input.pub_key))?;
        }
        for (i, output) in self.outputs.iter().enumerate() {
            writeln!(f, "     Output {}:", i)?;
            writeln!(f, "       Value:  {}", output.value)?;
            writeln!(f, "       Script: {}", hex::encode(&output.pub_key_hash))?;
        }
        Ok(())
    }
}
