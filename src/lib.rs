//! # UTXO账本交易核心
//!
//! 这是一个UTXO模型的交易核心库，负责交易的构建、哈希、签名和验证。
//!
//! ## 主要模块
//!
//! * `address` - 公钥哈希计算和Base58地址编解码
//! * `transaction` - 交易、交易输入和交易输出，以及签名和验证
//! * `builder` - 根据可花费输出组装转账交易和Coinbase交易
//! * `wallet` - 密钥对生成和钱包集合
//! * `ledger` - 外部账本能力接口和内存参考账本
//! * `config` - 运行时配置

pub mod address;
pub mod builder;
pub mod config;
pub mod ledger;
pub mod transaction;
pub mod wallet;
