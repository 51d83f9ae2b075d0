//! # 地址模块
//!
//! 提供公钥哈希、校验和以及人类可读地址的编码、解码和校验。
//!
//! 地址格式为 `Base58(版本字节 ‖ 公钥哈希 ‖ 4字节校验和)`。

use sha2::{Digest, Sha256};
use thiserror::Error;

/// 地址版本字节
pub const ADDRESS_VERSION: u8 = 0x00;
/// 校验和长度（字节）
pub const CHECKSUM_LENGTH: usize = 4;
/// 公钥哈希长度（字节）
pub const PUB_KEY_HASH_LENGTH: usize = 32;

const ADDRESS_PAYLOAD_LENGTH: usize = 1 + PUB_KEY_HASH_LENGTH + CHECKSUM_LENGTH;

/// 地址解析过程中可能出现的错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid base58 encoding: {0}")]
    InvalidEncoding(String),

    #[error("invalid address length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("unsupported address version: {0:#04x}")]
    UnsupportedVersion(u8),

    #[error("address checksum mismatch")]
    ChecksumMismatch,
}

fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut output = [0u8; 32];
    output.copy_from_slice(&second);
    output
}

/// 计算公钥哈希
///
/// 对公钥字节做两次SHA-256，返回32字节的锁定哈希。
pub fn public_key_hash(pub_key: &[u8]) -> Vec<u8> {
    double_sha256(pub_key).to_vec()
}

/// 计算载荷的校验和：两次SHA-256后取前4个字节
pub fn checksum(payload: &[u8]) -> Vec<u8> {
    double_sha256(payload)[..CHECKSUM_LENGTH].to_vec()
}

/// 将公钥哈希编码为地址
///
/// # 参数
///
/// * `pub_key_hash` - 公钥哈希
///
/// # 返回值
///
/// 返回Base58编码的地址字符串
pub fn encode_address(pub_key_hash: &[u8]) -> String {
    let mut payload = Vec::with_capacity(1 + pub_key_hash.len() + CHECKSUM_LENGTH);
    payload.push(ADDRESS_VERSION);
    payload.extend_from_slice(pub_key_hash);
    let sum = checksum(&payload);
    payload.extend_from_slice(&sum);
    bs58::encode(payload).into_string()
}

/// 将地址解码为公钥哈希
///
/// 去掉版本字节和尾部校验和，并重新计算校验和进行比对。
/// 任何格式错误都以 `AddressError` 返回，不会中止程序。
pub fn decode_address(address: &str) -> Result<Vec<u8>, AddressError> {
    let payload = bs58::decode(address)
        .into_vec()
        .map_err(|e| AddressError::InvalidEncoding(e.to_string()))?;

    if payload.len() != ADDRESS_PAYLOAD_LENGTH {
        return Err(AddressError::InvalidLength {
            expected: ADDRESS_PAYLOAD_LENGTH,
            actual: payload.len(),
        });
    }

    let (versioned, actual_checksum) = payload.split_at(payload.len() - CHECKSUM_LENGTH);
    if checksum(versioned) != actual_checksum {
        return Err(AddressError::ChecksumMismatch);
    }

    let version = versioned[0];
    if version != ADDRESS_VERSION {
        return Err(AddressError::UnsupportedVersion(version));
    }

    Ok(versioned[1..].to_vec())
}

/// 校验地址是否有效
///
/// 无效的Base58字符、长度错误或校验和不匹配都返回 `false`。
pub fn validate_address(address: &str) -> bool {
    decode_address(address).is_ok()
}
