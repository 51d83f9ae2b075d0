use std::collections::HashMap;

use secp256k1::{PublicKey, Secp256k1, SecretKey};

use crate::address;

/// 钱包能力接口：按地址取出公钥和私钥
pub trait KeyStore {
    /// 返回地址对应的原始公钥（X ‖ Y）
    fn public_key(&self, address: &str) -> Option<Vec<u8>>;
    /// 返回地址对应的私钥
    fn private_key(&self, address: &str) -> Option<SecretKey>;
}

/// 生成新的密钥对，公钥以X和Y坐标拼接的64字节表示
pub fn new_key_pair() -> (SecretKey, Vec<u8>) {
    let secp = Secp256k1::new();
    let mut rng = rand::thread_rng();
    let (secret_key, public_key) = secp.generate_keypair(&mut rng);
    (secret_key, encode_public_key(&public_key))
}

/// 去掉未压缩编码的0x04前缀，得到 X ‖ Y
fn encode_public_key(public_key: &PublicKey) -> Vec<u8> {
    public_key.serialize_uncompressed()[1..].to_vec()
}

pub struct Wallet {
    pub private_key: SecretKey,
    pub public_key: Vec<u8>,
    pub address: String,
}

impl Wallet {
    pub fn new() -> Self {
        let (private_key, public_key) = new_key_pair();
        Self::with_keys(private_key, public_key)
    }

    /// 从已有私钥恢复钱包
    pub fn from_secret_key(private_key: SecretKey) -> Self {
        let secp = Secp256k1::signing_only();
        let public_key = encode_public_key(&PublicKey::from_secret_key(&secp, &private_key));
        Self::with_keys(private_key, public_key)
    }

    fn with_keys(private_key: SecretKey, public_key: Vec<u8>) -> Self {
        let address = address::encode_address(&address::public_key_hash(&public_key));
        Wallet {
            private_key,
            public_key,
            address,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn pub_key_hash(&self) -> Vec<u8> {
        address::public_key_hash(&self.public_key)
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

/// 内存中的钱包集合，以地址为键
#[derive(Default)]
pub struct Wallets {
    wallets: HashMap<String, Wallet>,
}

impl Wallets {
    pub fn new() -> Self {
        Self::default()
    }

    /// 生成新钱包并加入集合
    ///
    /// # 返回值
    ///
    /// 返回新钱包的地址
    pub fn add_wallet(&mut self) -> String {
        self.insert(Wallet::new())
    }

    /// 加入一个已有钱包，返回其地址
    pub fn insert(&mut self, wallet: Wallet) -> String {
        let address = wallet.address.clone();
        self.wallets.insert(address.clone(), wallet);
        address
    }

    pub fn get_wallet(&self, address: &str) -> Option<&Wallet> {
        self.wallets.get(address)
    }

    /// 按字典序返回所有地址
    pub fn addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self.wallets.keys().cloned().collect();
        addresses.sort();
        addresses
    }
}

impl KeyStore for Wallets {
    fn public_key(&self, address: &str) -> Option<Vec<u8>> {
        self.get_wallet(address).map(|w| w.public_key.clone())
    }

    fn private_key(&self, address: &str) -> Option<SecretKey> {
        self.get_wallet(address).map(|w| w.private_key)
    }
}
