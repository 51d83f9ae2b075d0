//! # 配置模块
//!
//! 账本运行参数。默认值可以通过环境变量覆盖。

use std::env;

use thiserror::Error;

/// Coinbase交易默认发行量
pub const DEFAULT_SUBSIDY: u64 = 100;

const SUBSIDY_ENV: &str = "LEDGER_SUBSIDY";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// 每笔Coinbase交易发行的金额
    pub subsidy: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            subsidy: DEFAULT_SUBSIDY,
        }
    }
}

impl Config {
    /// 从环境变量读取配置，未设置的项使用默认值
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();
        if let Some(value) = lookup(SUBSIDY_ENV) {
            config.subsidy = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: SUBSIDY_ENV.to_string(),
                value,
            })?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.subsidy, 100);
    }

    #[test]
    fn test_subsidy_override() {
        let config = Config::from_lookup(|_| Some(" 250 ".to_string())).unwrap();
        assert_eq!(config.subsidy, 250);
    }

    #[test]
    fn test_invalid_subsidy() {
        let err = Config::from_lookup(|_| Some("lots".to_string())).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: "LEDGER_SUBSIDY".to_string(),
                value: "lots".to_string(),
            }
        );
    }
}
