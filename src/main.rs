//! # 交易核心演示程序
//!
//! 创建两个钱包，向第一个钱包发行创世Coinbase，然后转账给第二个钱包，
//! 最后打印交易内容和双方余额。日志级别通过 `RUST_LOG` 控制。

use anyhow::{Context, Result};

use utxo_ledger::builder;
use utxo_ledger::config::Config;
use utxo_ledger::ledger::MemoryLedger;
use utxo_ledger::wallet::Wallets;

fn main() -> Result<()> {
    env_logger::init();

    let config = Config::from_env().context("failed to load configuration")?;
    let (alice_balance, bob_balance) = run_demo(config)?;

    println!("Balance of Alice: {}", alice_balance);
    println!("Balance of Bob:   {}", bob_balance);
    Ok(())
}

/// 运行演示流程
///
/// # 返回值
///
/// 返回 (Alice余额, Bob余额)。发行量为0时跳过转账。
fn run_demo(config: Config) -> Result<(u64, u64)> {
    let mut wallets = Wallets::new();
    let alice = wallets.add_wallet();
    let bob = wallets.add_wallet();
    println!("Alice: {}", alice);
    println!("Bob:   {}", bob);

    let mut ledger = MemoryLedger::with_genesis(&alice, config)
        .context("failed to issue genesis coinbase")?;

    if ledger.config.subsidy == 0 {
        println!("Subsidy is zero, skipping payment");
    } else {
        let amount = ledger.config.subsidy.saturating_sub(1).max(1);
        let tx = builder::new_transaction(&alice, &bob, amount, &wallets, &ledger)
            .context("failed to build payment")?;
        println!("{}", tx);

        ledger.add_transaction(tx).context("ledger rejected payment")?;
    }

    Ok((ledger.balance(&alice)?, ledger.balance(&bob)?))
}
