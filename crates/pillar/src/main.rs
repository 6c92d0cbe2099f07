//! Pillar 服务入口
//!
//! # 使用方法
//! ```bash
//! # 使用配置文件启动
//! cargo run --bin pillar -- pillar.json
//!
//! # 覆盖监听地址
//! cargo run --bin pillar -- pillar.json 0.0.0.0:50060
//!
//! # 日志级别
//! RUST_LOG=debug cargo run --bin pillar -- pillar.json
//! ```

use anyhow::{anyhow, Context};
use pillar::bus::ChannelMessageBus;
use pillar::{service, Pillar};
use std::sync::Arc;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 第一个参数：配置文件路径（默认 pillar.json）
    let args: Vec<String> = std::env::args().collect();
    let settings_path = args.get(1).map(String::as_str).unwrap_or("pillar.json");

    let settings = bit_preservation::load_settings(settings_path)
        .map_err(|e| anyhow!("cannot load {}: {}", settings_path, e))?;
    let mut settings = bit_preservation::initialize(settings).map_err(|e| anyhow!("{}", e))?;

    // 第二个参数：监听地址
    if let Some(addr) = args.get(2) {
        settings.listen_addr = addr.clone();
    }
    let listen_addr = settings.listen_addr.clone();

    let (sender, receiver) = mpsc::unbounded_channel();
    let pillar = Pillar::new(settings, Arc::new(ChannelMessageBus::new(sender)))
        .context("failed to start pillar")?;

    service::run(pillar, receiver, &listen_addr).await?;
    Ok(())
}
