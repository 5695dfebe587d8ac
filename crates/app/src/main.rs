use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};
use tradepub_api::server::{AppState, start_server};
use tradepub_core::common::time::{RealTimeProvider, TimeProvider};
use tradepub_store::SqliteStore;
use tradepub_sync::{Reconciler, SignalQueue};

mod settings;
mod telemetry;

/// # Summary
/// 应用启动入口，纯粹的 DI 容器。
/// 负责实例化所有具体实现组件并通过 Arc<dyn Trait> 注入到对账引擎与信号队列。
///
/// # Logic
/// 1. 读取 `.env` 并加载分层配置。
/// 2. 初始化全局日志。
/// 3. 打开 SQLite 存储。
/// 4. 构造对账引擎与信号队列。
/// 5. 启动 HTTP 服务，收到 Ctrl-C 后优雅退出并关闭连接池。
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. 加载配置
    let dotenv = dotenvy::dotenv();
    let config = Arc::new(settings::load_config(Path::new("config"))?);

    // 2. 初始化日志
    telemetry::init_tracing(&config.log)?;
    if let Err(e) = dotenv
        && !e.not_found()
    {
        warn!("Failed to read .env: {}", e);
    }
    info!("Trade Publisher starting...");

    // 3. 实例化基础设施层
    let store = Arc::new(SqliteStore::open(&config.database).await?);
    let clock: Arc<dyn TimeProvider> = Arc::new(RealTimeProvider);

    // 4. 构造应用服务层
    let reconciler = Arc::new(Reconciler::new(store.clone(), clock.clone(), &config.sync));
    let queue = Arc::new(SignalQueue::new(store.clone(), store.clone(), clock.clone()));

    let state = AppState {
        reconciler,
        queue,
        accounts: store.clone(),
        clock,
        config: config.clone(),
    };

    // 5. 挂起直到外部退出信号
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Shutdown signal received. Exiting...");
    };
    start_server(state, &config.server.bind_addr(), shutdown).await?;

    store.close().await;
    Ok(())
}
