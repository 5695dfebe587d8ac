use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};
use tradepub_core::config::LogConfig;

/// 文件日志的后台写线程守卫，进程退出前必须保持存活
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// # Summary
/// 安装全局 tracing 订阅者。
///
/// # Logic
/// 1. `RUST_LOG` 存在时优先使用，否则使用 `log.level`。
/// 2. 始终输出到 stdout。
/// 3. 配置了 `log.dir` 时额外按天滚动写入 `tradepub.log`。
pub fn init_tracing(config: &LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)?,
    };

    let file_layer = match &config.dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, "tradepub.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            if FILE_GUARD.set(guard).is_err() {
                return Err("tracing already initialised".into());
            }
            Some(fmt::layer().with_ansi(false).with_writer(writer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()?;

    Ok(())
}
