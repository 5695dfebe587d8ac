//! # 分层配置加载
//!
//! 优先级从低到高：内置默认值 → `config/default.toml` → `config/local.toml`
//! → `TRADEPUB__SECTION__KEY` 环境变量 → 部署脚本沿用的 `API_KEY` / `PORT` / `DB_PATH`。

use std::collections::HashMap;
use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use tradepub_core::config::AppConfig;

/// 部署脚本沿用的扁平环境变量与配置键的对应关系
const PLAIN_OVERRIDES: [(&str, &str); 3] = [
    ("API_KEY", "server.api_key"),
    ("PORT", "server.port"),
    ("DB_PATH", "database.path"),
];

/// 从进程环境加载配置
pub fn load_config(config_dir: &Path) -> Result<AppConfig, ConfigError> {
    let vars: HashMap<String, String> = std::env::vars().collect();
    load_config_from(config_dir, &vars)
}

/// # Summary
/// 按分层顺序合并配置源并反序列化为 `AppConfig`。
///
/// # Arguments
/// * `config_dir` - 存放 `default.toml` / `local.toml` 的目录，文件均可缺省。
/// * `vars` - 环境变量快照。
///
/// # Returns
/// 合并后的配置。`server.api_key` 为空时返回错误，服务不允许无鉴权启动。
pub fn load_config_from(
    config_dir: &Path,
    vars: &HashMap<String, String>,
) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder()
        .add_source(File::from(config_dir.join("default.toml")).required(false))
        .add_source(File::from(config_dir.join("local.toml")).required(false))
        .add_source(
            Environment::with_prefix("TRADEPUB")
                .prefix_separator("__")
                .separator("__")
                .source(Some(vars.clone())),
        );

    for (var, key) in PLAIN_OVERRIDES {
        if let Some(value) = vars.get(var).filter(|v| !v.trim().is_empty()) {
            builder = builder.set_override(key, value.trim())?;
        }
    }

    let config: AppConfig = builder.build()?.try_deserialize()?;

    if config.server.api_key.trim().is_empty() {
        return Err(ConfigError::Message(
            "server.api_key is empty; set API_KEY or TRADEPUB__SERVER__API_KEY".to_string(),
        ));
    }
    Ok(config)
}
