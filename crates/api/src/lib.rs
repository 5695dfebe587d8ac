//! # `tradepub-api` - HTTP API 网关
//!
//! 交易终端状态同步服务的 HTTP/REST 入口。
//! 使用 `axum` 构建路由与控制器，通过 `utoipa` 自动生成 OpenAPI 3.0 Swagger 文档。
//!
//! ## 架构职责
//! - 接收终端推送的账户快照并交给 `Reconciler` 对账
//! - 对除健康检查外的所有接口执行静态 Bearer Token 校验
//! - 将领域错误映射为带 `kind` 的 JSON 错误响应

pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod types;
