//! # API 服务启动器
//!
//! 组装 axum 路由、挂载 Swagger UI、配置 CORS 并绑定 TCP 端口对外提供服务。
//! 本模块不直接启动 `main()`, 而是由 `crates/app` 的 DI 容器持有并调用。

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;
use utoipa_swagger_ui::SwaggerUi;

use tradepub_core::common::time::TimeProvider;
use tradepub_core::config::AppConfig;
use tradepub_core::store::port::AccountStore;
use tradepub_sync::{Reconciler, SignalQueue};

use crate::error::ApiError;
use crate::routes::{account, health, signal, trade};

// ============================================================
//  共享应用状态
// ============================================================

/// 全局应用状态，通过 axum 的 `State` 提取器注入到每个 Handler 中。
///
/// # Invariants
/// - `reconciler` 是唯一写入账户与持仓的入口，同一账户的写操作由它串行化。
/// - `accounts` 仅用于只读查询与健康探测。
#[derive(Clone)]
pub struct AppState {
    /// 快照对账引擎
    pub reconciler: Arc<Reconciler>,
    /// 信号队列
    pub queue: Arc<SignalQueue>,
    /// 账户存储 (只读查询)
    pub accounts: Arc<dyn AccountStore>,
    /// 时间源
    pub clock: Arc<dyn TimeProvider>,
    /// 运行配置 (鉴权中间件读取 `server.api_key`)
    pub config: Arc<AppConfig>,
}

// ============================================================
//  OpenAPI 文档定义
// ============================================================

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Trade Publisher API",
        version = "0.1.0",
        description = "交易终端状态同步与信号下发服务。终端推送账户快照，运维方查询持仓并下发 CLOSE / MODIFY / OPEN 指令。",
        contact(name = "Tradepub Team"),
        license(name = "MIT")
    ),
    tags(
        (name = "运维 (Ops)", description = "服务描述与健康检查"),
        (name = "持仓 (Trades)", description = "快照上报、持仓查询与平仓"),
        (name = "账户 (Accounts)", description = "已知账户列表与删除"),
        (name = "信号 (Signals)", description = "指令信号的入队、轮询与确认")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// 为 OpenAPI 文档注入静态 Bearer Token 鉴权方案。
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);

        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .description(Some("填入部署时配置的 API Key（无需 'Bearer ' 前缀）"))
                    .build(),
            ),
        );
    }
}

// ============================================================
//  服务构建与启动
// ============================================================

/// 构建完整的 axum 应用路由树。
///
/// # Logic
/// 1. 服务描述与健康检查无需鉴权。
/// 2. 其余 `/api/*` 路由统一经过 Bearer Token 校验。
/// 3. 未匹配的路径返回 JSON 形式的 404。
pub fn build_router(state: AppState) -> Router {
    let public_router = OpenApiRouter::new()
        .routes(routes!(health::root))
        .routes(routes!(health::health));

    let protected_router = OpenApiRouter::new()
        .routes(routes!(trade::publish_trades))
        .routes(routes!(trade::get_trades))
        .routes(routes!(trade::close_trade))
        .routes(routes!(account::list_accounts))
        .routes(routes!(account::delete_account))
        .routes(routes!(signal::enqueue_signal, signal::purge_signals))
        .routes(routes!(signal::get_signals))
        .routes(routes!(signal::acknowledge_signal))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::auth::auth_middleware,
        ));

    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .merge(public_router)
        .merge(protected_router)
        .with_state(state)
        .split_for_parts();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api))
        .fallback(endpoint_not_found)
        .layer(cors)
}

async fn endpoint_not_found() -> ApiError {
    ApiError::NotFound("Endpoint not found".to_string())
}

/// 绑定端口并启动 HTTP 服务，直到 `shutdown` 完成后优雅退出。
///
/// # Arguments
/// * `state` - 由外部 DI 容器注入的共享状态
/// * `bind_addr` - 监听的地址与端口，如 `"0.0.0.0:5000"`
/// * `shutdown` - 完成时触发优雅停机 (通常为 Ctrl-C)
///
/// # Returns
/// 绑定失败或服务异常退出时返回错误。
pub async fn start_server<F>(
    state: AppState,
    bind_addr: &str,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Trade Publisher API listening on {}", bind_addr);
    tracing::info!("Swagger UI: http://{}/swagger-ui/", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("API server stopped");
    Ok(())
}
