use chrono::{DateTime, TimeZone, Utc};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::sync::{Arc, Once};
use tokio::net::TcpListener;
use tradepub_api::server::{AppState, build_router};
use tradepub_core::common::time::FakeClockProvider;
use tradepub_core::config::{AppConfig, DatabaseConfig};
use tradepub_store::SqliteStore;
use tradepub_sync::{Reconciler, SignalQueue};

const API_KEY: &str = "test-api-key";

static CRYPTO_PROVIDER: Once = Once::new();

/// reqwest 以 rustls-no-provider 构建，需在创建 Client 前安装进程级加密实现
fn install_crypto_provider() {
    CRYPTO_PROVIDER.call_once(|| {
        rustls::crypto::ring::default_provider()
            .install_default()
            .expect("Failed to install rustls crypto provider");
    });
}

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_772_000_000 + secs, 0).unwrap()
}

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    clock: Arc<FakeClockProvider>,
    _dir: tempfile::TempDir,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let res = self
            .client
            .get(self.url(path))
            .bearer_auth(API_KEY)
            .send()
            .await
            .unwrap();
        (res.status(), res.json().await.unwrap())
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .client
            .post(self.url(path))
            .bearer_auth(API_KEY)
            .json(&body)
            .send()
            .await
            .unwrap();
        (res.status(), res.json().await.unwrap())
    }

    async fn delete(&self, path: &str) -> (StatusCode, Value) {
        let res = self
            .client
            .delete(self.url(path))
            .bearer_auth(API_KEY)
            .send()
            .await
            .unwrap();
        (res.status(), res.json().await.unwrap())
    }
}

// 帮助函数：在随机端口启动测试服务器
async fn spawn_test_server() -> TestServer {
    install_crypto_provider();
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut config = AppConfig::default();
    config.server.api_key = API_KEY.to_string();
    config.database = DatabaseConfig {
        path: dir.path().join("api.db"),
        ..DatabaseConfig::default()
    };

    let store = Arc::new(SqliteStore::open(&config.database).await.unwrap());
    let clock = Arc::new(FakeClockProvider::new(ts(0)));

    let state = AppState {
        reconciler: Arc::new(Reconciler::new(store.clone(), clock.clone(), &config.sync)),
        queue: Arc::new(SignalQueue::new(store.clone(), store.clone(), clock.clone())),
        accounts: store,
        clock: clock.clone(),
        config: Arc::new(config),
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let app = build_router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base_url: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
        clock,
        _dir: dir,
    }
}

fn trade(ticket: i64, open_secs: i64) -> Value {
    json!({
        "ticket": ticket,
        "symbol": "EURUSD",
        "type": 0,
        "lots": 1.0,
        "open_price": 1.085,
        "open_time": ts(open_secs).timestamp(),
        "profit": 12.5,
    })
}

fn snapshot(account: i64, at: i64, balance: f64, trades: Vec<Value>) -> Value {
    json!({
        "account": account,
        "server": "Broker-Live01",
        "balance": balance,
        "equity": balance,
        "margin": 0.0,
        "free_margin": balance,
        "timestamp": ts(at).timestamp(),
        "trades": trades,
    })
}

#[tokio::test]
async fn test_auth_rejections() {
    let server = spawn_test_server().await;

    // 缺少 Authorization
    let res = server
        .client
        .get(server.url("/api/accounts"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["kind"], "auth");

    // 错误的 Token
    let res = server
        .client
        .post(server.url("/api/trades"))
        .bearer_auth("wrong-key")
        .json(&snapshot(1001, 0, 10000.0, vec![]))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // 非 Bearer 格式
    let res = server
        .client
        .get(server.url("/api/accounts"))
        .header("Authorization", API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // 被拒绝的快照不应落库
    let (status, body) = server.get("/api/accounts").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 0);
}

#[tokio::test]
async fn test_public_endpoints_need_no_token() {
    let server = spawn_test_server().await;

    let res = server.client.get(server.url("/api/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["database"], "connected");
    assert_eq!(body["data"]["timestamp"], ts(0).timestamp());

    let res = server.client.get(server.url("/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["service"], "Trade Publisher API");
    assert_eq!(body["data"]["status"], "running");
    assert!(body["data"]["endpoints"]["publish_trades"].is_string());

    let res = server
        .client
        .get(server.url("/api-docs/openapi.json"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_snapshot_close_detection_flow() {
    let server = spawn_test_server().await;

    let (status, body) = server
        .post(
            "/api/trades",
            snapshot(1001, 0, 10000.0, vec![trade(555, -120), trade(556, -60)]),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["created_account"], true);
    assert_eq!(body["data"]["inserted"], 2);

    // 555 从快照中消失，视为已平仓
    let (status, body) = server
        .post("/api/trades", snapshot(1001, 10, 10050.0, vec![trade(556, -60)]))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["created_account"], false);
    assert_eq!(body["data"]["closed"], 1);
    assert_eq!(body["data"]["closed_tickets"], json!([555]));
    assert_eq!(body["data"]["unchanged"], 1);

    let (status, body) = server.get("/api/trades/1001").await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["account"]["account_number"], 1001);
    assert_eq!(data["account"]["balance"], 10050.0);
    assert_eq!(data["account"]["last_update"], ts(10).timestamp());
    assert_eq!(data["trades_count"], 1);
    assert_eq!(data["trades"][0]["ticket"], 556);
    assert_eq!(data["trades"][0]["type"], 0);
    assert_eq!(data["trades"][0]["type_name"], "buy");
    assert_eq!(data["pagination"]["has_more"], false);

    // 平仓不产生任何信号
    let (_, body) = server.get("/api/signals/1001").await;
    assert_eq!(body["data"]["count"], 0);

    let (_, body) = server.get("/api/accounts").await;
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["accounts"][0]["account_number"], 1001);
    assert_eq!(body["data"]["accounts"][0]["trades_count"], 1);
}

#[tokio::test]
async fn test_trades_pagination() {
    let server = spawn_test_server().await;

    let trades = (1..=5).map(|i| trade(100 + i, i)).collect();
    let (status, _) = server
        .post("/api/trades", snapshot(2002, 10, 500.0, trades))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = server.get("/api/trades/2002?limit=2").await;
    let data = &body["data"];
    assert_eq!(data["trades_count"], 2);
    // open_time 倒序
    assert_eq!(data["trades"][0]["ticket"], 105);
    assert_eq!(data["trades"][1]["ticket"], 104);
    assert_eq!(data["pagination"]["has_more"], true);

    let (_, body) = server.get("/api/trades/2002?limit=2&offset=4").await;
    let data = &body["data"];
    assert_eq!(data["trades_count"], 1);
    assert_eq!(data["trades"][0]["ticket"], 101);
    assert_eq!(data["pagination"]["offset"], 4);
    assert_eq!(data["pagination"]["has_more"], false);

    let (status, body) = server.get("/api/trades/2002?limit=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
}

#[tokio::test]
async fn test_close_signal_round_trip() {
    let server = spawn_test_server().await;
    server
        .post("/api/trades", snapshot(1001, 0, 10000.0, vec![trade(555, -60)]))
        .await;

    let (status, body) = server.post("/api/trades/1001/close/555", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let signal_id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["signal_type"], "CLOSE");
    assert_eq!(body["data"]["ticket"], 555);
    assert_eq!(body["data"]["processed"], false);

    let (_, body) = server.get("/api/signals/1001").await;
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["signals"][0]["id"], signal_id);
    assert_eq!(body["data"]["signals"][0]["created_at"], ts(0).timestamp());

    let (status, body) = server
        .post(&format!("/api/signals/{}/processed", signal_id), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "acknowledged");

    let (_, body) = server.get("/api/signals/1001").await;
    assert_eq!(body["data"]["count"], 0);

    // 重复确认与未知 id 均为 200
    let (status, body) = server
        .post(&format!("/api/signals/{}/processed", signal_id), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "already_processed");

    let (status, body) = server.post("/api/signals/9999/processed", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "unknown");
}

#[tokio::test]
async fn test_enqueue_generic_signals() {
    let server = spawn_test_server().await;
    server
        .post("/api/trades", snapshot(1001, 0, 10000.0, vec![trade(555, -60)]))
        .await;

    let (status, body) = server
        .post(
            "/api/signals",
            json!({
                "account_number": 1001,
                "signal_type": "MODIFY",
                "ticket": 555,
                "signal_data": { "sl": 1.08, "tp": 1.10 },
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["signal_type"], "MODIFY");

    let (status, body) = server
        .post(
            "/api/signals",
            json!({
                "account": 1001,
                "signal_type": "open",
                "signal_data": { "symbol": "GBPUSD", "type": 1, "lots": 0.5 },
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["signal_type"], "OPEN");
    assert!(body["data"]["ticket"].is_null());

    let (_, body) = server.get("/api/signals/1001").await;
    assert_eq!(body["data"]["count"], 2);
    assert_eq!(body["data"]["signals"][0]["signal_type"], "MODIFY");
    assert_eq!(body["data"]["signals"][1]["signal_type"], "OPEN");

    // 未知类型 / MODIFY 缺少 sl 与 tp
    let (status, body) = server
        .post(
            "/api/signals",
            json!({ "account_number": 1001, "signal_type": "HEDGE", "ticket": 555 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, _) = server
        .post(
            "/api/signals",
            json!({ "account_number": 1001, "signal_type": "MODIFY", "ticket": 555 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // 引用不存在的持仓
    let (status, body) = server
        .post(
            "/api/signals",
            json!({ "account_number": 1001, "signal_type": "CLOSE", "ticket": 777 }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn test_stale_and_malformed_snapshots() {
    let server = spawn_test_server().await;
    server
        .post("/api/trades", snapshot(1001, 100, 10000.0, vec![trade(555, -60)]))
        .await;

    let (status, body) = server
        .post("/api/trades", snapshot(1001, 50, 1.0, vec![]))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");

    // 旧快照不应改变任何状态
    let (_, body) = server.get("/api/trades/1001").await;
    assert_eq!(body["data"]["account"]["balance"], 10000.0);
    assert_eq!(body["data"]["trades_count"], 1);

    let res = server
        .client
        .post(server.url("/api/trades"))
        .bearer_auth(API_KEY)
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["kind"], "validation");

    let (status, body) = server
        .post("/api/trades", json!({ "account": 1001, "timestamp": ts(200).timestamp() }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("server"));

    let (status, body) = server
        .post(
            "/api/trades",
            snapshot(1001, 200, 1.0, vec![json!({ "ticket": 9, "symbol": "X", "type": 9 })]),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("trades[0].type"));
}

#[tokio::test]
async fn test_not_found_responses() {
    let server = spawn_test_server().await;

    let (status, body) = server.get("/api/trades/4242").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");

    let (status, _) = server.post("/api/trades/4242/close/1", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = server.delete("/api/accounts/4242").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = server.get("/api/no-such-endpoint").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Endpoint not found");

    // 未知账户的信号列表为空
    let (status, body) = server.get("/api/signals/4242").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 0);
}

#[tokio::test]
async fn test_delete_account_and_purge() {
    let server = spawn_test_server().await;
    server
        .post("/api/trades", snapshot(1001, 0, 10000.0, vec![trade(555, -60)]))
        .await;
    server
        .post("/api/trades", snapshot(2002, 0, 500.0, vec![trade(777, -60)]))
        .await;

    let (_, body) = server.post("/api/trades/2002/close/777", json!({})).await;
    let processed_id = body["data"]["id"].as_i64().unwrap();
    server
        .post(&format!("/api/signals/{}/processed", processed_id), json!({}))
        .await;
    server.post("/api/trades/1001/close/555", json!({})).await;

    // 缺少 processed_before
    let (status, _) = server.delete("/api/signals").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    server.clock.set_time(ts(3600));
    let (status, body) = server
        .delete(&format!("/api/signals?processed_before={}", ts(60).timestamp()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["purged"], 1);

    // 待处理信号保留
    let (_, body) = server.get("/api/signals/1001").await;
    assert_eq!(body["data"]["count"], 1);

    let (status, body) = server.delete("/api/accounts/1001").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted"], true);

    let (status, _) = server.get("/api/trades/1001").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = server.get("/api/signals/1001").await;
    assert_eq!(body["data"]["count"], 0);

    let (_, body) = server.get("/api/accounts").await;
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["accounts"][0]["account_number"], 2002);
}

#[tokio::test]
async fn test_snapshot_without_trades_is_rejected() {
    let server = spawn_test_server().await;
    server
        .post(
            "/api/trades",
            snapshot(1001, 0, 10000.0, vec![trade(555, -120), trade(556, -60)]),
        )
        .await;

    let (status, body) = server
        .post(
            "/api/trades",
            json!({
                "account": 1001,
                "server": "Broker-Live01",
                "balance": 1.0,
                "timestamp": ts(10).timestamp(),
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
    assert!(body["error"].as_str().unwrap().contains("trades"));

    // 持仓与资金保持不变
    let (_, body) = server.get("/api/trades/1001").await;
    assert_eq!(body["data"]["trades_count"], 2);
    assert_eq!(body["data"]["account"]["balance"], 10000.0);
    assert_eq!(body["data"]["account"]["last_update"], ts(0).timestamp());

    // 显式空数组表示全部已平仓
    let (status, body) = server
        .post("/api/trades", snapshot(1001, 10, 10000.0, vec![]))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["closed_tickets"], json!([555, 556]));
}

#[tokio::test]
async fn test_out_of_range_timestamps_are_rejected() {
    let server = spawn_test_server().await;
    server
        .post("/api/trades", snapshot(1001, 0, 10000.0, vec![trade(555, -60)]))
        .await;

    // 10000 年
    let mut far_future = snapshot(3003, 0, 1.0, vec![]);
    far_future["timestamp"] = json!(253_402_300_800_i64);
    let (status, body) = server.post("/api/trades", far_future).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    // 毫秒时间戳
    let mut millis = snapshot(1001, 0, 1.0, vec![]);
    millis["timestamp"] = json!(ts(10).timestamp() * 1000);
    let (status, _) = server.post("/api/trades", millis).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // 在服务端时钟允许的偏差之外
    let (status, _) = server
        .post("/api/trades", snapshot(1001, 86_400 + 1, 1.0, vec![trade(555, -60)]))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = server.get("/api/accounts").await;
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["accounts"][0]["account_number"], 1001);

    // 账户未被锁死，正常快照继续生效
    let (status, _) = server
        .post("/api/trades", snapshot(1001, 20, 10020.0, vec![trade(555, -60)]))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = server
        .post(
            "/api/trades",
            snapshot(1001, 30, 1.0, vec![json!({ "ticket": 9, "symbol": "X", "open_time": 253_402_300_800_i64 })]),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server
        .delete(&format!("/api/signals?processed_before={}", 253_402_300_800_i64))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_trade_type_defaults_to_buy() {
    let server = spawn_test_server().await;
    let (status, _) = server
        .post(
            "/api/trades",
            snapshot(1001, 0, 1.0, vec![json!({ "ticket": 42, "symbol": "EURUSD" })]),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = server.get("/api/trades/1001").await;
    assert_eq!(body["data"]["trades"][0]["type"], 0);
    assert_eq!(body["data"]["trades"][0]["type_name"], "buy");
    assert_eq!(body["data"]["trades"][0]["open_time"], ts(0).timestamp());
}
