use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal_macros::dec;
use tradepub_core::account::entity::{Account, TradeType};
use tradepub_core::common::{AccountNumber, SignalId, Ticket};
use tradepub_core::config::DatabaseConfig;
use tradepub_core::signal::entity::{
    AckOutcome, ClosePayload, ModifyPayload, NewSignal, OpenPayload, SignalCommand, SignalType,
};
use tradepub_core::store::error::StoreError;
use tradepub_core::store::port::{AccountStore, SignalStore};
use tradepub_store::SqliteStore;

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_772_000_000 + secs, 0).unwrap()
}

/// 直接读取信号行的 (processed, processed_at)，行不存在返回 None
async fn signal_state(store: &SqliteStore, id: SignalId) -> Option<(bool, Option<DateTime<Utc>>)> {
    sqlx::query_as("SELECT processed, processed_at FROM trade_signals WHERE id = ?")
        .bind(id.0)
        .fetch_optional(store.read_pool())
        .await
        .unwrap()
}

async fn setup() -> (tempfile::TempDir, SqliteStore) {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        path: dir.path().join("signals.db"),
        ..DatabaseConfig::default()
    };
    let store = SqliteStore::open(&config).await.unwrap();

    let mut tx = store.begin_sync().await.unwrap();
    for n in [1001, 2002] {
        tx.upsert_account(&Account {
            account_number: AccountNumber(n),
            server: "Broker-Demo".to_string(),
            balance: dec!(100),
            equity: dec!(100),
            margin: dec!(0),
            free_margin: dec!(100),
            last_update: ts(0),
            created_at: ts(0),
        })
        .await
        .unwrap();
    }
    tx.commit().await.unwrap();
    (dir, store)
}

fn close(account: i64, ticket: i64, at: i64) -> NewSignal {
    NewSignal {
        account_number: AccountNumber(account),
        command: SignalCommand::Close {
            ticket: Ticket(ticket),
            payload: ClosePayload::default(),
        },
        created_at: ts(at),
    }
}

#[tokio::test]
async fn test_pending_is_fifo_per_account() {
    let (_dir, store) = setup().await;

    let a = store.enqueue(&close(1001, 555, 0)).await.unwrap();
    let other = store.enqueue(&close(2002, 7, 1)).await.unwrap();
    let b = store
        .enqueue(&NewSignal {
            account_number: AccountNumber(1001),
            command: SignalCommand::Modify {
                ticket: Ticket(556),
                payload: ModifyPayload {
                    sl: Some(dec!(1.08)),
                    tp: None,
                },
            },
            created_at: ts(2),
        })
        .await
        .unwrap();
    let c = store
        .enqueue(&NewSignal {
            account_number: AccountNumber(1001),
            command: SignalCommand::Open(OpenPayload {
                symbol: "XAUUSD".to_string(),
                trade_type: TradeType::Sell,
                lots: dec!(0.10),
                price: None,
                sl: None,
                tp: Some(dec!(2300.5)),
                comment: Some("hedge".to_string()),
            }),
            created_at: ts(3),
        })
        .await
        .unwrap();

    assert!(a.id < other.id && other.id < b.id && b.id < c.id);

    let pending = store.pending(AccountNumber(1001)).await.unwrap();
    assert_eq!(
        pending.iter().map(|s| s.id).collect::<Vec<_>>(),
        vec![a.id, b.id, c.id]
    );
    assert_eq!(pending[1].command, b.command);
    assert_eq!(pending[2].command.signal_type(), SignalType::Open);
    assert_eq!(pending[2].command.ticket(), None);
    assert!(pending.iter().all(|s| !s.processed && s.processed_at.is_none()));

    assert_eq!(store.pending(AccountNumber(2002)).await.unwrap().len(), 1);
    assert!(store.pending(AccountNumber(9999)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_acknowledge_is_idempotent() {
    let (_dir, store) = setup().await;
    let first = store.enqueue(&close(1001, 555, 0)).await.unwrap();
    let second = store.enqueue(&close(1001, 556, 1)).await.unwrap();

    assert_eq!(
        store.acknowledge(first.id, ts(10)).await.unwrap(),
        AckOutcome::Acknowledged
    );
    assert_eq!(
        store.acknowledge(first.id, ts(20)).await.unwrap(),
        AckOutcome::AlreadyProcessed
    );
    assert_eq!(
        store.acknowledge(SignalId(424242), ts(20)).await.unwrap(),
        AckOutcome::Unknown
    );

    // 重复确认不改写首次确认时间
    assert_eq!(signal_state(&store, first.id).await, Some((true, Some(ts(10)))));

    let pending = store.pending(AccountNumber(1001)).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, second.id);
}

#[tokio::test]
async fn test_purge_only_removes_old_processed_signals() {
    let (_dir, store) = setup().await;
    let old = store.enqueue(&close(1001, 1, 0)).await.unwrap();
    let recent = store.enqueue(&close(1001, 2, 0)).await.unwrap();
    let waiting = store.enqueue(&close(1001, 3, 0)).await.unwrap();

    store.acknowledge(old.id, ts(100)).await.unwrap();
    store.acknowledge(recent.id, ts(500)).await.unwrap();

    let purged = store.purge_processed(ts(100) + Duration::seconds(1)).await.unwrap();
    assert_eq!(purged, 1);

    assert!(signal_state(&store, old.id).await.is_none());
    assert!(signal_state(&store, recent.id).await.is_some());
    assert_eq!(signal_state(&store, waiting.id).await, Some((false, None)));

    // 未处理信号无论多旧都保留
    assert_eq!(store.purge_processed(ts(100_000)).await.unwrap(), 1);
    assert_eq!(store.pending(AccountNumber(1001)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_signal_for_missing_account_is_rejected() {
    let (_dir, store) = setup().await;
    // 外键约束失败归类为 NotFound，而不是内部错误
    assert!(matches!(
        store.enqueue(&close(31337, 1, 0)).await,
        Err(StoreError::NotFound)
    ));
    assert!(store.pending(AccountNumber(31337)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_corrupt_rows_surface_as_errors() {
    let (_dir, store) = setup().await;
    let signal = store.enqueue(&close(1001, 1, 0)).await.unwrap();

    sqlx::query("UPDATE trade_signals SET signal_data = 'not json' WHERE id = ?")
        .bind(signal.id.0)
        .execute(store.read_pool())
        .await
        .unwrap();
    let err = store.pending(AccountNumber(1001)).await.unwrap_err();
    assert!(matches!(err, StoreError::Corrupt(_)));

    sqlx::query("UPDATE accounts SET balance = 'abc' WHERE account_number = 2002")
        .execute(store.read_pool())
        .await
        .unwrap();
    let err = store.get_account(AccountNumber(2002)).await.unwrap_err();
    assert!(matches!(err, StoreError::Corrupt(_)));
}
