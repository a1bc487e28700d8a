//! SteamClient 集成测试
//!
//! 在本地端口启动一个 axum 服务模拟 Steam Web API，验证重试与错误分类。

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;

use match_ticker::error::TickerError;
use match_ticker::model::SteamId;
use match_ticker::upstream::{MatchSource, SteamClient};
use ticker_shared::config::UpstreamConfig;

/// 模拟服务的行为
#[derive(Clone, Copy)]
enum Behavior {
    /// 前 n 次返回 503，之后正常
    UnavailableTimes(u32),
    Status(u16),
    Malformed,
}

#[derive(Clone)]
struct MockSteam {
    behavior: Behavior,
    calls: Arc<AtomicU32>,
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    key: String,
    account_id: u64,
    matches_requested: u32,
}

async fn history(State(state): State<MockSteam>, Query(query): Query<HistoryQuery>) -> Response {
    let call = state.calls.fetch_add(1, Ordering::SeqCst);
    assert_eq!(query.key, "test-key");
    assert_eq!(query.matches_requested, 1);

    match state.behavior {
        Behavior::UnavailableTimes(n) if call < n => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        Behavior::Status(code) => StatusCode::from_u16(code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response(),
        Behavior::Malformed => "<html>not json</html>".into_response(),
        Behavior::UnavailableTimes(_) => Json(json!({
            "result": {
                "status": 1,
                "num_results": 1,
                "matches": [{"match_id": 7_001, "match_seq_num": query.account_id % 1_000}]
            }
        }))
        .into_response(),
    }
}

async fn details(State(state): State<MockSteam>) -> Response {
    state.calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({"result": {"error": "Match ID not found"}})).into_response()
}

async fn spawn_mock(behavior: Behavior) -> (String, Arc<AtomicU32>) {
    let calls = Arc::new(AtomicU32::new(0));
    let state = MockSteam {
        behavior,
        calls: calls.clone(),
    };
    let app = Router::new()
        .route("/IDOTA2Match_570/GetMatchHistory/V001/", get(history))
        .route("/IDOTA2Match_570/GetMatchDetails/V001/", get(details))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), calls)
}

fn client(base_url: String, max_retries: u32) -> SteamClient {
    SteamClient::new(&UpstreamConfig {
        base_url,
        api_key: "test-key".to_string(),
        timeout_ms: 2_000,
        max_retries,
        retry_delay_ms: 10,
    })
    .unwrap()
}

fn identity() -> SteamId {
    SteamId::from_account_id(39_734_273)
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let (base_url, calls) = spawn_mock(Behavior::UnavailableTimes(2)).await;

    let summary = client(base_url, 2)
        .latest_match(identity())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(summary.match_id, 7_001);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn retries_are_bounded() {
    let (base_url, calls) = spawn_mock(Behavior::UnavailableTimes(10)).await;

    let result = client(base_url, 2).latest_match(identity()).await;
    assert!(matches!(result, Err(TickerError::UpstreamUnavailable { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn throttling_is_transient() {
    let (base_url, calls) = spawn_mock(Behavior::Status(429)).await;

    let result = client(base_url, 1).latest_match(identity()).await;
    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let (base_url, calls) = spawn_mock(Behavior::Status(403)).await;

    let result = client(base_url, 3).latest_match(identity()).await;
    assert!(matches!(result, Err(TickerError::UpstreamUnavailable { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn malformed_body_is_not_retried() {
    let (base_url, calls) = spawn_mock(Behavior::Malformed).await;

    let result = client(base_url, 3).latest_match(identity()).await;
    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn detail_error_payload_is_permanent() {
    let (base_url, calls) = spawn_mock(Behavior::UnavailableTimes(0)).await;

    let result = client(base_url, 3).match_details(1).await;
    assert!(matches!(result, Err(TickerError::UpstreamUnavailable { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn connection_refused_surfaces_as_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = client(format!("http://{addr}"), 1)
        .latest_match(identity())
        .await;
    assert!(matches!(result, Err(TickerError::UpstreamUnavailable { .. })));
}
