//! Steam Web API 客户端
//!
//! 只用到 Dota 2 的两个接口：
//! - `GetMatchHistory`：账号最近一场比赛（`matches_requested=1`）
//! - `GetMatchDetails`：单场比赛详情
//!
//! 瞬时故障（5xx、429、超时、连接失败）按固定间隔有限重试；
//! 其余非 2xx 状态和无法解析的响应体不重试。两者最终都以
//! `TickerError::UpstreamUnavailable` 返回给调用方。

use std::fmt;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use ticker_shared::config::UpstreamConfig;
use ticker_shared::observability::metrics;
use ticker_shared::retry::{RetryPolicy, retry_with_policy};

use crate::error::TickerError;
use crate::model::{MatchDetails, MatchSummary, SteamId};

const GET_MATCH_HISTORY: &str = "GetMatchHistory";
const GET_MATCH_DETAILS: &str = "GetMatchDetails";

/// 比赛历史设为私密时 Steam 返回的状态码
const STATUS_PRIVATE_HISTORY: i64 = 15;

/// 比赛数据源
///
/// 轮询端只依赖此 trait，测试中以 mock 或脚本化实现替换。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MatchSource: Send + Sync {
    /// 账号最近一场比赛，没有可见比赛时返回 `None`
    async fn latest_match(&self, identity: SteamId) -> Result<Option<MatchSummary>, TickerError>;

    async fn match_details(&self, match_id: u64) -> Result<MatchDetails, TickerError>;
}

// ---------------------------------------------------------------------------
// 请求错误分类
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum RequestError {
    Transient(String),
    Permanent(String),
}

impl RequestError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    fn outcome(&self) -> &'static str {
        match self {
            Self::Transient(_) => "transient_error",
            Self::Permanent(_) => "permanent_error",
        }
    }

    fn into_reason(self) -> String {
        match self {
            Self::Transient(reason) | Self::Permanent(reason) => reason,
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            Self::Transient(err.to_string())
        } else {
            Self::Permanent(err.to_string())
        }
    }

    fn from_status(status: StatusCode) -> Option<Self> {
        if status.is_success() {
            None
        } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            Some(Self::Transient(format!("HTTP {status}")))
        } else {
            Some(Self::Permanent(format!("HTTP {status}")))
        }
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient(reason) => write!(f, "瞬时故障: {reason}"),
            Self::Permanent(reason) => write!(f, "永久故障: {reason}"),
        }
    }
}

// ---------------------------------------------------------------------------
// SteamClient
// ---------------------------------------------------------------------------

/// 基于 reqwest 的 Steam Web API 客户端
#[derive(Clone)]
pub struct SteamClient {
    client: Client,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
}

impl SteamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, TickerError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| TickerError::upstream("build_client", e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            retry: RetryPolicy::fixed(config.max_retries, config.retry_delay()),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/IDOTA2Match_570/{}/V001/", self.base_url, method)
    }

    /// 单次请求，不含重试
    async fn fetch_json(
        &self,
        operation: &str,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<Value, RequestError> {
        let result = self.try_fetch(operation, url, params).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.outcome(),
        };
        metrics::record_upstream_request(operation, outcome);
        result
    }

    async fn try_fetch(
        &self,
        operation: &str,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<Value, RequestError> {
        let response = self
            .client
            .get(url)
            .query(&[("key", self.api_key.as_str())])
            .query(params)
            .send()
            .await
            .map_err(RequestError::from_reqwest)?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::SERVICE_UNAVAILABLE {
            warn!(operation, status = status.as_u16(), "Steam API 返回异常状态码");
        }
        if let Some(err) = RequestError::from_status(status) {
            return Err(err);
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                RequestError::Transient(e.to_string())
            } else {
                RequestError::Permanent(format!("响应体无法解析: {e}"))
            }
        })
    }

    /// 带重试的请求，响应体交给 `parse` 转换
    async fn call<T>(
        &self,
        operation: &str,
        params: Vec<(&str, String)>,
        parse: impl Fn(&Value) -> Result<T, String>,
    ) -> Result<T, TickerError> {
        let url = self.endpoint(operation);
        let url = url.as_str();
        let params = params.as_slice();

        let body = retry_with_policy(&self.retry, operation, RequestError::is_transient, move || {
            self.fetch_json(operation, url, params)
        })
        .await
        .map_err(|e| TickerError::upstream(operation, e.into_reason()))?;

        parse(&body).map_err(|reason| {
            metrics::record_upstream_request(operation, "malformed");
            warn!(operation, reason = %reason, "Steam API 响应格式错误");
            TickerError::upstream(operation, reason)
        })
    }
}

#[async_trait]
impl MatchSource for SteamClient {
    #[instrument(skip(self), fields(account_id = identity.account_id()))]
    async fn latest_match(&self, identity: SteamId) -> Result<Option<MatchSummary>, TickerError> {
        let params = vec![
            ("account_id", identity.as_u64().to_string()),
            ("matches_requested", "1".to_string()),
        ];
        let summary = self.call(GET_MATCH_HISTORY, params, parse_history).await?;
        debug!(?summary, "获取最近比赛完成");
        Ok(summary)
    }

    #[instrument(skip(self))]
    async fn match_details(&self, match_id: u64) -> Result<MatchDetails, TickerError> {
        let params = vec![("match_id", match_id.to_string())];
        self.call(GET_MATCH_DETAILS, params, parse_details).await
    }
}

// ---------------------------------------------------------------------------
// 响应解析
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct HistoryResult {
    #[serde(default = "default_status")]
    status: i64,
    #[serde(default)]
    num_results: u32,
    #[serde(default)]
    matches: Vec<MatchSummary>,
}

fn default_status() -> i64 {
    1
}

/// 解析 `GetMatchHistory` 响应
///
/// 私密历史和空历史都视为"没有比赛"，而不是错误。
pub fn parse_history(body: &Value) -> Result<Option<MatchSummary>, String> {
    let result = body
        .get("result")
        .ok_or_else(|| "缺少 result 字段".to_string())?;
    let history: HistoryResult =
        serde_json::from_value(result.clone()).map_err(|e| format!("result 格式错误: {e}"))?;

    if history.status == STATUS_PRIVATE_HISTORY || history.num_results == 0 {
        return Ok(None);
    }
    Ok(history.matches.into_iter().next())
}

/// 解析 `GetMatchDetails` 响应
pub fn parse_details(body: &Value) -> Result<MatchDetails, String> {
    let result = body
        .get("result")
        .ok_or_else(|| "缺少 result 字段".to_string())?;

    if let Some(error) = result.get("error") {
        return Err(format!("比赛详情不可用: {error}"));
    }

    serde_json::from_value(result.clone()).map_err(|e| format!("result 格式错误: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_history_latest_match() {
        let body = json!({
            "result": {
                "status": 1,
                "num_results": 1,
                "total_results": 500,
                "matches": [
                    {"match_id": 7_001, "match_seq_num": 6_100_000_123_u64, "start_time": 1_700_000_000}
                ]
            }
        });

        let summary = parse_history(&body).unwrap().unwrap();
        assert_eq!(summary.match_id, 7_001);
        assert_eq!(summary.match_seq_num, 6_100_000_123);
    }

    #[test]
    fn test_parse_history_private_or_empty() {
        let private = json!({"result": {"status": 15, "statusDetail": "Cannot get match history for a user that hasn't allowed it"}});
        assert_eq!(parse_history(&private).unwrap(), None);

        let empty = json!({"result": {"status": 1, "num_results": 0, "matches": []}});
        assert_eq!(parse_history(&empty).unwrap(), None);
    }

    #[test]
    fn test_parse_history_malformed() {
        assert!(parse_history(&json!({"unexpected": true})).is_err());
        assert!(parse_history(&json!({"result": {"num_results": "many"}})).is_err());
    }

    #[test]
    fn test_parse_details() {
        let body = json!({
            "result": {
                "match_id": 7_001,
                "match_seq_num": 42,
                "radiant_win": false,
                "duration": 2_405,
                "lobby_type": 7,
                "game_mode": 22,
                "cluster": 133,
                "players": [
                    {"account_id": 39_734_273, "player_slot": 0, "hero_id": 1, "level": 25,
                     "kills": 10, "deaths": 2, "assists": 7, "gold_per_min": 650},
                    {"account_id": 4_294_967_295_u64, "player_slot": 128, "hero_id": 2}
                ]
            }
        });

        let details = parse_details(&body).unwrap();
        assert_eq!(details.match_id, 7_001);
        assert!(!details.radiant_win);
        assert_eq!(details.players.len(), 2);
        assert_eq!(details.players[0].gold_per_min, 650);
        assert_eq!(details.players[1].account_id, Some(u32::MAX));
    }

    #[test]
    fn test_parse_details_error_payload() {
        let body = json!({"result": {"error": "Match ID not found"}});
        assert!(parse_details(&body).is_err());
        assert!(parse_details(&json!({})).is_err());
    }

    #[test]
    fn test_status_classification() {
        assert!(RequestError::from_status(StatusCode::OK).is_none());
        assert!(
            RequestError::from_status(StatusCode::SERVICE_UNAVAILABLE)
                .unwrap()
                .is_transient()
        );
        assert!(
            RequestError::from_status(StatusCode::TOO_MANY_REQUESTS)
                .unwrap()
                .is_transient()
        );
        assert!(
            !RequestError::from_status(StatusCode::FORBIDDEN)
                .unwrap()
                .is_transient()
        );
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let config = UpstreamConfig {
            base_url: "http://127.0.0.1:9/".to_string(),
            ..Default::default()
        };
        let client = SteamClient::new(&config).unwrap();
        assert_eq!(
            client.endpoint(GET_MATCH_HISTORY),
            "http://127.0.0.1:9/IDOTA2Match_570/GetMatchHistory/V001/"
        );
    }
}
