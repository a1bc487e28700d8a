//! 报告投递渠道
//!
//! `DeliveryTransport` 只负责把一段文本送到目的地，不做重试。
//! - `LogTransport`：写入结构化日志，本地开发使用
//! - `DiscordTransport`：调用 Discord REST API 向频道发消息

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use uuid::Uuid;

use ticker_shared::config::{DeliveryConfig, TransportKind};

use crate::error::TickerError;

/// Discord 单条消息的最大字符数
const DISCORD_MESSAGE_LIMIT: usize = 2_000;

/// 投递回执
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub destination: String,
    /// 渠道返回的消息标识（分段发送时为最后一段）
    pub message_id: Option<String>,
    pub parts: usize,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    async fn send(&self, destination: &str, text: &str) -> Result<DeliveryReceipt, TickerError>;

    /// 渠道名称，用于日志和指标标签
    fn name(&self) -> &'static str;
}

/// 按配置创建投递渠道
pub fn build_transport(config: &DeliveryConfig) -> Result<Arc<dyn DeliveryTransport>, TickerError> {
    match config.transport {
        TransportKind::Log => Ok(Arc::new(LogTransport)),
        TransportKind::Discord => Ok(Arc::new(DiscordTransport::new(config)?)),
    }
}

// ---------------------------------------------------------------------------
// 日志渠道
// ---------------------------------------------------------------------------

pub struct LogTransport;

#[async_trait]
impl DeliveryTransport for LogTransport {
    async fn send(&self, destination: &str, text: &str) -> Result<DeliveryReceipt, TickerError> {
        let message_id = Uuid::now_v7().to_string();
        info!(
            transport = "log",
            destination,
            message_id = %message_id,
            body = %text,
            "投递比赛报告"
        );

        Ok(DeliveryReceipt {
            destination: destination.to_string(),
            message_id: Some(message_id),
            parts: 1,
        })
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

// ---------------------------------------------------------------------------
// Discord 渠道
// ---------------------------------------------------------------------------

pub struct DiscordTransport {
    client: Client,
    api_base: String,
    token: String,
}

impl DiscordTransport {
    pub fn new(config: &DeliveryConfig) -> Result<Self, TickerError> {
        if config.discord_token.is_empty() {
            return Err(TickerError::DeliveryFailure {
                destination: "discord".to_string(),
                reason: "未配置 delivery.discord_token".to_string(),
            });
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| TickerError::DeliveryFailure {
                destination: "discord".to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            api_base: config.discord_api_base.trim_end_matches('/').to_string(),
            token: config.discord_token.clone(),
        })
    }

    async fn post_message(&self, channel_id: &str, content: &str) -> Result<Option<String>, TickerError> {
        let failure = |reason: String| TickerError::DeliveryFailure {
            destination: channel_id.to_string(),
            reason,
        };

        let url = format!("{}/channels/{}/messages", self.api_base, channel_id);
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, format!("Bot {}", self.token))
            .json(&json!({ "content": content }))
            .send()
            .await
            .map_err(|e| failure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(channel_id, status = status.as_u16(), "Discord 拒绝了消息");
            return Err(failure(format!("HTTP {status}: {}", truncate(&body, 200))));
        }

        let message_id = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|v| v.get("id").and_then(Value::as_str).map(str::to_string));
        Ok(message_id)
    }
}

#[async_trait]
impl DeliveryTransport for DiscordTransport {
    async fn send(&self, destination: &str, text: &str) -> Result<DeliveryReceipt, TickerError> {
        let parts = split_message(text, DISCORD_MESSAGE_LIMIT);
        let mut message_id = None;
        for part in &parts {
            message_id = self.post_message(destination, part).await?;
        }
        debug!(destination, parts = parts.len(), "Discord 消息已发送");

        Ok(DeliveryReceipt {
            destination: destination.to_string(),
            message_id,
            parts: parts.len(),
        })
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}

/// 按行切分超长消息，单行超长时按字符硬切
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();

    for line in text.split_inclusive('\n') {
        if current.chars().count() + line.chars().count() <= limit {
            current.push_str(line);
            continue;
        }

        if !current.is_empty() {
            parts.push(std::mem::take(&mut current));
        }

        let mut chars = line.chars().peekable();
        while chars.peek().is_some() {
            let chunk: String = chars.by_ref().take(limit).collect();
            if chunk.chars().count() == limit {
                parts.push(chunk);
            } else {
                current = chunk;
            }
        }
    }

    if !current.is_empty() || parts.is_empty() {
        parts.push(current);
    }
    parts
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_message_is_single_part() {
        assert_eq!(split_message("hello\nworld", 2_000), vec!["hello\nworld"]);
        assert_eq!(split_message("", 2_000), vec![""]);
    }

    #[test]
    fn test_split_on_line_boundaries() {
        let text = "aaaa\nbbbb\ncccc";
        let parts = split_message(text, 10);
        assert_eq!(parts, vec!["aaaa\nbbbb\n", "cccc"]);
        assert_eq!(parts.concat(), text);
    }

    #[test]
    fn test_split_overlong_line() {
        let text = "x".repeat(25);
        let parts = split_message(&text, 10);
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.chars().count() <= 10));
        assert_eq!(parts.concat(), text);
    }

    #[test]
    fn test_discord_requires_token() {
        let config = DeliveryConfig {
            transport: TransportKind::Discord,
            ..Default::default()
        };
        assert!(matches!(
            build_transport(&config),
            Err(TickerError::DeliveryFailure { .. })
        ));
    }

    #[tokio::test]
    async fn test_log_transport_always_acks() {
        let transport = build_transport(&DeliveryConfig::default()).unwrap();
        assert_eq!(transport.name(), "log");

        let receipt = transport.send("chan-1", "report").await.unwrap();
        assert_eq!(receipt.destination, "chan-1");
        assert!(receipt.message_id.is_some());
    }
}
