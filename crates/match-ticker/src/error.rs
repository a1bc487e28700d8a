//! 比赛播报错误类型
//!
//! 三类业务错误（上游不可用、投递失败、配置缺失）都只影响当前处理单元：
//! 调度循环捕获后跳过该成员、比赛或群组，继续下一轮。

use thiserror::Error;
use ticker_shared::error::ServiceError;

#[derive(Debug, Error)]
pub enum TickerError {
    #[error("上游服务不可用: 操作={operation}, 原因={reason}")]
    UpstreamUnavailable { operation: String, reason: String },

    #[error("报告投递失败: 目的地={destination}, 原因={reason}")]
    DeliveryFailure { destination: String, reason: String },

    #[error("群组未配置播报频道: {group_id}")]
    ConfigurationMissing { group_id: String },

    #[error("无法识别的 Steam 账号: {0}")]
    InvalidIdentity(String),

    #[error("成员尚未绑定 Steam 账号: {member_id}")]
    NotLinked { member_id: String },

    #[error("群组已启用比赛播报: {group_id}")]
    AlreadyEnabled { group_id: String },

    #[error("群组未启用比赛播报: {group_id}")]
    NotEnabled { group_id: String },

    #[error("报告队列已关闭")]
    QueueClosed,

    #[error("参考数据加载失败: {path} - {reason}")]
    ReferenceData { path: String, reason: String },

    #[error(transparent)]
    Shared(#[from] ServiceError),
}

impl TickerError {
    pub fn upstream(operation: &str, reason: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let upstream = TickerError::upstream("GetMatchHistory", "HTTP 503");
        assert_eq!(
            upstream.to_string(),
            "上游服务不可用: 操作=GetMatchHistory, 原因=HTTP 503"
        );

        let delivery = TickerError::DeliveryFailure {
            destination: "1234".to_string(),
            reason: "HTTP 403".to_string(),
        };
        assert_eq!(delivery.to_string(), "报告投递失败: 目的地=1234, 原因=HTTP 403");

        let missing = TickerError::ConfigurationMissing {
            group_id: "guild-1".to_string(),
        };
        assert_eq!(missing.to_string(), "群组未配置播报频道: guild-1");
    }

    #[test]
    fn test_shared_error_is_transparent() {
        let err: TickerError = ServiceError::Internal("boom".to_string()).into();
        assert_eq!(err.to_string(), "内部错误: boom");
    }
}
