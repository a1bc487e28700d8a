//! 重试策略与执行器
//!
//! 提供固定间隔的有界重试，用于上游瞬时故障（5xx、限流、超时）的本地恢复。
//! 永久性错误（响应格式错误、未知账号）不应被重试，由调用方通过 `is_retryable` 闭包控制。

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

// ---------------------------------------------------------------------------
// RetryPolicy: 重试策略配置
// ---------------------------------------------------------------------------

/// 重试策略配置
///
/// 每次重试前等待相同的固定间隔，不做指数退避：上游按分钟级节奏轮询，
/// 单次调用的重试预算必须小而可预期。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 最大重试次数（不含首次执行）
    pub max_retries: u32,
    /// 两次尝试之间的固定等待时间
    pub delay: Duration,
}

impl Default for RetryPolicy {
    /// 默认策略：最多重试 2 次，每次等待 500 毫秒
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// 是否应继续重试
    ///
    /// attempt 表示已经失败的次数（从 0 开始计数的重试轮次），
    /// 当 attempt < max_retries 时返回 true。
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

// ---------------------------------------------------------------------------
// retry_with_policy: 带重试的异步执行器
// ---------------------------------------------------------------------------

/// 带重试的异步执行器
///
/// 对任意异步操作应用重试策略。仅在操作返回可重试错误时才重试，
/// 不可重试的错误直接向上传播。
pub async fn retry_with_policy<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation_name: &str,
    is_retryable: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt: u32 = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    info!(operation = operation_name, attempt, "操作在重试后成功");
                }
                return Ok(value);
            }
            Err(err) => {
                if !is_retryable(&err) {
                    warn!(
                        operation = operation_name,
                        error = %err,
                        "操作失败且不可重试，直接返回错误"
                    );
                    return Err(err);
                }

                if !policy.should_retry(attempt) {
                    warn!(
                        operation = operation_name,
                        attempt,
                        max_retries = policy.max_retries,
                        error = %err,
                        "已达最大重试次数，放弃重试"
                    );
                    return Err(err);
                }

                warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = policy.delay.as_millis() as u64,
                    error = %err,
                    "操作失败，将在固定间隔后重试"
                );

                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// 单元测试
// ---------------------------------------------------------------------------
