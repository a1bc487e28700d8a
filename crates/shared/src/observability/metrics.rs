//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Metrics 资源守卫
pub struct MetricsHandle {
    server_handle: tokio::task::JoinHandle<()>,
}

impl Drop for MetricsHandle {
    fn drop(&mut self) {
        self.server_handle.abort();
    }
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(service_name: &str, port: u16) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    register_common_metrics(service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle { server_handle })
}

/// 注册通用指标
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!("ticker_poll_cycles_total", "Total number of poll cycles");
    metrics::describe_histogram!(
        "ticker_poll_cycle_duration_seconds",
        "Poll cycle duration in seconds"
    );
    metrics::describe_counter!(
        "ticker_upstream_requests_total",
        "Total number of upstream API requests"
    );
    metrics::describe_counter!(
        "ticker_reports_enqueued_total",
        "Total number of match reports handed to delivery"
    );
    metrics::describe_counter!(
        "ticker_deliveries_total",
        "Total number of report delivery attempts"
    );
    metrics::describe_gauge!(
        "ticker_group_watermark",
        "Highest reported match sequence number per group"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 启动指标 HTTP 服务器
async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录一轮轮询
#[inline]
pub fn record_poll_cycle(outcome: &str, groups: usize, duration_secs: f64) {
    metrics::counter!("ticker_poll_cycles_total", "outcome" => outcome.to_string()).increment(1);
    metrics::gauge!("ticker_groups_polled").set(groups as f64);
    metrics::histogram!("ticker_poll_cycle_duration_seconds").record(duration_secs);
}

/// 记录上游请求
#[inline]
pub fn record_upstream_request(operation: &str, outcome: &str) {
    metrics::counter!(
        "ticker_upstream_requests_total",
        "operation" => operation.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// 记录报告入队
#[inline]
pub fn record_report_enqueued(group_id: &str) {
    metrics::counter!(
        "ticker_reports_enqueued_total",
        "group_id" => group_id.to_string()
    )
    .increment(1);
}

/// 记录投递结果
#[inline]
pub fn record_delivery(transport: &str, success: bool) {
    metrics::counter!(
        "ticker_deliveries_total",
        "transport" => transport.to_string(),
        "status" => if success { "success" } else { "failed" }
    )
    .increment(1);
}

/// 更新群组水位
#[inline]
pub fn set_group_watermark(group_id: &str, value: u64) {
    metrics::gauge!(
        "ticker_group_watermark",
        "group_id" => group_id.to_string()
    )
    .set(value as f64);
}
