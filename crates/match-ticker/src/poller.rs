//! 轮询调度器
//!
//! 按固定间隔遍历所有群组：判定新比赛 -> 获取详情 -> 报告入队。
//! 任何单个群组的错误只记录日志，不会中断循环。

use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

use ticker_shared::config::TickerConfig;
use ticker_shared::observability::metrics;

use crate::directory::GroupDirectory;
use crate::error::TickerError;
use crate::fetcher::DetailFetcher;
use crate::queue::ReportSender;
use crate::resolver::{EventResolver, Resolution};

/// 单个群组一轮的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupOutcome {
    /// 未启用或设置已不存在
    Disabled,
    /// 已启用但没有配置播报频道
    Misconfigured,
    Unchanged,
    Primed(u64),
    Reported { match_id: u64, match_seq_num: u64 },
    /// 水位已推进，但详情获取失败，本场比赛不再播报
    DetailDropped { match_seq_num: u64 },
    Failed(String),
}

/// 一轮轮询的汇总
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub groups: usize,
    pub reported: usize,
    pub primed: usize,
    pub unchanged: usize,
    pub disabled: usize,
    pub misconfigured: usize,
    pub dropped: usize,
    pub failed: usize,
    /// 因队列积压跳过了本轮
    pub backlogged: bool,
}

impl PollSummary {
    fn record(&mut self, outcome: &GroupOutcome) {
        self.groups += 1;
        match outcome {
            GroupOutcome::Disabled => self.disabled += 1,
            GroupOutcome::Misconfigured => self.misconfigured += 1,
            GroupOutcome::Unchanged => self.unchanged += 1,
            GroupOutcome::Primed(_) => self.primed += 1,
            GroupOutcome::Reported { .. } => self.reported += 1,
            GroupOutcome::DetailDropped { .. } => self.dropped += 1,
            GroupOutcome::Failed(_) => self.failed += 1,
        }
    }
}

pub struct PollScheduler {
    directory: GroupDirectory,
    resolver: EventResolver,
    fetcher: DetailFetcher,
    queue: ReportSender,
    interval: Duration,
    group_concurrency: usize,
    skip_when_backlogged: bool,
}

impl PollScheduler {
    pub fn new(
        directory: GroupDirectory,
        resolver: EventResolver,
        fetcher: DetailFetcher,
        queue: ReportSender,
        config: &TickerConfig,
    ) -> Self {
        Self {
            directory,
            resolver,
            fetcher,
            queue,
            interval: config.poll_interval(),
            group_concurrency: config.group_concurrency.max(1),
            skip_when_backlogged: config.skip_when_backlogged,
        }
    }

    /// 主循环，收到关闭信号后退出
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_interval = ?self.interval,
            group_concurrency = self.group_concurrency,
            skip_when_backlogged = self.skip_when_backlogged,
            "PollScheduler 已启动"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.poll_once().await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("PollScheduler 已停止");
    }

    /// 执行一轮轮询
    #[instrument(skip(self))]
    pub async fn poll_once(&self) -> PollSummary {
        let started = Instant::now();
        let mut summary = PollSummary::default();

        if self.skip_when_backlogged && !self.queue.is_empty() {
            info!(pending = self.queue.len(), "报告队列仍有积压，跳过本轮轮询");
            summary.backlogged = true;
            metrics::record_poll_cycle("backlogged", 0, started.elapsed().as_secs_f64());
            return summary;
        }

        let group_ids = match self.directory.group_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                error!(error = %e, "读取群组列表失败");
                metrics::record_poll_cycle("failed", 0, started.elapsed().as_secs_f64());
                return summary;
            }
        };

        let outcomes: Vec<GroupOutcome> = stream::iter(group_ids)
            .map(|group_id| async move { self.poll_group(&group_id).await })
            .buffer_unordered(self.group_concurrency)
            .collect()
            .await;

        for outcome in &outcomes {
            summary.record(outcome);
        }

        let duration = started.elapsed();
        metrics::record_poll_cycle("completed", summary.groups, duration.as_secs_f64());
        info!(
            groups = summary.groups,
            reported = summary.reported,
            primed = summary.primed,
            dropped = summary.dropped,
            failed = summary.failed,
            duration_ms = duration.as_millis() as u64,
            "本轮轮询完成"
        );

        summary
    }

    /// 处理单个群组
    #[instrument(skip(self))]
    pub async fn poll_group(&self, group_id: &str) -> GroupOutcome {
        let group = match self.directory.load_group(group_id).await {
            Ok(Some(group)) => group,
            Ok(None) => return GroupOutcome::Disabled,
            Err(e) => {
                error!(error = %e, "读取群组设置失败");
                return GroupOutcome::Failed(e.to_string());
            }
        };

        let destination = match group.destination() {
            Ok(Some(destination)) => destination.to_string(),
            Ok(None) => return GroupOutcome::Disabled,
            Err(e) => {
                warn!(error = %e, "跳过未配置频道的群组");
                return GroupOutcome::Misconfigured;
            }
        };

        let summary = match self.resolver.resolve(&group).await {
            Ok(Resolution::Unchanged) => return GroupOutcome::Unchanged,
            Ok(Resolution::Primed(watermark)) => return GroupOutcome::Primed(watermark),
            Ok(Resolution::Advanced(summary)) => summary,
            Err(e) => {
                error!(error = %e, "解析群组新比赛失败");
                return GroupOutcome::Failed(e.to_string());
            }
        };

        let report = match self.fetcher.fetch(group_id, &destination, &summary).await {
            Ok(report) => report,
            Err(e) => {
                warn!(
                    match_id = summary.match_id,
                    match_seq_num = summary.match_seq_num,
                    error = %e,
                    "比赛详情获取失败，本场比赛不再播报"
                );
                return GroupOutcome::DetailDropped {
                    match_seq_num: summary.match_seq_num,
                };
            }
        };

        match self.queue.enqueue(report).await {
            Ok(()) => GroupOutcome::Reported {
                match_id: summary.match_id,
                match_seq_num: summary.match_seq_num,
            },
            Err(e @ TickerError::QueueClosed) => {
                error!(error = %e, "投递端已停止，报告丢弃");
                GroupOutcome::Failed(e.to_string())
            }
            Err(e) => GroupOutcome::Failed(e.to_string()),
        }
    }
}
