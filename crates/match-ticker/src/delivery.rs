//! 投递调度器
//!
//! 在主运行时上按固定间隔取走队列中的全部报告。不同频道并行投递，
//! 同一频道按入队顺序逐条发送，长报告的分段不会与其他报告交错。
//! 投递失败只记录日志，报告丢弃，不重试。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use ticker_shared::observability::metrics;

use crate::model::Report;
use crate::queue::ReportReceiver;
use crate::sender::DeliveryTransport;

/// 一次投递批次的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub delivered: usize,
    pub failed: usize,
}

pub struct DeliveryScheduler {
    receiver: ReportReceiver,
    transport: Arc<dyn DeliveryTransport>,
    interval: Duration,
}

impl DeliveryScheduler {
    pub fn new(
        receiver: ReportReceiver,
        transport: Arc<dyn DeliveryTransport>,
        interval: Duration,
    ) -> Self {
        Self {
            receiver,
            transport,
            interval,
        }
    }

    /// 启动投递循环，直到收到 shutdown 信号
    ///
    /// 退出前再取一次队列，已入队的报告不会被静默丢弃。
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            transport = self.transport.name(),
            delivery_interval = ?self.interval,
            "DeliveryScheduler 已启动"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.deliver_pending().await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        let last = self.deliver_pending().await;
        info!(
            delivered = last.delivered,
            failed = last.failed,
            "DeliveryScheduler 已停止"
        );
    }

    /// 取走当前全部报告并投递
    pub async fn deliver_pending(&mut self) -> DeliveryStats {
        let reports = self.receiver.drain_all();
        if reports.is_empty() {
            return DeliveryStats::default();
        }

        let mut by_destination: HashMap<&str, Vec<&Report>> = HashMap::new();
        for report in &reports {
            by_destination
                .entry(report.destination.as_str())
                .or_default()
                .push(report);
        }

        let this = &*self;
        let batches = by_destination.into_values().map(|batch| async move {
            let mut stats = DeliveryStats::default();
            for report in batch {
                if this.deliver(report).await {
                    stats.delivered += 1;
                } else {
                    stats.failed += 1;
                }
            }
            stats
        });

        let stats = futures::future::join_all(batches).await.into_iter().fold(
            DeliveryStats::default(),
            |total, batch| DeliveryStats {
                delivered: total.delivered + batch.delivered,
                failed: total.failed + batch.failed,
            },
        );
        info!(
            delivered = stats.delivered,
            failed = stats.failed,
            "本批报告投递完成"
        );
        stats
    }

    async fn deliver(&self, report: &Report) -> bool {
        let transport = self.transport.name();
        match self.transport.send(&report.destination, &report.body).await {
            Ok(receipt) => {
                metrics::record_delivery(transport, true);
                info!(
                    report_id = %report.id,
                    group_id = %report.group_id,
                    match_id = report.match_id,
                    destination = %receipt.destination,
                    message_id = receipt.message_id.as_deref().unwrap_or("-"),
                    parts = receipt.parts,
                    "报告已投递"
                );
                true
            }
            Err(e) => {
                metrics::record_delivery(transport, false);
                warn!(
                    report_id = %report.id,
                    group_id = %report.group_id,
                    match_id = report.match_id,
                    destination = %report.destination,
                    error = %e,
                    "报告投递失败，已丢弃"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TickerError;
    use crate::model::MatchSummary;
    use crate::queue::report_queue;
    use crate::sender::{DeliveryReceipt, MockDeliveryTransport};

    fn report(destination: &str, seq: u64) -> Report {
        let summary = MatchSummary {
            match_id: seq,
            match_seq_num: seq,
        };
        Report::new("guild-1", destination, &summary, format!("match {seq}"))
    }

    fn transport_failing_for(bad: &'static str) -> MockDeliveryTransport {
        let mut transport = MockDeliveryTransport::new();
        transport.expect_name().return_const("mock");
        transport.expect_send().returning(move |destination, _| {
            if destination == bad {
                Err(TickerError::DeliveryFailure {
                    destination: destination.to_string(),
                    reason: "HTTP 403".to_string(),
                })
            } else {
                Ok(DeliveryReceipt {
                    destination: destination.to_string(),
                    message_id: None,
                    parts: 1,
                })
            }
        });
        transport
    }

    #[tokio::test]
    async fn test_failure_does_not_block_other_reports() {
        let (tx, rx) = report_queue(8);
        tx.enqueue(report("chan-1", 1)).await.unwrap();
        tx.enqueue(report("forbidden", 2)).await.unwrap();
        tx.enqueue(report("chan-2", 3)).await.unwrap();

        let mut scheduler = DeliveryScheduler::new(
            rx,
            Arc::new(transport_failing_for("forbidden")),
            Duration::from_secs(60),
        );

        let stats = scheduler.deliver_pending().await;
        assert_eq!(stats, DeliveryStats { delivered: 2, failed: 1 });

        // 失败的报告不会重新投递
        assert_eq!(scheduler.deliver_pending().await, DeliveryStats::default());
    }

    /// 按报告内容决定耗时，先入队的报告更慢
    struct SlowTransport {
        sent: tokio::sync::Mutex<Vec<(String, String)>>,
    }

    #[async_trait::async_trait]
    impl DeliveryTransport for SlowTransport {
        async fn send(&self, destination: &str, text: &str) -> Result<DeliveryReceipt, TickerError> {
            let delay = if text == "match 1" { 80 } else { 5 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.sent
                .lock()
                .await
                .push((destination.to_string(), text.to_string()));
            Ok(DeliveryReceipt {
                destination: destination.to_string(),
                message_id: None,
                parts: 1,
            })
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    #[tokio::test]
    async fn test_same_destination_keeps_queue_order() {
        let (tx, rx) = report_queue(8);
        tx.enqueue(report("chan-1", 1)).await.unwrap();
        tx.enqueue(report("chan-2", 2)).await.unwrap();
        tx.enqueue(report("chan-1", 3)).await.unwrap();
        tx.enqueue(report("chan-1", 4)).await.unwrap();

        let transport = Arc::new(SlowTransport {
            sent: tokio::sync::Mutex::new(Vec::new()),
        });
        let mut scheduler =
            DeliveryScheduler::new(rx, transport.clone(), Duration::from_secs(60));

        let stats = scheduler.deliver_pending().await;
        assert_eq!(stats, DeliveryStats { delivered: 4, failed: 0 });

        let sent = transport.sent.lock().await;
        let chan_1: Vec<&str> = sent
            .iter()
            .filter(|(destination, _)| destination == "chan-1")
            .map(|(_, text)| text.as_str())
            .collect();
        assert_eq!(chan_1, vec!["match 1", "match 3", "match 4"]);
        // 其他频道不必等待慢频道
        assert_eq!(sent[0], ("chan-2".to_string(), "match 2".to_string()));
    }

    #[tokio::test]
    async fn test_final_drain_on_shutdown() {
        let (tx, rx) = report_queue(8);
        let mut transport = MockDeliveryTransport::new();
        transport.expect_name().return_const("mock");
        transport
            .expect_send()
            .withf(|destination, text| destination == "chan-1" && text == "match 9")
            .times(1)
            .returning(|destination, _| {
                Ok(DeliveryReceipt {
                    destination: destination.to_string(),
                    message_id: Some("m-1".to_string()),
                    parts: 1,
                })
            });

        let scheduler = DeliveryScheduler::new(rx, Arc::new(transport), Duration::from_secs(3_600));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(scheduler.run(shutdown_rx));

        // 第一次投递已经执行完毕（队列为空），此时入队的报告只能靠退出前的最后一次投递
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.enqueue(report("chan-1", 9)).await.unwrap();
        shutdown_tx.send(true).unwrap();

        handle.await.unwrap();
    }
}
