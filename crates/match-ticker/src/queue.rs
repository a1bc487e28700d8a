//! 轮询端与投递端之间的报告通道
//!
//! 有界 mpsc 通道：轮询端持有 `ReportSender`，投递端持有唯一的 `ReportReceiver`。
//! 通道满时 `enqueue` 等待，对轮询端形成背压。

use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::debug;

use ticker_shared::observability::metrics;

use crate::error::TickerError;
use crate::model::Report;

/// 创建报告通道
pub fn report_queue(capacity: usize) -> (ReportSender, ReportReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ReportSender { tx }, ReportReceiver { rx })
}

#[derive(Clone)]
pub struct ReportSender {
    tx: mpsc::Sender<Report>,
}

impl ReportSender {
    pub async fn enqueue(&self, report: Report) -> Result<(), TickerError> {
        let group_id = report.group_id.clone();
        let match_id = report.match_id;
        self.tx
            .send(report)
            .await
            .map_err(|_| TickerError::QueueClosed)?;

        metrics::record_report_enqueued(&group_id);
        debug!(group_id = %group_id, match_id, "报告已入队");
        Ok(())
    }

    /// 通道内没有未取走的报告
    pub fn is_empty(&self) -> bool {
        self.tx.capacity() == self.tx.max_capacity()
    }

    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

pub struct ReportReceiver {
    rx: mpsc::Receiver<Report>,
}

impl ReportReceiver {
    /// 取走当前通道中的全部报告，不等待
    pub fn drain_all(&mut self) -> Vec<Report> {
        let mut drained = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(report) => drained.push(report),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MatchSummary;

    fn report(seq: u64) -> Report {
        let summary = MatchSummary {
            match_id: seq,
            match_seq_num: seq,
        };
        Report::new("guild-1", "chan-1", &summary, format!("match {seq}"))
    }

    #[tokio::test]
    async fn test_drain_is_idempotent() {
        let (tx, mut rx) = report_queue(8);
        tokio_test::assert_ok!(tx.enqueue(report(1)).await);
        tokio_test::assert_ok!(tx.enqueue(report(2)).await);
        assert_eq!(tx.len(), 2);
        assert!(!tx.is_empty());

        let first = rx.drain_all();
        assert_eq!(
            first.iter().map(|r| r.match_seq_num).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert!(rx.drain_all().is_empty());
        assert!(tx.is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_after_receiver_dropped() {
        let (tx, rx) = report_queue(1);
        drop(rx);
        assert!(matches!(
            tx.enqueue(report(1)).await,
            Err(TickerError::QueueClosed)
        ));
    }

    #[tokio::test]
    async fn test_drain_after_senders_dropped() {
        let (tx, mut rx) = report_queue(4);
        tx.enqueue(report(7)).await.unwrap();
        drop(tx);

        assert_eq!(rx.drain_all().len(), 1);
        assert!(rx.drain_all().is_empty());
    }
}
