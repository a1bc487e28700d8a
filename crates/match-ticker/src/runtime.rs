//! 播报运行时
//!
//! `Ticker` 持有两个调度器的生命周期：
//! - 轮询调度器运行在独立线程的单线程 tokio 运行时上，上游请求耗尽重试预算时
//!   也不会占用主运行时；
//! - 投递调度器作为任务运行在主运行时上。
//!
//! 两者只通过报告通道交互。关闭时先停轮询并等待当前一轮结束，
//! 再停投递：投递端最后一次取队列时已经没有生产者，已推进水位的报告都能送出。

use std::sync::Arc;
use std::thread;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use ticker_shared::config::AppConfig;
use ticker_shared::error::ServiceError;
use ticker_shared::settings::SettingsStore;

use crate::delivery::DeliveryScheduler;
use crate::directory::GroupDirectory;
use crate::error::TickerError;
use crate::fetcher::DetailFetcher;
use crate::poller::PollScheduler;
use crate::queue::report_queue;
use crate::reference::ReferenceTables;
use crate::report::ReportRenderer;
use crate::resolver::EventResolver;
use crate::sender::{DeliveryTransport, build_transport};
use crate::upstream::{MatchSource, SteamClient};
use crate::watermark::WatermarkStore;

const POLL_THREAD_NAME: &str = "match-ticker-poll";

/// 按配置组装一对调度器，上游与投递渠道使用真实实现
pub fn assemble(
    config: &AppConfig,
    store: Arc<dyn SettingsStore>,
) -> Result<(PollScheduler, DeliveryScheduler), TickerError> {
    if config.upstream.api_key.is_empty() {
        warn!("未配置 upstream.api_key，Steam API 请求将被拒绝");
    }

    let source: Arc<dyn MatchSource> = Arc::new(SteamClient::new(&config.upstream)?);
    let transport = build_transport(&config.delivery)?;
    assemble_with(config, store, source, transport)
}

/// 按需查询用的详情获取器，不启动任何调度器
pub fn lookup(config: &AppConfig, store: Arc<dyn SettingsStore>) -> Result<DetailFetcher, TickerError> {
    let source: Arc<dyn MatchSource> = Arc::new(SteamClient::new(&config.upstream)?);
    build_fetcher(config, GroupDirectory::new(store), source)
}

fn build_fetcher(
    config: &AppConfig,
    directory: GroupDirectory,
    source: Arc<dyn MatchSource>,
) -> Result<DetailFetcher, TickerError> {
    let tables = ReferenceTables::load(config.ticker.reference_dir.as_deref())?;
    Ok(DetailFetcher::new(
        source,
        directory,
        ReportRenderer::new(Arc::new(tables)),
    ))
}

/// 使用给定的上游和投递渠道组装调度器
pub fn assemble_with(
    config: &AppConfig,
    store: Arc<dyn SettingsStore>,
    source: Arc<dyn MatchSource>,
    transport: Arc<dyn DeliveryTransport>,
) -> Result<(PollScheduler, DeliveryScheduler), TickerError> {
    let directory = GroupDirectory::new(store.clone());
    let watermarks = WatermarkStore::new(store);
    let resolver = EventResolver::new(source.clone(), watermarks);
    let fetcher = build_fetcher(config, directory.clone(), source)?;

    let (sender, receiver) = report_queue(config.ticker.queue_capacity);
    let poller = PollScheduler::new(directory, resolver, fetcher, sender, &config.ticker);
    let delivery =
        DeliveryScheduler::new(receiver, transport, config.ticker.delivery_interval());

    Ok((poller, delivery))
}

/// 运行中的播报服务
pub struct Ticker {
    poll_shutdown: watch::Sender<bool>,
    delivery_shutdown: watch::Sender<bool>,
    poll_thread: thread::JoinHandle<()>,
    delivery_task: JoinHandle<()>,
}

impl Ticker {
    /// 启动两个调度器，必须在 tokio 运行时内调用
    pub fn start(poller: PollScheduler, delivery: DeliveryScheduler) -> Result<Self, TickerError> {
        let (poll_shutdown, poll_shutdown_rx) = watch::channel(false);
        let (delivery_shutdown, delivery_shutdown_rx) = watch::channel(false);

        let poll_thread = thread::Builder::new()
            .name(POLL_THREAD_NAME.to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!(error = %e, "轮询线程运行时创建失败");
                        return;
                    }
                };
                runtime.block_on(poller.run(poll_shutdown_rx));
            })
            .map_err(|e| ServiceError::Internal(format!("轮询线程启动失败: {e}")))?;

        let delivery_task = tokio::spawn(delivery.run(delivery_shutdown_rx));

        info!("比赛播报已启动");
        Ok(Self {
            poll_shutdown,
            delivery_shutdown,
            poll_thread,
            delivery_task,
        })
    }

    /// 依次停止轮询与投递
    ///
    /// 进行中的一轮轮询会完整执行，其间投递循环照常运行，入队不会被阻塞。
    pub async fn shutdown(self) {
        info!("正在停止比赛播报...");

        let _ = self.poll_shutdown.send(true);
        let poll_thread = self.poll_thread;
        match tokio::task::spawn_blocking(move || poll_thread.join()).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => error!("轮询线程异常退出"),
            Err(e) => error!(error = %e, "等待轮询线程失败"),
        }

        let _ = self.delivery_shutdown.send(true);
        if let Err(e) = self.delivery_task.await {
            error!(error = %e, "投递任务异常退出");
        }

        info!("比赛播报已停止");
    }
}
