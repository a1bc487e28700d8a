//! Dota 2 比赛播报服务
//!
//! 轮询 Steam Web API 获取群组成员的最新比赛，按群组水位去重，
//! 为新比赛生成报告并投递到群组的播报频道。
//!
//! 轮询与投递是两个独立调度器，只通过有界报告通道交互。

pub mod admin;
pub mod cli;
pub mod delivery;
pub mod directory;
pub mod error;
pub mod fetcher;
pub mod model;
pub mod poller;
pub mod queue;
pub mod reference;
pub mod report;
pub mod resolver;
pub mod runtime;
pub mod sender;
pub mod upstream;
pub mod watermark;
