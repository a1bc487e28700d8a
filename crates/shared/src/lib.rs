//! 共享库
//!
//! 比赛播报服务共用的配置、错误处理、重试、设置存储与可观测性基础设施代码。

pub mod config;
pub mod error;
pub mod observability;
pub mod retry;
pub mod settings;
