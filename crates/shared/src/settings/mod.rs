//! 设置存储模块
//!
//! 以「命名空间 + 键」组织的 JSON 文档存储，承载群组播报设置、成员名单、
//! 账号绑定和播报水位。提供文件、Redis、内存三种后端，调用方只依赖
//! `SettingsStore` trait。

mod file;
mod memory;
mod redis_store;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::info;

use crate::config::{AppConfig, SettingsBackend};
use crate::error::{Result, ServiceError};

pub use self::file::JsonFileStore;
pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

/// 约定的命名空间
pub mod namespaces {
    /// 群组 id -> `{"enabled": bool, "channel_id": string?}`
    pub const TICKER_SETTINGS: &str = "ticker_settings";
    /// 群组 id -> 成员列表
    pub const MEMBERS: &str = "members";
    /// 成员 id -> 绑定的 Steam id 列表
    pub const STEAM_INFO: &str = "steam_info";
    /// 群组 id -> 已播报的最大 match_seq_num
    pub const WATERMARKS: &str = "watermarks";
}

/// 设置存储接口
///
/// 单个键的 get/put 需保证原子性，进程内读己之写。
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>>;

    async fn put(&self, namespace: &str, key: &str, value: Value) -> Result<()>;

    /// 列出命名空间下的全部键
    async fn keys(&self, namespace: &str) -> Result<Vec<String>>;
}

/// 读取并反序列化为具体类型
pub async fn get_typed<T: DeserializeOwned>(
    store: &dyn SettingsStore,
    namespace: &str,
    key: &str,
) -> Result<Option<T>> {
    match store.get(namespace, key).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| ServiceError::Serialization {
                namespace: namespace.to_string(),
                key: key.to_string(),
                message: e.to_string(),
            }),
        None => Ok(None),
    }
}

/// 序列化后写入
pub async fn put_typed<T: Serialize>(
    store: &dyn SettingsStore,
    namespace: &str,
    key: &str,
    value: &T,
) -> Result<()> {
    let value = serde_json::to_value(value).map_err(|e| ServiceError::Serialization {
        namespace: namespace.to_string(),
        key: key.to_string(),
        message: e.to_string(),
    })?;
    store.put(namespace, key, value).await
}

/// 按配置打开设置存储
pub async fn open(config: &AppConfig) -> Result<Arc<dyn SettingsStore>> {
    let store: Arc<dyn SettingsStore> = match config.settings.backend {
        SettingsBackend::File => Arc::new(JsonFileStore::new(&config.settings.data_dir)),
        SettingsBackend::Redis => {
            let store = RedisStore::new(&config.redis)?;
            store.health_check().await?;
            Arc::new(store)
        }
        SettingsBackend::Memory => Arc::new(MemoryStore::new()),
    };

    info!(backend = ?config.settings.backend, "设置存储已就绪");
    Ok(store)
}
