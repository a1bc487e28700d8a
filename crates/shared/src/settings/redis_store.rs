//! Redis 设置存储
//!
//! 每个命名空间映射为一个 Redis hash：`<prefix>:<namespace>`，字段为键，值为 JSON 文本。

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use serde_json::Value;
use tracing::{info, instrument};

use super::SettingsStore;
use crate::config::RedisConfig;
use crate::error::{Result, ServiceError};

/// Redis 设置存储客户端
#[derive(Clone)]
pub struct RedisStore {
    client: Client,
    key_prefix: String,
}

impl RedisStore {
    /// 创建 Redis 客户端
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())?;
        info!(key_prefix = %config.key_prefix, "Redis client created");
        Ok(Self {
            client,
            key_prefix: config.key_prefix.clone(),
        })
    }

    /// 获取连接
    async fn get_conn(&self) -> Result<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(ServiceError::from)
    }

    fn hash_key(&self, namespace: &str) -> String {
        format!("{}:{}", self.key_prefix, namespace)
    }

    /// 健康检查
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.get_conn().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(ServiceError::from)
    }
}

#[async_trait]
impl SettingsStore for RedisStore {
    #[instrument(skip(self))]
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>> {
        let mut conn = self.get_conn().await?;
        let raw: Option<String> = conn.hget(self.hash_key(namespace), key).await?;

        match raw {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| ServiceError::Serialization {
                    namespace: namespace.to_string(),
                    key: key.to_string(),
                    message: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, value))]
    async fn put(&self, namespace: &str, key: &str, value: Value) -> Result<()> {
        let mut conn = self.get_conn().await?;
        let _: () = conn
            .hset(self.hash_key(namespace), key, value.to_string())
            .await?;
        Ok(())
    }

    async fn keys(&self, namespace: &str) -> Result<Vec<String>> {
        let mut conn = self.get_conn().await?;
        let mut keys: Vec<String> = conn.hkeys(self.hash_key(namespace)).await?;
        keys.sort();
        Ok(keys)
    }
}
