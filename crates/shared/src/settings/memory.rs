//! 内存设置存储
//!
//! 使用 DashMap 实现，进程退出即丢失，适用于测试和本地试运行。

use std::collections::BTreeMap;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use super::SettingsStore;
use crate::error::Result;

#[derive(Debug, Default)]
pub struct MemoryStore {
    data: DashMap<String, BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>> {
        Ok(self
            .data
            .get(namespace)
            .and_then(|document| document.get(key).cloned()))
    }

    async fn put(&self, namespace: &str, key: &str, value: Value) -> Result<()> {
        self.data
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn keys(&self, namespace: &str) -> Result<Vec<String>> {
        Ok(self
            .data
            .get(namespace)
            .map(|document| document.keys().cloned().collect())
            .unwrap_or_default())
    }
}
