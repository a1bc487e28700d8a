//! 群组播报水位
//!
//! 每个群组一个整数：已播报过的最大 `match_seq_num`。0 表示尚未初始化。

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use ticker_shared::observability::metrics;
use ticker_shared::settings::{self, SettingsStore, namespaces};

use crate::error::TickerError;

#[derive(Clone)]
pub struct WatermarkStore {
    store: Arc<dyn SettingsStore>,
}

impl WatermarkStore {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn get(&self, group_id: &str) -> Result<u64, TickerError> {
        let value: Option<u64> =
            settings::get_typed(self.store.as_ref(), namespaces::WATERMARKS, group_id).await?;
        Ok(value.unwrap_or(0))
    }

    /// 写入新水位
    ///
    /// 水位只增不减：低于当前值的写入被忽略并返回 `false`。
    #[instrument(skip(self))]
    pub async fn set(&self, group_id: &str, value: u64) -> Result<bool, TickerError> {
        let current = self.get(group_id).await?;
        if value < current {
            warn!(group_id, current, attempted = value, "拒绝回退群组水位");
            return Ok(false);
        }

        settings::put_typed(self.store.as_ref(), namespaces::WATERMARKS, group_id, &value).await?;
        metrics::set_group_watermark(group_id, value);
        debug!(group_id, value, "群组水位已更新");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticker_shared::settings::MemoryStore;

    fn watermarks() -> WatermarkStore {
        WatermarkStore::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_unknown_group_is_unprimed() {
        assert_eq!(watermarks().get("guild-1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_read_your_writes() {
        let store = watermarks();
        assert!(store.set("guild-1", 9).await.unwrap());
        assert_eq!(store.get("guild-1").await.unwrap(), 9);
        // 其他群组不受影响
        assert_eq!(store.get("guild-2").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_never_moves_backwards() {
        let store = watermarks();
        store.set("guild-1", 20).await.unwrap();

        assert!(!store.set("guild-1", 12).await.unwrap());
        assert_eq!(store.get("guild-1").await.unwrap(), 20);

        // 相同值允许写入
        assert!(store.set("guild-1", 20).await.unwrap());
    }
}
