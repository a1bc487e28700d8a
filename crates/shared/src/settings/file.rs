//! JSON 文件设置存储
//!
//! 每个命名空间对应目录下的一个 `<namespace>.json` 文件。
//!
//! 管理命令和播报服务是两个独立进程，共享同一目录，因此不缓存文档：
//! 每次读取都从磁盘加载，写入时在锁内「读取最新文档 -> 修改 -> 整文件落盘」
//! （先写临时文件再 rename），避免覆盖其他进程的修改。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use super::SettingsStore;
use crate::error::{Result, ServiceError};

type Document = Map<String, Value>;

pub struct JsonFileStore {
    dir: PathBuf,
    /// 串行化进程内的读-改-写
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    fn path_for(&self, namespace: &str) -> PathBuf {
        self.dir.join(format!("{namespace}.json"))
    }

    /// 读取命名空间文档，文件不存在视为空文档
    async fn read_document(&self, namespace: &str) -> Result<Document> {
        let path = self.path_for(namespace);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Document::new()),
            Err(e) => return Err(ServiceError::io(path.display().to_string(), e)),
        };

        match serde_json::from_slice::<Value>(&raw) {
            Ok(Value::Object(document)) => Ok(document),
            Ok(_) => Err(ServiceError::CorruptDocument {
                namespace: namespace.to_string(),
                message: "顶层必须是 JSON 对象".to_string(),
            }),
            Err(e) => Err(ServiceError::CorruptDocument {
                namespace: namespace.to_string(),
                message: e.to_string(),
            }),
        }
    }

    async fn write_document(&self, namespace: &str, document: &Document) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ServiceError::io(self.dir.display().to_string(), e))?;

        let path = self.path_for(namespace);
        let tmp_path = self
            .dir
            .join(format!("{namespace}.json.{}.tmp", std::process::id()));
        let body = serde_json::to_vec_pretty(document).map_err(|e| {
            ServiceError::CorruptDocument {
                namespace: namespace.to_string(),
                message: e.to_string(),
            }
        })?;

        tokio::fs::write(&tmp_path, body)
            .await
            .map_err(|e| ServiceError::io(tmp_path.display().to_string(), e))?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| ServiceError::io(path.display().to_string(), e))?;

        debug!(namespace, path = %path.display(), "设置文档已落盘");
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for JsonFileStore {
    #[instrument(skip(self))]
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>> {
        let mut document = self.read_document(namespace).await?;
        Ok(document.remove(key))
    }

    #[instrument(skip(self, value))]
    async fn put(&self, namespace: &str, key: &str, value: Value) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read_document(namespace).await?;
        document.insert(key.to_string(), value);
        self.write_document(namespace, &document).await
    }

    async fn keys(&self, namespace: &str) -> Result<Vec<String>> {
        let document = self.read_document(namespace).await?;
        Ok(document.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();

        let store = JsonFileStore::new(dir.path());
        store.put("watermarks", "g1", json!(42)).await.unwrap();
        store.put("watermarks", "g2", json!(7)).await.unwrap();

        // 新实例从磁盘重新加载
        let reopened = JsonFileStore::new(dir.path());
        assert_eq!(reopened.get("watermarks", "g1").await.unwrap(), Some(json!(42)));
        assert_eq!(
            reopened.keys("watermarks").await.unwrap(),
            vec!["g1".to_string(), "g2".to_string()]
        );
        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_put_keeps_entries_written_by_other_instance() {
        let dir = tempfile::tempdir().unwrap();
        let first = JsonFileStore::new(dir.path());
        let second = JsonFileStore::new(dir.path());

        first.put("members", "g1", json!(["a"])).await.unwrap();
        second.put("members", "g2", json!(["b"])).await.unwrap();
        first.put("members", "g3", json!(["c"])).await.unwrap();

        let reopened = JsonFileStore::new(dir.path());
        assert_eq!(
            reopened.keys("members").await.unwrap(),
            vec!["g1".to_string(), "g2".to_string(), "g3".to_string()]
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("not-yet-created"));

        assert_eq!(store.get("members", "g1").await.unwrap(), None);
        assert!(store.keys("members").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reads_legacy_document() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("steam_info.json"),
            r#"{"1001": ["76561198000000001", "76561198000000002"]}"#,
        )
        .unwrap();

        let store = JsonFileStore::new(dir.path());
        assert_eq!(
            store.get("steam_info", "1001").await.unwrap(),
            Some(json!(["76561198000000001", "76561198000000002"]))
        );
    }

    #[tokio::test]
    async fn test_corrupt_document_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("watermarks.json"), "[1, 2, 3]").unwrap();

        let store = JsonFileStore::new(dir.path());
        let result = store.get("watermarks", "g1").await;
        assert!(matches!(result, Err(ServiceError::CorruptDocument { .. })));
    }
}
