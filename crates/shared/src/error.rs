//! 统一错误处理模块
//!
//! 定义基础设施层（配置、设置存储、Redis、文件 IO）共享的错误类型，
//! 使用 thiserror 提供良好的错误信息。

use thiserror::Error;

/// 基础设施错误类型
#[derive(Debug, Error)]
pub enum ServiceError {
    // ==================== 配置错误 ====================
    #[error("配置加载失败: {0}")]
    Config(#[from] config::ConfigError),

    // ==================== 存储错误 ====================
    #[error("Redis 错误: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("文件读写失败: {path} - {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("设置序列化失败: namespace={namespace} key={key} - {message}")]
    Serialization {
        namespace: String,
        key: String,
        message: String,
    },

    #[error("设置文档损坏: {namespace} - {message}")]
    CorruptDocument { namespace: String, message: String },

    // ==================== 通用错误 ====================
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, ServiceError>;

impl ServiceError {
    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ServiceError::CorruptDocument {
            namespace: "watermarks".to_string(),
            message: "expected object".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "设置文档损坏: watermarks - expected object"
        );

        let io = ServiceError::io(
            "/tmp/x.json",
            std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        );
        assert_eq!(io.to_string(), "文件读写失败: /tmp/x.json - disk full");
    }
}
