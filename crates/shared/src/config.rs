//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 上游 API（Steam Web API）配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub api_key: String,
    /// 单次 HTTP 请求超时
    pub timeout_ms: u64,
    /// 瞬时故障的重试次数（不含首次请求）
    pub max_retries: u32,
    /// 两次重试之间的固定间隔
    pub retry_delay_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.steampowered.com".to_string(),
            api_key: String::new(),
            timeout_ms: 4_000,
            max_retries: 2,
            retry_delay_ms: 500,
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// 比赛播报调度配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TickerConfig {
    pub poll_interval_secs: u64,
    pub delivery_interval_secs: u64,
    /// 轮询端与投递端之间通道的容量
    pub queue_capacity: usize,
    /// 同一轮询周期内并发解析的群组数
    pub group_concurrency: usize,
    /// 为 true 时，队列中仍有未投递的报告则跳过本轮轮询
    pub skip_when_backlogged: bool,
    /// 参考数据目录（heroes.json 等），为空时只使用内置表
    pub reference_dir: Option<PathBuf>,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            delivery_interval_secs: 60,
            queue_capacity: 256,
            group_concurrency: 4,
            skip_when_backlogged: false,
            reference_dir: None,
        }
    }
}

impl TickerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn delivery_interval(&self) -> Duration {
        Duration::from_secs(self.delivery_interval_secs)
    }
}

/// 设置存储后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingsBackend {
    File,
    Redis,
    Memory,
}

/// 设置存储配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    pub backend: SettingsBackend,
    /// file 后端的数据目录，每个命名空间一个 JSON 文件
    pub data_dir: PathBuf,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            backend: SettingsBackend::File,
            data_dir: PathBuf::from("data"),
        }
    }
}

/// Redis 配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
    pub key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            key_prefix: "match-ticker".to_string(),
        }
    }
}

/// 投递渠道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// 仅写日志，用于本地开发
    Log,
    Discord,
}

/// 投递配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub transport: TransportKind,
    pub discord_api_base: String,
    pub discord_token: String,
    pub timeout_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Log,
            discord_api_base: "https://discord.com/api/v10".to_string(),
            discord_token: String::new(),
            timeout_ms: 10_000,
        }
    }
}

/// 可观测性配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// 是否输出 JSON 结构化日志
    pub json_logs: bool,
    pub metrics_enabled: bool,
    pub metrics_port: u16,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_port: 9090,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub upstream: UpstreamConfig,
    pub ticker: TickerConfig,
    pub settings: SettingsConfig,
    pub redis: RedisConfig,
    pub delivery: DeliveryConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. config/{service_name}.toml（服务特定配置）
    /// 4. 环境变量（TICKER_ 前缀，层级用双下划线，如 TICKER_UPSTREAM__API_KEY -> upstream.api_key）
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        // .env 文件不存在时忽略
        let _ = dotenvy::dotenv();

        let env = std::env::var("TICKER_ENV").unwrap_or_else(|_| "development".to_string());
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        Self::load_from(service_name, &env, Path::new(&config_dir))
    }

    fn load_from(service_name: &str, env: &str, config_dir: &Path) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{env}.toml"))).required(false))
            .add_source(
                File::from(config_dir.join(format!("{service_name}.toml"))).required(false),
            )
            .add_source(
                Environment::with_prefix("TICKER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }
}
