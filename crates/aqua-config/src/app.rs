use crate::error::Result;
use aqua_notify::NotifierConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub alert: AlertConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
}

/// 告警配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// 同一池同一传感器两次告警的最小间隔（分钟）
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: i64,

    /// 单个目标的投递超时（毫秒）
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,

    /// 投递目标
    #[serde(default)]
    pub destinations: Vec<String>,

    #[serde(default)]
    pub notifier: NotifierConfig,
}

/// 水质分类服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_classifier_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// 定时分类任务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// 单个池分类的超时（秒）
    #[serde(default = "default_pool_timeout_secs")]
    pub pool_timeout_secs: u64,
}

/// 限值文件配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_limits_path")]
    pub path: PathBuf,

    /// 文件变更时热加载
    #[serde(default = "default_true")]
    pub watch: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

// 默认值函数
fn default_true() -> bool {
    true
}

fn default_database_url() -> String {
    "sqlite://aqua.db?mode=rwc".to_string()
}

fn default_cooldown_minutes() -> i64 {
    30
}

fn default_send_timeout_ms() -> u64 {
    5000
}

fn default_classifier_endpoint() -> String {
    "http://localhost:8000/predict".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_interval_secs() -> u64 {
    300
}

fn default_pool_timeout_secs() -> u64 {
    30
}

fn default_limits_path() -> PathBuf {
    PathBuf::from("config/limits.toml")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cooldown_minutes: default_cooldown_minutes(),
            send_timeout_ms: default_send_timeout_ms(),
            destinations: Vec::new(),
            notifier: NotifierConfig::default(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: default_classifier_endpoint(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_interval_secs(),
            pool_timeout_secs: default_pool_timeout_secs(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            path: default_limits_path(),
            watch: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AlertConfig {
    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.cooldown_minutes)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

impl ClassifierConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn pool_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_timeout_secs)
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// 文件不存在时使用默认配置；文件存在但无法解析仍然报错
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("Config file {:?} not found, using default configuration", path);
            return Ok(Self::default());
        }
        Self::load(path)
    }
}
