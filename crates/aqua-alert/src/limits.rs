use aqua_config::{ConfigError, ConfigSource, LimitsFile};
use aqua_types::{SensorLimit, SensorType};
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 传感器限值注册表
///
/// 读多写少。重新加载时整表原子替换，读者不会看到半更新的限值。
pub struct LimitsRegistry {
    table: ArcSwap<HashMap<SensorType, SensorLimit>>,
}

impl LimitsRegistry {
    pub fn new(limits: Vec<SensorLimit>) -> Self {
        Self {
            table: ArcSwap::from_pointee(Self::index(limits)),
        }
    }

    /// 从配置源加载，失败即为致命的启动错误
    pub async fn load(source: &dyn ConfigSource<LimitsFile>) -> Result<Self, ConfigError> {
        let limits = aqua_config::load_limits(source).await?;
        Ok(Self::new(limits))
    }

    fn index(limits: Vec<SensorLimit>) -> HashMap<SensorType, SensorLimit> {
        limits.into_iter().map(|l| (l.sensor_type, l)).collect()
    }

    /// 查询限值；未配置时返回 `None`，表示该读数无法告警而非错误
    pub fn get_limits(&self, sensor_type: SensorType) -> Option<SensorLimit> {
        self.table.load().get(&sensor_type).cloned()
    }

    /// 当前限值表快照
    pub fn snapshot(&self) -> Arc<HashMap<SensorType, SensorLimit>> {
        self.table.load_full()
    }

    pub fn len(&self) -> usize {
        self.table.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.load().is_empty()
    }

    /// 整表替换
    pub fn replace(&self, limits: Vec<SensorLimit>) {
        self.table.store(Arc::new(Self::index(limits)));
    }

    /// 重新加载；失败时保留原有限值
    pub async fn reload(&self, source: &dyn ConfigSource<LimitsFile>) -> Result<usize, ConfigError> {
        match aqua_config::load_limits(source).await {
            Ok(limits) => {
                let count = limits.len();
                self.replace(limits);
                info!(count, "Sensor limits reloaded");
                Ok(count)
            }
            Err(e) => {
                warn!(error = %e, "Failed to reload sensor limits, keeping previous table");
                Err(e)
            }
        }
    }

    /// 监听配置源变更并自动重新加载
    pub async fn start_watching(
        self: Arc<Self>,
        source: Arc<dyn ConfigSource<LimitsFile>>,
    ) -> Result<JoinHandle<()>, ConfigError> {
        let mut watcher = source.watch().await?;
        info!("Watching sensor limits for changes");

        Ok(tokio::spawn(async move {
            while watcher.recv().await.is_some() {
                debug!("Sensor limits change detected");
                let _ = self.reload(source.as_ref()).await;
            }
            warn!("Sensor limits watcher closed");
        }))
    }
}
