use anyhow::Context;
use aqua_alert::{
    AlertDispatcher, CooldownTracker, DispatchOutcome, LimitsRegistry, ThresholdEvaluator,
};
use aqua_config::{AppConfig, ConfigError, ConfigSource, FileSource, LimitsFile, SchedulerConfig};
use aqua_notify::build_notifier;
use aqua_quality::{
    ClassifierOrchestrator, HttpPredictor, QualityError, QualityScheduler, ReadingStore,
    SqlReadingStore,
};
use aqua_types::{PoolId, QualityClassification, SensorType};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 养殖池监控服务
///
/// 采集入口写入读数后调用 `on_new_reading`；运维查询与调度器调用分类接口。
pub struct AquaMonitor {
    limits: Arc<LimitsRegistry>,
    limits_source: Arc<dyn ConfigSource<LimitsFile>>,
    evaluator: ThresholdEvaluator,
    dispatcher: Arc<AlertDispatcher>,
    orchestrator: Arc<ClassifierOrchestrator>,
}

impl AquaMonitor {
    pub fn new(
        limits_source: Arc<dyn ConfigSource<LimitsFile>>,
        limits: Arc<LimitsRegistry>,
        dispatcher: Arc<AlertDispatcher>,
        orchestrator: Arc<ClassifierOrchestrator>,
    ) -> Self {
        Self {
            evaluator: ThresholdEvaluator::new(limits.clone()),
            limits,
            limits_source,
            dispatcher,
            orchestrator,
        }
    }

    /// 按应用配置组装所有组件
    ///
    /// 限值加载失败是致命错误。
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let limits_source: Arc<dyn ConfigSource<LimitsFile>> =
            Arc::new(FileSource::<LimitsFile>::new(&config.limits.path));
        let limits = Arc::new(
            LimitsRegistry::load(limits_source.as_ref())
                .await
                .with_context(|| format!("loading sensor limits from {:?}", config.limits.path))?,
        );

        let notifier = build_notifier(&config.alert.notifier)?;
        let cooldown = Arc::new(CooldownTracker::new(config.alert.cooldown()));
        let dispatcher = Arc::new(AlertDispatcher::new(
            notifier,
            config.alert.destinations.clone(),
            cooldown,
            config.alert.send_timeout(),
        ));

        let store = SqlReadingStore::connect(&config.database.url)
            .await
            .context("connecting to reading store")?;
        store.ensure_schema().await?;
        let store: Arc<dyn ReadingStore> = Arc::new(store);

        let predictor = Arc::new(HttpPredictor::new(
            config.classifier.endpoint.clone(),
            config.classifier.request_timeout(),
        ));
        let orchestrator = Arc::new(ClassifierOrchestrator::new(store, predictor));

        info!(
            limits = limits.len(),
            destinations = config.alert.destinations.len(),
            classifier = %config.classifier.endpoint,
            "Aqua monitor initialized"
        );

        Ok(Self::new(limits_source, limits, dispatcher, orchestrator))
    }

    pub fn limits(&self) -> &Arc<LimitsRegistry> {
        &self.limits
    }

    pub fn dispatcher(&self) -> &Arc<AlertDispatcher> {
        &self.dispatcher
    }

    pub fn store(&self) -> &Arc<dyn ReadingStore> {
        self.orchestrator.store()
    }

    /// 新读数入口（不阻塞调用方）
    ///
    /// 评估与告警在后台任务中进行，失败只记日志。
    pub fn on_new_reading(
        self: &Arc<Self>,
        sensor_type: SensorType,
        value: f64,
        pool_id: PoolId,
    ) -> JoinHandle<Option<DispatchOutcome>> {
        let monitor = self.clone();
        tokio::spawn(async move { monitor.handle_reading(sensor_type, value, pool_id).await })
    }

    /// 评估一条读数，越限时分发告警
    pub async fn handle_reading(
        &self,
        sensor_type: SensorType,
        value: f64,
        pool_id: PoolId,
    ) -> Option<DispatchOutcome> {
        let descriptor = self.evaluator.evaluate(sensor_type, value, pool_id)?;

        debug!(
            pool_id = pool_id,
            sensor_type = %sensor_type,
            value = value,
            direction = ?descriptor.direction,
            "Reading out of range"
        );

        Some(self.dispatcher.dispatch(&descriptor).await)
    }

    /// 立即对一个池做分类
    pub async fn trigger_classification(
        &self,
        pool_id: PoolId,
    ) -> Result<QualityClassification, QualityError> {
        self.orchestrator.classify(pool_id).await
    }

    /// 运维“最新水质”查询
    ///
    /// 先尝试重新分类；预测服务失败时退回到最近一次持久化的结果，
    /// 没有历史结果时才返回错误。
    pub async fn latest_classification(
        &self,
        pool_id: PoolId,
    ) -> Result<QualityClassification, QualityError> {
        match self.trigger_classification(pool_id).await {
            Ok(classification) => Ok(classification),
            Err(e) if e.is_upstream() => match self.store().latest_classification(pool_id).await? {
                Some(previous) => {
                    warn!(
                        pool_id = pool_id,
                        error = %e,
                        classified_at = %previous.timestamp,
                        "Prediction unavailable, returning last stored classification"
                    );
                    Ok(previous)
                }
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    /// 重新加载传感器限值
    pub async fn reload_limits(&self) -> Result<usize, ConfigError> {
        self.limits.reload(self.limits_source.as_ref()).await
    }

    /// 监听限值配置变更
    pub async fn watch_limits(&self) -> Result<JoinHandle<()>, ConfigError> {
        self.limits
            .clone()
            .start_watching(self.limits_source.clone())
            .await
    }

    /// 创建分类调度器
    pub fn scheduler(&self, config: &SchedulerConfig) -> QualityScheduler {
        QualityScheduler::new(
            self.orchestrator.clone(),
            config.interval(),
            config.pool_timeout(),
        )
    }
}
