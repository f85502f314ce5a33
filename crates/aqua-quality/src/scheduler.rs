use crate::classifier::ClassifierOrchestrator;
use crate::error::{QualityError, Result};
use aqua_types::{PoolId, QualityClassification};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{error, info, warn};

/// 单个池在一次调度中的结果
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PoolOutcome {
    Classified { classification: QualityClassification },
    Failed { error: String },
    TimedOut,
}

impl PoolOutcome {
    pub fn is_classified(&self) -> bool {
        matches!(self, PoolOutcome::Classified { .. })
    }
}

/// 一次调度的汇总
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickReport {
    pub outcomes: Vec<(PoolId, PoolOutcome)>,
}

impl TickReport {
    pub fn outcome(&self, pool_id: PoolId) -> Option<&PoolOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| *id == pool_id)
            .map(|(_, outcome)| outcome)
    }

    pub fn classified(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_classified()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.classified()
    }
}

/// 定时水质分类调度器
pub struct QualityScheduler {
    orchestrator: Arc<ClassifierOrchestrator>,
    period: Duration,
    pool_timeout: Duration,
}

/// 调度任务句柄
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    join_handle: JoinHandle<()>,
}

impl SchedulerHandle {
    /// 等待当前一轮结束后退出
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.join_handle.await;
    }

    pub fn abort(self) {
        self.join_handle.abort();
    }
}

impl QualityScheduler {
    /// 默认调度周期（5 分钟）
    pub const DEFAULT_PERIOD: Duration = Duration::from_secs(300);

    pub fn new(
        orchestrator: Arc<ClassifierOrchestrator>,
        period: Duration,
        pool_timeout: Duration,
    ) -> Self {
        Self {
            orchestrator,
            period,
            pool_timeout,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// 执行一轮：并发分类所有池
    ///
    /// 每个池独立 spawn 并受超时约束，一个池失败不影响其他池。
    /// 只有列举池失败时返回错误。
    pub async fn run_tick(&self) -> Result<TickReport> {
        let pool_ids = self.orchestrator.store().list_pool_ids().await?;

        let tasks: Vec<(PoolId, JoinHandle<PoolOutcome>)> = pool_ids
            .into_iter()
            .map(|pool_id| {
                let orchestrator = self.orchestrator.clone();
                let pool_timeout = self.pool_timeout;
                let task = tokio::spawn(async move {
                    match timeout(pool_timeout, orchestrator.classify(pool_id)).await {
                        Ok(Ok(classification)) => PoolOutcome::Classified { classification },
                        Ok(Err(e)) => {
                            warn!(pool_id = pool_id, error = %e, "Scheduled classification failed");
                            PoolOutcome::Failed {
                                error: e.to_string(),
                            }
                        }
                        Err(_) => {
                            warn!(
                                pool_id = pool_id,
                                error = %QualityError::Timeout(pool_timeout),
                                "Scheduled classification timed out"
                            );
                            PoolOutcome::TimedOut
                        }
                    }
                });
                (pool_id, task)
            })
            .collect();

        let mut report = TickReport::default();
        for (pool_id, task) in tasks {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(pool_id = pool_id, error = %e, "Classification task panicked");
                    PoolOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            report.outcomes.push((pool_id, outcome));
        }

        info!(
            pools = report.outcomes.len(),
            classified = report.classified(),
            failed = report.failed(),
            "Classification tick finished"
        );

        Ok(report)
    }

    /// 启动后台调度任务
    pub fn start(self: Arc<Self>) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let join_handle = tokio::spawn(async move {
            info!(period = ?self.period, "Starting classification scheduler");

            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.run_tick().await {
                            error!(error = %e, "Classification tick failed");
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Classification scheduler stopped");
        });

        SchedulerHandle {
            shutdown_tx,
            join_handle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Prediction, PredictionRequest, Predictor};
    use crate::store::{MemoryReadingStore, ReadingStore};
    use aqua_types::{QualityLabel, Reading, SensorType};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 通过 pH 值区分池：7.0 失败，8.0 挂起，其他成功
    struct PhKeyedPredictor {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Predictor for PhKeyedPredictor {
        async fn predict(&self, request: &PredictionRequest) -> Result<Prediction> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match request.ph {
                Some(ph) if ph == 7.0 => Err(QualityError::Upstream("HTTP 500".to_string())),
                Some(ph) if ph == 8.0 => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(QualityError::Upstream("unreachable".to_string()))
                }
                _ => Ok(Prediction {
                    quality: QualityLabel::Good,
                    probability_excellent: 0.2,
                    probability_good: 0.7,
                    probability_poor: 0.1,
                }),
            }
        }

        fn endpoint(&self) -> &str {
            "ph-keyed"
        }
    }

    async fn setup(pools: &[(PoolId, f64)]) -> (Arc<MemoryReadingStore>, Arc<PhKeyedPredictor>, QualityScheduler) {
        let store = Arc::new(MemoryReadingStore::new());
        for (pool_id, ph) in pools {
            store.add_pool(*pool_id).await;
            store
                .record_reading(Reading::new(*pool_id, SensorType::Ph, *ph))
                .await
                .unwrap();
        }
        let predictor = Arc::new(PhKeyedPredictor {
            calls: AtomicUsize::new(0),
        });
        let orchestrator = Arc::new(ClassifierOrchestrator::new(store.clone(), predictor.clone()));
        let scheduler =
            QualityScheduler::new(orchestrator, Duration::from_secs(300), Duration::from_secs(30));
        (store, predictor, scheduler)
    }

    #[tokio::test]
    async fn test_failing_pool_does_not_affect_others() {
        let (store, _, scheduler) = setup(&[(1, 7.0), (2, 7.5)]).await;

        let report = scheduler.run_tick().await.unwrap();

        assert!(matches!(report.outcome(1), Some(PoolOutcome::Failed { .. })));
        assert!(report.outcome(2).unwrap().is_classified());
        assert!(store.latest_classification(1).await.unwrap().is_none());
        assert!(store.latest_classification(2).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_pool_times_out() {
        let (store, _, scheduler) = setup(&[(1, 8.0), (2, 7.5), (3, 7.0)]).await;

        let report = scheduler.run_tick().await.unwrap();

        assert!(matches!(report.outcome(1), Some(PoolOutcome::TimedOut)));
        assert!(report.outcome(2).unwrap().is_classified());
        assert!(matches!(report.outcome(3), Some(PoolOutcome::Failed { .. })));
        assert_eq!(report.classified(), 1);
        assert_eq!(report.failed(), 2);
        assert_eq!(store.classification_count().await, 1);
    }

    #[tokio::test]
    async fn test_empty_store_tick() {
        let (_, predictor, scheduler) = setup(&[]).await;
        let report = scheduler.run_tick().await.unwrap();
        assert!(report.outcomes.is_empty());
        assert_eq!(predictor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_runs_periodically_and_shuts_down() {
        let (store, predictor, scheduler) = setup(&[(1, 7.5)]).await;
        let handle = Arc::new(scheduler).start();

        // 第一次 tick 立即触发
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(predictor.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(predictor.calls.load(Ordering::SeqCst), 2);

        handle.shutdown().await;
        tokio::time::sleep(Duration::from_secs(900)).await;
        assert_eq!(predictor.calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.classification_count().await, 2);
    }
}
