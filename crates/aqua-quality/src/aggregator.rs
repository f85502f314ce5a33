use crate::error::{QualityError, Result};
use crate::store::ReadingStore;
use aqua_types::{PoolId, Reading, SensorType};
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// 养殖池快照：每种传感器的最新读数
///
/// 对每个已知传感器类型都有一项，无读数时为 `None`。
#[derive(Debug, Clone)]
pub struct PoolSnapshot {
    pub pool_id: PoolId,
    pub taken_at: DateTime<Utc>,
    readings: BTreeMap<SensorType, Option<Reading>>,
}

impl PoolSnapshot {
    pub fn new(pool_id: PoolId) -> Self {
        Self {
            pool_id,
            taken_at: Utc::now(),
            readings: SensorType::ALL.iter().map(|s| (*s, None)).collect(),
        }
    }

    pub fn insert(&mut self, reading: Reading) {
        self.readings.insert(reading.sensor_type, Some(reading));
    }

    pub fn get(&self, sensor_type: SensorType) -> Option<&Reading> {
        self.readings.get(&sensor_type).and_then(Option::as_ref)
    }

    /// 最新读数的值
    pub fn value(&self, sensor_type: SensorType) -> Option<f64> {
        self.get(sensor_type).map(|r| r.value)
    }

    pub fn entries(&self) -> impl Iterator<Item = (SensorType, Option<&Reading>)> {
        self.readings.iter().map(|(s, r)| (*s, r.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// 有读数的传感器数量
    pub fn present_count(&self) -> usize {
        self.readings.values().filter(|r| r.is_some()).count()
    }
}

/// 最新读数聚合器
#[derive(Clone)]
pub struct LatestReadingAggregator {
    store: Arc<dyn ReadingStore>,
}

impl LatestReadingAggregator {
    pub fn new(store: Arc<dyn ReadingStore>) -> Self {
        Self { store }
    }

    /// 并发查询每种传感器的最新读数并合并
    ///
    /// 池不存在返回 `NotFound`；任一查询的存储错误使整个快照失败，
    /// 空序列则只是缺项。
    pub async fn snapshot(&self, pool_id: PoolId) -> Result<PoolSnapshot> {
        if !self.store.pool_exists(pool_id).await? {
            return Err(QualityError::NotFound(pool_id));
        }

        let lookups = SensorType::ALL
            .iter()
            .map(|sensor_type| self.store.find_latest(pool_id, *sensor_type));
        let latest = try_join_all(lookups).await?;

        let mut snapshot = PoolSnapshot::new(pool_id);
        for reading in latest.into_iter().flatten() {
            snapshot.insert(reading);
        }

        debug!(
            pool_id = pool_id,
            present = snapshot.present_count(),
            total = snapshot.len(),
            "Pool snapshot built"
        );

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryReadingStore;
    use aqua_types::QualityClassification;
    use async_trait::async_trait;

    async fn store_with_pool(pool_id: PoolId) -> Arc<MemoryReadingStore> {
        let store = Arc::new(MemoryReadingStore::new());
        store.add_pool(pool_id).await;
        store
    }

    #[tokio::test]
    async fn test_snapshot_has_every_sensor_type() {
        let store = store_with_pool(3).await;
        store
            .record_reading(Reading::new(3, SensorType::Ph, 7.4))
            .await
            .unwrap();
        store
            .record_reading(Reading::new(3, SensorType::Temperature, 26.0))
            .await
            .unwrap();

        let snapshot = LatestReadingAggregator::new(store)
            .snapshot(3)
            .await
            .unwrap();

        assert_eq!(snapshot.len(), SensorType::ALL.len());
        assert_eq!(snapshot.present_count(), 2);
        assert_eq!(snapshot.value(SensorType::Ph), Some(7.4));
        assert!(snapshot.get(SensorType::Ammonia).is_none());
        for sensor_type in SensorType::ALL {
            assert!(snapshot.entries().any(|(s, _)| s == sensor_type));
        }
    }

    #[tokio::test]
    async fn test_empty_pool_is_not_an_error() {
        let store = store_with_pool(5).await;
        let snapshot = LatestReadingAggregator::new(store)
            .snapshot(5)
            .await
            .unwrap();
        assert_eq!(snapshot.present_count(), 0);
        assert_eq!(snapshot.len(), SensorType::ALL.len());
    }

    #[tokio::test]
    async fn test_missing_pool_is_not_found() {
        let store = store_with_pool(1).await;
        let err = LatestReadingAggregator::new(store)
            .snapshot(42)
            .await
            .unwrap_err();
        assert!(matches!(err, QualityError::NotFound(42)));
    }

    /// 指定传感器查询失败的存储
    struct BrokenSeriesStore {
        inner: MemoryReadingStore,
        broken: SensorType,
    }

    #[async_trait]
    impl ReadingStore for BrokenSeriesStore {
        async fn find_latest(
            &self,
            pool_id: PoolId,
            sensor_type: SensorType,
        ) -> Result<Option<Reading>> {
            if sensor_type == self.broken {
                return Err(QualityError::Store("disk I/O error".to_string()));
            }
            self.inner.find_latest(pool_id, sensor_type).await
        }

        async fn pool_exists(&self, pool_id: PoolId) -> Result<bool> {
            self.inner.pool_exists(pool_id).await
        }

        async fn list_pool_ids(&self) -> Result<Vec<PoolId>> {
            self.inner.list_pool_ids().await
        }

        async fn save_classification(
            &self,
            classification: &QualityClassification,
        ) -> Result<QualityClassification> {
            self.inner.save_classification(classification).await
        }

        async fn latest_classification(
            &self,
            pool_id: PoolId,
        ) -> Result<Option<QualityClassification>> {
            self.inner.latest_classification(pool_id).await
        }

        async fn classification_history(
            &self,
            pool_id: PoolId,
            limit: usize,
        ) -> Result<Vec<QualityClassification>> {
            self.inner.classification_history(pool_id, limit).await
        }
    }

    #[tokio::test]
    async fn test_store_failure_fails_snapshot() {
        let inner = MemoryReadingStore::new();
        inner.add_pool(1).await;
        let store = Arc::new(BrokenSeriesStore {
            inner,
            broken: SensorType::Nitrite,
        });

        let err = LatestReadingAggregator::new(store)
            .snapshot(1)
            .await
            .unwrap_err();
        assert!(matches!(err, QualityError::Store(_)));
    }
}
