use crate::error::{QualityError, Result};
use aqua_types::{PoolId, QualityClassification, QualityLabel, Reading, SensorType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, QueryResult, Statement, Value,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// 读数存储 trait
///
/// 读数由采集入口写入，本模块只读取；分类结果由分类编排器写入。
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// 某池某传感器的最新读数
    async fn find_latest(&self, pool_id: PoolId, sensor_type: SensorType)
        -> Result<Option<Reading>>;

    /// 养殖池是否存在
    async fn pool_exists(&self, pool_id: PoolId) -> Result<bool>;

    /// 所有养殖池 ID（升序）
    async fn list_pool_ids(&self) -> Result<Vec<PoolId>>;

    /// 追加一条分类结果，返回带 ID 的记录
    async fn save_classification(
        &self,
        classification: &QualityClassification,
    ) -> Result<QualityClassification>;

    /// 最近一次分类结果
    async fn latest_classification(&self, pool_id: PoolId)
        -> Result<Option<QualityClassification>>;

    /// 分类历史（新到旧）
    async fn classification_history(
        &self,
        pool_id: PoolId,
        limit: usize,
    ) -> Result<Vec<QualityClassification>>;
}

/// SQL 存储实现（SQLite / PostgreSQL）
pub struct SqlReadingStore {
    db: Arc<DatabaseConnection>,
}

impl SqlReadingStore {
    /// 连接数据库
    pub async fn connect(database_url: &str) -> Result<Self> {
        let db = Database::connect(database_url).await?;

        info!(
            backend = ?db.get_database_backend(),
            "Connected to reading store"
        );

        Ok(Self { db: Arc::new(db) })
    }

    pub fn from_connection(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// 获取数据库连接
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    fn backend(&self) -> DatabaseBackend {
        self.db.get_database_backend()
    }

    /// 按后端生成第 `idx` 个占位符
    fn param(&self, idx: usize) -> String {
        match self.backend() {
            DatabaseBackend::Postgres => format!("${}", idx),
            _ => "?".to_string(),
        }
    }

    fn statement(&self, sql: String, values: Vec<Value>) -> Statement {
        Statement::from_sql_and_values(self.backend(), sql, values)
    }

    /// 建表（已存在则跳过）
    pub async fn ensure_schema(&self) -> Result<()> {
        let ddl: &[&str] = match self.backend() {
            DatabaseBackend::Postgres => &[
                r#"
                CREATE TABLE IF NOT EXISTS pools (
                    id BIGSERIAL PRIMARY KEY,
                    name TEXT NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS sensor_readings (
                    id BIGSERIAL PRIMARY KEY,
                    pool_id BIGINT NOT NULL REFERENCES pools(id),
                    sensor_type TEXT NOT NULL,
                    value DOUBLE PRECISION NOT NULL,
                    recorded_at TIMESTAMPTZ NOT NULL
                )
                "#,
                r#"
                CREATE INDEX IF NOT EXISTS idx_sensor_readings_latest
                    ON sensor_readings (pool_id, sensor_type, recorded_at DESC)
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS water_quality_classifications (
                    id BIGSERIAL PRIMARY KEY,
                    pool_id BIGINT NOT NULL REFERENCES pools(id),
                    quality TEXT NOT NULL,
                    probability_excellent DOUBLE PRECISION NOT NULL,
                    probability_good DOUBLE PRECISION NOT NULL,
                    probability_poor DOUBLE PRECISION NOT NULL,
                    classified_at TIMESTAMPTZ NOT NULL
                )
                "#,
            ],
            _ => &[
                r#"
                CREATE TABLE IF NOT EXISTS pools (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS sensor_readings (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    pool_id INTEGER NOT NULL REFERENCES pools(id),
                    sensor_type TEXT NOT NULL,
                    value REAL NOT NULL,
                    recorded_at DATETIME NOT NULL
                )
                "#,
                r#"
                CREATE INDEX IF NOT EXISTS idx_sensor_readings_latest
                    ON sensor_readings (pool_id, sensor_type, recorded_at DESC)
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS water_quality_classifications (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    pool_id INTEGER NOT NULL REFERENCES pools(id),
                    quality TEXT NOT NULL,
                    probability_excellent REAL NOT NULL,
                    probability_good REAL NOT NULL,
                    probability_poor REAL NOT NULL,
                    classified_at DATETIME NOT NULL
                )
                "#,
            ],
        };

        for sql in ddl {
            self.db
                .execute(Statement::from_string(self.backend(), sql.to_string()))
                .await?;
        }

        info!("Reading store schema ready");
        Ok(())
    }

    /// 新建养殖池，返回 ID
    pub async fn add_pool(&self, name: &str) -> Result<PoolId> {
        let sql = format!(
            "INSERT INTO pools (name) VALUES ({}) RETURNING id",
            self.param(1)
        );
        let row = self
            .db
            .query_one(self.statement(sql, vec![name.into()]))
            .await?
            .ok_or_else(|| QualityError::Store("insert returned no id".to_string()))?;

        let id: i64 = row.try_get("", "id")?;
        debug!(pool_id = id, name = %name, "Pool created");
        Ok(id)
    }

    /// 写入一条读数
    pub async fn record_reading(&self, reading: &Reading) -> Result<()> {
        let sql = format!(
            "INSERT INTO sensor_readings (pool_id, sensor_type, value, recorded_at) VALUES ({}, {}, {}, {})",
            self.param(1),
            self.param(2),
            self.param(3),
            self.param(4)
        );
        let stmt = self.statement(
            sql,
            vec![
                reading.pool_id.into(),
                reading.sensor_type.as_str().into(),
                reading.value.into(),
                reading.timestamp.into(),
            ],
        );
        self.db.execute(stmt).await?;

        debug!(
            pool_id = reading.pool_id,
            sensor_type = %reading.sensor_type,
            value = reading.value,
            "Reading written"
        );
        Ok(())
    }

    fn classification_from_row(row: &QueryResult) -> Result<QualityClassification> {
        let quality: String = row.try_get("", "quality")?;
        let quality: QualityLabel = quality
            .parse()
            .map_err(|e| QualityError::Store(format!("{}", e)))?;

        Ok(QualityClassification {
            id: Some(row.try_get("", "id")?),
            pool_id: row.try_get("", "pool_id")?,
            quality,
            probability_excellent: row.try_get("", "probability_excellent")?,
            probability_good: row.try_get("", "probability_good")?,
            probability_poor: row.try_get("", "probability_poor")?,
            timestamp: row.try_get::<DateTime<Utc>>("", "classified_at")?,
        })
    }
}

#[async_trait]
impl ReadingStore for SqlReadingStore {
    async fn find_latest(
        &self,
        pool_id: PoolId,
        sensor_type: SensorType,
    ) -> Result<Option<Reading>> {
        let sql = format!(
            "SELECT value, recorded_at FROM sensor_readings WHERE pool_id = {} AND sensor_type = {} ORDER BY recorded_at DESC, id DESC LIMIT 1",
            self.param(1),
            self.param(2)
        );
        let stmt = self.statement(sql, vec![pool_id.into(), sensor_type.as_str().into()]);

        let Some(row) = self.db.query_one(stmt).await? else {
            return Ok(None);
        };

        Ok(Some(Reading {
            pool_id,
            sensor_type,
            value: row.try_get("", "value")?,
            timestamp: row.try_get::<DateTime<Utc>>("", "recorded_at")?,
        }))
    }

    async fn pool_exists(&self, pool_id: PoolId) -> Result<bool> {
        let sql = format!("SELECT id FROM pools WHERE id = {}", self.param(1));
        let row = self
            .db
            .query_one(self.statement(sql, vec![pool_id.into()]))
            .await?;
        Ok(row.is_some())
    }

    async fn list_pool_ids(&self) -> Result<Vec<PoolId>> {
        let rows = self
            .db
            .query_all(Statement::from_string(
                self.backend(),
                "SELECT id FROM pools ORDER BY id".to_string(),
            ))
            .await?;

        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(row.try_get::<i64>("", "id")?);
        }
        Ok(ids)
    }

    async fn save_classification(
        &self,
        classification: &QualityClassification,
    ) -> Result<QualityClassification> {
        let sql = format!(
            r#"
            INSERT INTO water_quality_classifications
                (pool_id, quality, probability_excellent, probability_good, probability_poor, classified_at)
            VALUES ({}, {}, {}, {}, {}, {})
            RETURNING id
            "#,
            self.param(1),
            self.param(2),
            self.param(3),
            self.param(4),
            self.param(5),
            self.param(6)
        );
        let stmt = self.statement(
            sql,
            vec![
                classification.pool_id.into(),
                classification.quality.as_str().into(),
                classification.probability_excellent.into(),
                classification.probability_good.into(),
                classification.probability_poor.into(),
                classification.timestamp.into(),
            ],
        );

        let row = self
            .db
            .query_one(stmt)
            .await?
            .ok_or_else(|| QualityError::Store("insert returned no id".to_string()))?;

        let mut saved = classification.clone();
        saved.id = Some(row.try_get("", "id")?);

        debug!(
            pool_id = saved.pool_id,
            quality = %saved.quality,
            "Classification persisted"
        );

        Ok(saved)
    }

    async fn latest_classification(
        &self,
        pool_id: PoolId,
    ) -> Result<Option<QualityClassification>> {
        Ok(self.classification_history(pool_id, 1).await?.into_iter().next())
    }

    async fn classification_history(
        &self,
        pool_id: PoolId,
        limit: usize,
    ) -> Result<Vec<QualityClassification>> {
        let sql = format!(
            r#"
            SELECT id, pool_id, quality, probability_excellent, probability_good, probability_poor, classified_at
            FROM water_quality_classifications
            WHERE pool_id = {}
            ORDER BY classified_at DESC, id DESC
            LIMIT {}
            "#,
            self.param(1),
            self.param(2)
        );
        let stmt = self.statement(sql, vec![pool_id.into(), (limit as i64).into()]);

        let rows = self.db.query_all(stmt).await?;
        rows.iter().map(Self::classification_from_row).collect()
    }
}

#[derive(Default)]
struct MemoryState {
    pools: BTreeSet<PoolId>,
    readings: HashMap<(PoolId, SensorType), Vec<Reading>>,
    classifications: Vec<QualityClassification>,
    next_classification_id: i64,
}

/// 内存存储实现
#[derive(Default)]
pub struct MemoryReadingStore {
    state: RwLock<MemoryState>,
}

impl MemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_pool(&self, pool_id: PoolId) {
        self.state.write().await.pools.insert(pool_id);
    }

    /// 写入一条读数；池不存在时返回 NotFound
    pub async fn record_reading(&self, reading: Reading) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.pools.contains(&reading.pool_id) {
            return Err(QualityError::NotFound(reading.pool_id));
        }
        state
            .readings
            .entry((reading.pool_id, reading.sensor_type))
            .or_default()
            .push(reading);
        Ok(())
    }

    /// 所有已保存的分类结果数
    pub async fn classification_count(&self) -> usize {
        self.state.read().await.classifications.len()
    }
}

#[async_trait]
impl ReadingStore for MemoryReadingStore {
    async fn find_latest(
        &self,
        pool_id: PoolId,
        sensor_type: SensorType,
    ) -> Result<Option<Reading>> {
        let state = self.state.read().await;
        Ok(state
            .readings
            .get(&(pool_id, sensor_type))
            .and_then(|series| series.iter().max_by_key(|r| r.timestamp))
            .cloned())
    }

    async fn pool_exists(&self, pool_id: PoolId) -> Result<bool> {
        Ok(self.state.read().await.pools.contains(&pool_id))
    }

    async fn list_pool_ids(&self) -> Result<Vec<PoolId>> {
        Ok(self.state.read().await.pools.iter().copied().collect())
    }

    async fn save_classification(
        &self,
        classification: &QualityClassification,
    ) -> Result<QualityClassification> {
        let mut state = self.state.write().await;
        state.next_classification_id += 1;

        let mut saved = classification.clone();
        saved.id = Some(state.next_classification_id);
        state.classifications.push(saved.clone());
        Ok(saved)
    }

    async fn latest_classification(
        &self,
        pool_id: PoolId,
    ) -> Result<Option<QualityClassification>> {
        Ok(self.classification_history(pool_id, 1).await?.into_iter().next())
    }

    async fn classification_history(
        &self,
        pool_id: PoolId,
        limit: usize,
    ) -> Result<Vec<QualityClassification>> {
        let state = self.state.read().await;
        Ok(state
            .classifications
            .iter()
            .rev()
            .filter(|c| c.pool_id == pool_id)
            .take(limit)
            .cloned()
            .collect())
    }
}
