use crate::clock::{Clock, SystemClock};
use aqua_types::AlertKey;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

type Slot = Arc<Mutex<Option<DateTime<Utc>>>>;

/// 告警冷却跟踪器
///
/// 以 (传感器类型, 池) 为键记录上次告警时间，冷却窗口内的重复告警被抑制。
/// 每个键一把锁：`acquire` 取得的守卫在检查与记录之间一直持有，
/// 同一键的并发评估不会都通过检查。
pub struct CooldownTracker {
    entries: DashMap<AlertKey, Slot>,
    cooldown: Duration,
    clock: Arc<dyn Clock>,
}

impl CooldownTracker {
    /// 默认冷却窗口
    pub const DEFAULT_COOLDOWN_MINUTES: i64 = 30;

    pub fn new(cooldown: Duration) -> Self {
        Self::with_clock(cooldown, Arc::new(SystemClock))
    }

    pub fn with_clock(cooldown: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            cooldown,
            clock,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    fn slot(&self, key: AlertKey) -> Slot {
        self.entries
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    fn is_clear(&self, last_sent_at: Option<DateTime<Utc>>) -> bool {
        match last_sent_at {
            Some(last) => self.clock.now() - last > self.cooldown,
            None => true,
        }
    }

    /// 是否允许告警（只读）
    pub async fn can_alert(&self, key: AlertKey) -> bool {
        let slot = match self.entries.get(&key) {
            Some(entry) => entry.value().clone(),
            None => return true,
        };
        let last = *slot.lock().await;
        self.is_clear(last)
    }

    /// 记录一次告警
    pub async fn record_alert(&self, key: AlertKey) {
        let slot = self.slot(key);
        *slot.lock().await = Some(self.clock.now());
    }

    /// 上次告警时间
    pub async fn last_sent_at(&self, key: AlertKey) -> Option<DateTime<Utc>> {
        let slot = self.entries.get(&key).map(|entry| entry.value().clone())?;
        let last = *slot.lock().await;
        last
    }

    /// 锁定一个键，用于“检查后记录”的原子操作
    pub async fn acquire(self: &Arc<Self>, key: AlertKey) -> CooldownGuard {
        let guard = self.slot(key).lock_owned().await;
        CooldownGuard {
            key,
            guard,
            tracker: self.clone(),
        }
    }

    /// 已记录的键数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CooldownTracker {
    fn default() -> Self {
        Self::new(Duration::minutes(Self::DEFAULT_COOLDOWN_MINUTES))
    }
}

/// 单个键的冷却锁守卫
pub struct CooldownGuard {
    key: AlertKey,
    guard: OwnedMutexGuard<Option<DateTime<Utc>>>,
    tracker: Arc<CooldownTracker>,
}

impl CooldownGuard {
    pub fn key(&self) -> AlertKey {
        self.key
    }

    pub fn can_alert(&self) -> bool {
        self.tracker.is_clear(*self.guard)
    }

    /// 记录告警并释放锁
    pub fn record(mut self) {
        let now = self.tracker.clock.now();
        *self.guard = Some(now);
        debug!(
            sensor_type = %self.key.sensor_type,
            pool_id = self.key.pool_id,
            "Alert cooldown recorded"
        );
    }
}
