use crate::limits::LimitsRegistry;
use aqua_types::{AlertDirection, AlertKey, PoolId, SensorType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 越限告警描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertDescriptor {
    pub pool_id: PoolId,
    pub sensor_type: SensorType,
    pub display_name: String,
    pub value: f64,
    pub min: f64,
    pub max: f64,
    pub unit: String,
    pub direction: AlertDirection,
}

impl AlertDescriptor {
    pub fn key(&self) -> AlertKey {
        AlertKey::new(self.sensor_type, self.pool_id)
    }

    /// 被突破的边界
    pub fn violated_bound(&self) -> f64 {
        match self.direction {
            AlertDirection::TooLow => self.min,
            AlertDirection::TooHigh => self.max,
        }
    }
}

/// 阈值评估器
///
/// 无副作用，可并发调用。
#[derive(Clone)]
pub struct ThresholdEvaluator {
    limits: Arc<LimitsRegistry>,
}

impl ThresholdEvaluator {
    pub fn new(limits: Arc<LimitsRegistry>) -> Self {
        Self { limits }
    }

    /// 评估一个读数
    ///
    /// 范围包含边界：`min <= value <= max` 时不告警。
    /// 未配置限值的传感器总是返回 `None`。
    pub fn evaluate(
        &self,
        sensor_type: SensorType,
        value: f64,
        pool_id: PoolId,
    ) -> Option<AlertDescriptor> {
        let limit = self.limits.get_limits(sensor_type)?;

        // NaN 不与任何边界可比，不告警
        if limit.contains(value) || value.is_nan() {
            return None;
        }
        let direction = if value < limit.min {
            AlertDirection::TooLow
        } else {
            AlertDirection::TooHigh
        };

        Some(AlertDescriptor {
            pool_id,
            sensor_type,
            display_name: limit.display_name,
            value,
            min: limit.min,
            max: limit.max,
            unit: limit.unit,
            direction,
        })
    }
}
