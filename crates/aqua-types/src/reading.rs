use crate::{PoolId, SensorType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 传感器读数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub pool_id: PoolId,
    pub sensor_type: SensorType,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    pub fn new(pool_id: PoolId, sensor_type: SensorType, value: f64) -> Self {
        Self {
            pool_id,
            sensor_type,
            value,
            timestamp: Utc::now(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// 传感器安全范围
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorLimit {
    pub sensor_type: SensorType,
    pub min: f64,
    pub max: f64,
    pub unit: String,
    pub display_name: String,
}

impl SensorLimit {
    /// 使用传感器类型的默认单位和显示名称
    pub fn new(sensor_type: SensorType, min: f64, max: f64) -> Self {
        Self {
            sensor_type,
            min,
            max,
            unit: sensor_type.default_unit().to_string(),
            display_name: sensor_type.default_display_name().to_string(),
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// 边界值视为安全
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// 越限方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertDirection {
    TooLow,
    TooHigh,
}

/// 告警冷却键
///
/// 不区分越限方向：同一池同一传感器的过低和过高告警共享一个冷却窗口。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlertKey {
    pub sensor_type: SensorType,
    pub pool_id: PoolId,
}

impl AlertKey {
    pub fn new(sensor_type: SensorType, pool_id: PoolId) -> Self {
        Self {
            sensor_type,
            pool_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_contains_is_inclusive() {
        let limit = SensorLimit::new(SensorType::Ph, 6.5, 8.5);
        assert!(limit.contains(6.5));
        assert!(limit.contains(8.5));
        assert!(limit.contains(7.2));
        assert!(!limit.contains(6.49));
        assert!(!limit.contains(8.51));
    }

    #[test]
    fn test_limit_defaults_from_sensor_type() {
        let limit = SensorLimit::new(SensorType::DissolvedOxygen, 5.0, 12.0);
        assert_eq!(limit.unit, "mg/L");
        assert_eq!(limit.display_name, "Dissolved Oxygen");

        let limit = limit.with_unit("ppm").with_display_name("DO");
        assert_eq!(limit.unit, "ppm");
        assert_eq!(limit.display_name, "DO");
    }
}
