//! 传感器限值配置文件
//!
//! ```toml
//! [[limits]]
//! sensor_type = "ph"
//! min = 6.5
//! max = 8.5
//! ```

use crate::error::{ConfigError, Result};
use crate::source::ConfigSource;
use crate::validator::{ConfigValidator, FnRule, ValidationError};
use aqua_types::{SensorLimit, SensorType};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

/// 必须配置限值的核心传感器
pub const REQUIRED_SENSORS: [SensorType; 5] = [
    SensorType::Ph,
    SensorType::Ammonia,
    SensorType::Nitrite,
    SensorType::DissolvedOxygen,
    SensorType::Temperature,
];

/// 限值配置条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitEntry {
    pub sensor_type: SensorType,
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl LimitEntry {
    pub fn into_limit(self) -> SensorLimit {
        let mut limit = SensorLimit::new(self.sensor_type, self.min, self.max);
        if let Some(unit) = self.unit {
            limit = limit.with_unit(unit);
        }
        if let Some(display_name) = self.display_name {
            limit = limit.with_display_name(display_name);
        }
        limit
    }
}

/// 限值配置文件
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LimitsFile {
    #[serde(default)]
    pub limits: Vec<LimitEntry>,
}

impl LimitsFile {
    pub fn new(limits: Vec<LimitEntry>) -> Self {
        Self { limits }
    }

    /// 校验后转换为限值列表
    pub fn into_limits(self) -> Result<Vec<SensorLimit>> {
        self.validate()?;
        Ok(self.limits.into_iter().map(LimitEntry::into_limit).collect())
    }

    pub fn validate(&self) -> Result<()> {
        let report = limits_validator().validate(self);
        if report.is_ok() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(report.to_string()))
        }
    }
}

/// 限值文件的校验规则
pub fn limits_validator() -> ConfigValidator<LimitsFile> {
    ConfigValidator::new()
        .with_rule(FnRule::new("bounds", |file: &LimitsFile| {
            file.limits
                .iter()
                .filter_map(|entry| {
                    let reason = if !entry.min.is_finite() || !entry.max.is_finite() {
                        "bounds must be finite"
                    } else if entry.min > entry.max {
                        "min must not exceed max"
                    } else {
                        return None;
                    };
                    Some(ValidationError::InvalidBounds {
                        sensor: entry.sensor_type,
                        min: entry.min,
                        max: entry.max,
                        reason,
                    })
                })
                .collect()
        }))
        .with_rule(FnRule::new("unique_sensor", |file: &LimitsFile| {
            let mut seen = HashSet::new();
            file.limits
                .iter()
                .filter(|entry| !seen.insert(entry.sensor_type))
                .map(|entry| ValidationError::Duplicate(entry.sensor_type))
                .collect()
        }))
        .with_rule(FnRule::new("required_sensors", |file: &LimitsFile| {
            let configured: HashSet<SensorType> =
                file.limits.iter().map(|e| e.sensor_type).collect();
            REQUIRED_SENSORS
                .iter()
                .filter(|s| !configured.contains(*s))
                .map(|s| ValidationError::MissingSensor(*s))
                .collect()
        }))
}

/// 从配置源加载并校验限值
pub async fn load_limits(source: &dyn ConfigSource<LimitsFile>) -> Result<Vec<SensorLimit>> {
    let file = source.load().await?;
    let limits = file.into_limits()?;
    info!(count = limits.len(), "Sensor limits loaded");
    Ok(limits)
}
