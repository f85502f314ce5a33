use crate::PoolId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 水质等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualityLabel {
    Excellent,
    Good,
    Poor,
}

#[derive(Debug, Error)]
#[error("unknown quality label: {0}")]
pub struct ParseLabelError(pub String);

impl QualityLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityLabel::Excellent => "Excellent",
            QualityLabel::Good => "Good",
            QualityLabel::Poor => "Poor",
        }
    }
}

impl fmt::Display for QualityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityLabel {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "excellent" => Ok(QualityLabel::Excellent),
            "good" => Ok(QualityLabel::Good),
            "poor" => Ok(QualityLabel::Poor),
            _ => Err(ParseLabelError(s.to_string())),
        }
    }
}

/// 水质分类结果（按池追加的历史记录）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityClassification {
    /// 存储分配的 ID，未持久化时为空
    #[serde(default)]
    pub id: Option<i64>,
    pub pool_id: PoolId,
    pub quality: QualityLabel,
    pub probability_excellent: f64,
    pub probability_good: f64,
    pub probability_poor: f64,
    pub timestamp: DateTime<Utc>,
}

impl QualityClassification {
    pub fn new(
        pool_id: PoolId,
        quality: QualityLabel,
        probability_excellent: f64,
        probability_good: f64,
        probability_poor: f64,
    ) -> Self {
        Self {
            id: None,
            pool_id,
            quality,
            probability_excellent,
            probability_good,
            probability_poor,
            timestamp: Utc::now(),
        }
    }
}
