use aqua_types::PoolId;
use sea_orm::DbErr;
use std::time::Duration;
use thiserror::Error;

/// 水质分析错误
#[derive(Debug, Error)]
pub enum QualityError {
    /// 养殖池不存在
    #[error("Pool not found: {0}")]
    NotFound(PoolId),

    /// 预测服务不可达、非 2xx 或返回体无法解析
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// 外部调用超时
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl QualityError {
    /// 超时也属于上游错误
    pub fn is_upstream(&self) -> bool {
        matches!(self, QualityError::Upstream(_) | QualityError::Timeout(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, QualityError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, QualityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_classification() {
        assert!(QualityError::Upstream("HTTP 503".into()).is_upstream());
        assert!(QualityError::Timeout(Duration::from_secs(10)).is_upstream());
        assert!(!QualityError::NotFound(3).is_upstream());
        assert!(!QualityError::Store("locked".into()).is_upstream());
        assert!(QualityError::NotFound(3).is_not_found());
    }
}
