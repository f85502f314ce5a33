pub mod quality;
pub mod reading;
pub mod sensor;

pub use quality::{ParseLabelError, QualityClassification, QualityLabel};
pub use reading::{AlertDirection, AlertKey, Reading, SensorLimit};
pub use sensor::SensorType;

/// 养殖池 ID
pub type PoolId = i64;
