//! 养殖池水质分析：最新读数聚合、外部预测分类与定时调度

pub mod aggregator;
pub mod classifier;
pub mod error;
pub mod scheduler;
pub mod store;

pub use aggregator::{LatestReadingAggregator, PoolSnapshot};
pub use classifier::{
    ClassProbabilities, ClassifierOrchestrator, HttpPredictor, Prediction, PredictionRequest,
    PredictionResponse, Predictor,
};
pub use error::{QualityError, Result};
pub use scheduler::{PoolOutcome, QualityScheduler, SchedulerHandle, TickReport};
pub use store::{MemoryReadingStore, ReadingStore, SqlReadingStore};
