pub mod app;
pub mod error;
pub mod file_source;
pub mod limits;
pub mod source;
pub mod validator;

pub use app::{
    AlertConfig, AppConfig, ClassifierConfig, DatabaseConfig, LimitsConfig, LoggingConfig,
    SchedulerConfig,
};
pub use error::{ConfigError, Result};
pub use file_source::FileSource;
pub use limits::{load_limits, limits_validator, LimitEntry, LimitsFile, REQUIRED_SENSORS};
pub use source::{ConfigSource, ConfigWatcher, StaticSource};
pub use validator::{ConfigValidator, FnRule, ValidationError, ValidationReport, ValidationRule};
