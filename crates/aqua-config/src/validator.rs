use aqua_types::SensorType;
use std::fmt;
use thiserror::Error;

/// 单项校验失败
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("limits for {0} are required")]
    MissingSensor(SensorType),

    #[error("{sensor}: bounds {min}..{max} invalid, {reason}")]
    InvalidBounds {
        sensor: SensorType,
        min: f64,
        max: f64,
        reason: &'static str,
    },

    #[error("duplicate limits for {0}")]
    Duplicate(SensorType),
}

/// 校验规则，返回发现的全部问题
pub trait ValidationRule<T>: Send + Sync {
    fn name(&self) -> &str;
    fn check(&self, config: &T) -> Vec<ValidationError>;
}

/// 校验结果汇总
#[derive(Debug, Default)]
pub struct ValidationReport {
    failures: Vec<(String, ValidationError)>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failures(&self) -> &[(String, ValidationError)] {
        &self.failures
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (rule, error)) in self.failures.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "[{}] {}", rule, error)?;
        }
        Ok(())
    }
}

/// 配置校验器
///
/// 执行全部规则，不在第一个失败处停止。
pub struct ConfigValidator<T> {
    rules: Vec<Box<dyn ValidationRule<T>>>,
}

impl<T> ConfigValidator<T> {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_rule(mut self, rule: impl ValidationRule<T> + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn validate(&self, config: &T) -> ValidationReport {
        let failures = self
            .rules
            .iter()
            .flat_map(|rule| {
                rule.check(config)
                    .into_iter()
                    .map(move |e| (rule.name().to_string(), e))
            })
            .collect();

        ValidationReport { failures }
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl<T> Default for ConfigValidator<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// 由闭包构成的规则
pub struct FnRule<T, F> {
    name: String,
    check: F,
    _phantom: std::marker::PhantomData<fn(&T)>,
}

impl<T, F> FnRule<T, F>
where
    F: Fn(&T) -> Vec<ValidationError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, check: F) -> Self {
        Self {
            name: name.into(),
            check,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T, F> ValidationRule<T> for FnRule<T, F>
where
    F: Fn(&T) -> Vec<ValidationError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, config: &T) -> Vec<ValidationError> {
        (self.check)(config)
    }
}
