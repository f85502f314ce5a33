pub mod clock;
pub mod cooldown;
pub mod dispatcher;
pub mod evaluator;
pub mod limits;

pub use clock::{Clock, ManualClock, SystemClock};
pub use cooldown::{CooldownGuard, CooldownTracker};
pub use dispatcher::{alert_text, AlertDispatcher, DispatchOutcome};
pub use evaluator::{AlertDescriptor, ThresholdEvaluator};
pub use limits::LimitsRegistry;
