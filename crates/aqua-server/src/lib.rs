pub mod logging;
pub mod monitor;

pub use monitor::AquaMonitor;
