/// Monitoring engine module - owns target state and runs check cycles
///
/// This module is responsible for:
/// - Probing endpoints with a TCP connect
/// - Tracking UNKNOWN/UP/DOWN per target and deriving alert events
/// - Recording one history row per target per cycle
pub mod checker;
pub mod engine;
pub mod registry;
pub mod types;

pub use checker::TcpChecker;
pub use engine::{EngineSettings, MonitorEngine};
