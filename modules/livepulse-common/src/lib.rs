pub mod config;
pub mod error;
pub mod targets;
pub mod types;

pub use config::MonitorConfig;
pub use error::LivePulseError;
pub use targets::{load_targets, validate_target};
pub use types::*;
