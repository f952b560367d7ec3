pub mod config;
pub mod duration;
pub mod types;

pub use config::{CheckSection, CheckSettings, CheckerConfig, ConfigError};
pub use duration::{parse_duration, DurationError};
pub use types::Endpoint;
