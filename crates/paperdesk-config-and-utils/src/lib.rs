//! Configuration, filesystem paths and logging shared by the PaperDesk crates.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_API_BASE_URL, DEFAULT_LOG_LEVEL, DEFAULT_REQUEST_TIMEOUT_SECS,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, init_with_config, parse_level, LogConfig};
pub use paths::Paths;
