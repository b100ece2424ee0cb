//! Configuration, paths, logging and core error types shared by the tester SDK crates.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_CLIENT_ID, DEFAULT_ISSUER_URL, DEFAULT_LOG_LEVEL, DEFAULT_RELEASES_ENDPOINT,
    DEFAULT_TESTER_API_SCOPE,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
