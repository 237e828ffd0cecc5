//! # ratewatch Config
//!
//! TOML configuration for the rate monitor: the sampled page, the browser
//! session, the messaging channel and logging.

mod error;
mod loader;
mod schema;
mod validator;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
pub use validator::{ConfigValidator, ValidationError, ValidationResult, ValidationWarning};
