//! Sender configuration.
//!
//! Provides the immutable sender settings, their validation, and loading
//! from JSON files.

mod file;
mod model;
mod validation;

pub use file::{CREDENTIAL_ENV, default_config_path, load_config, load_default_config};
pub use model::{Security, SenderConfig};
pub use validation::{ValidationError, ValidationResult, validate_config};
