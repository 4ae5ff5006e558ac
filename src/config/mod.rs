//! Startup configuration subsystem.
//!
//! # Data Flow
//! ```text
//! command line + environment (cli.rs)
//!     → optional options file (loader.rs), CLI values win
//!     → RawOptions (schema.rs)
//!     → validation.rs (required values, defaults, shape checks)
//!     → StartupOptions (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Validation runs before any subsystem is constructed
//! - A config error never leaves a partially started process
//! - StartupOptions is never mutated after construction

pub mod cli;
pub mod loader;
pub mod schema;
pub mod validation;

use std::path::PathBuf;

use thiserror::Error;

pub use cli::Cli;
pub use schema::{
    ListenerOptions, LogFormat, RawOptions, StartupOptions, StorageOptions, TlsFiles,
};
pub use validation::{validate, ValidationError};

/// Error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read options file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse options file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{}", render(.0))]
    Validation(Vec<ValidationError>),
}

impl ConfigError {
    /// Validation problems, empty for I/O and parse errors.
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            ConfigError::Validation(errors) => errors,
            _ => &[],
        }
    }
}

fn render(errors: &[ValidationError]) -> String {
    let mut out = String::from("validation failed: ");
    for (i, err) in errors.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&err.to_string());
    }
    out
}
