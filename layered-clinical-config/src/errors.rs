//! Error types for configuration loading.
//!
//! Every error raised while reading a file names that file. Errors raised
//! while building components name the component.

use std::path::PathBuf;

use layered_clinical::{DocError, PatternError};
use thiserror::Error;

/// Errors that can occur while loading an engine config or building its pipeline.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML or JSON after interpolation.
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// The file parsed but does not have the expected shape.
    #[error("invalid configuration in {path}: {message}")]
    Schema { path: PathBuf, message: String },

    /// A `${name}` placeholder matches no constant and no pattern file key.
    #[error("unresolved placeholder '${{{name}}}' in {path}")]
    UnresolvedPlaceholder { name: String, path: PathBuf },

    /// A `${patterns...}` placeholder that is not `patterns.<file>.<key>`.
    #[error("invalid patterns reference '{name}', expected patterns.<file>.<key>")]
    InvalidReference { name: String },

    /// A file includes itself, directly or through other files.
    #[error("include cycle through {path}")]
    IncludeCycle { path: PathBuf },

    /// A requested component is not in the engine config.
    #[error("unknown component '{name}'")]
    UnknownComponent { name: String },

    #[error("component '{component}' uses unknown factory '{factory}'")]
    UnknownFactory { component: String, factory: String },

    /// A component's patterns failed to compile.
    #[error("component '{component}': {source}")]
    Pattern {
        component: String,
        #[source]
        source: PatternError,
    },

    /// A component reads an extension no component of the pipeline declares.
    #[error("component '{component}' reads unknown extension '{name}'")]
    UnknownExtension { component: String, name: String },

    /// The components' extension declarations conflict.
    #[error(transparent)]
    Extension(DocError),
}

impl From<DocError> for ConfigError {
    fn from(err: DocError) -> Self {
        match err {
            DocError::UnresolvedExtension { component, name } => {
                ConfigError::UnknownExtension { component, name }
            }
            other => ConfigError::Extension(other),
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
