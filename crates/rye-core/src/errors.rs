//! Error types for the rye core library.

/// Top-level error enum for the rye core library.
#[derive(Debug, thiserror::Error)]
pub enum RyeError {
    #[error("Chain too deep (max {max_depth}): {item_id}. Possible circular dependency or excessive nesting.")]
    ChainTooDeep { item_id: String, max_depth: usize },

    #[error("Circular dependency detected: {item_id} (chain: {chain})")]
    CircularDependency { item_id: String, chain: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Lockfile error: {0}")]
    Lockfile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("dotenv error: {0}")]
    Dotenv(#[from] dotenvy::Error),
}

#[cfg(feature = "python")]
impl From<RyeError> for pyo3::PyErr {
    fn from(err: RyeError) -> pyo3::PyErr {
        use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
        match &err {
            RyeError::ChainTooDeep { .. }
            | RyeError::CircularDependency { .. }
            | RyeError::InvalidInput(_)
            | RyeError::Parse(_) => PyValueError::new_err(err.to_string()),
            RyeError::Lockfile(_) => PyRuntimeError::new_err(err.to_string()),
            RyeError::Io(_) => PyIOError::new_err(err.to_string()),
            RyeError::Json(_) | RyeError::Yaml(_) | RyeError::Dotenv(_) => {
                PyValueError::new_err(err.to_string())
            }
        }
    }
}

pub type RyeResult<T> = Result<T, RyeError>;
