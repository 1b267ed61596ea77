use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("template error: {0}")]
    Template(String),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("lock timeout on {0}")]
    LockTimeout(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
