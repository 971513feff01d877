use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to render manifest as YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to render manifest as JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
