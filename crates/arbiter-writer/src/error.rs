use thiserror::Error;

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("failed to create run directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open append-only artifact {path}: {source}")]
    OpenAppend {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write atomic artifact {path}: {source}")]
    AtomicWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize artifact {artifact}: {source}")]
    Serialize {
        artifact: String,
        #[source]
        source: serde_json::Error,
    },
}
