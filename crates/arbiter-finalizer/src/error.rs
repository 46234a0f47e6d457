use thiserror::Error;

#[derive(Debug, Error)]
pub enum FinalizerError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed embedding record on line {line}: {source}")]
    MalformedLine {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write provenance: {0}")]
    Provenance(String),

    #[error("failed to remove {path} during post-finalization cleanup: {source}")]
    Cleanup {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
