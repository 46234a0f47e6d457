use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path} as {format}: {source}")]
    Parse {
        path: String,
        format: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("config failed schema validation ({} issue(s)): {}", .issues.len(), .issues.join("; "))]
    Validation { issues: Vec<String> },

    #[error("config is missing required field `{0}`")]
    MissingField(String),

    #[error("unsupported config file extension `{0}` (expected .json, .yaml, or .yml)")]
    UnsupportedExtension(String),
}
