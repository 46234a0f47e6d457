use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("batch executor requires at least one worker")]
    ZeroWorkers,

    #[error("embedding dimension mismatch: trial {trial_id} produced {got} dimensions, expected {expected}")]
    DimensionMismatch { trial_id: u32, expected: u32, got: u32 },

    #[error("invalid decision contract: {0}")]
    Contract(String),

    #[error("failed to write artifact: {0}")]
    Writer(#[from] arbiter_writer::WriterError),

    #[error("embedding finalization failed: {0}")]
    Finalizer(#[from] arbiter_finalizer::FinalizerError),
}
