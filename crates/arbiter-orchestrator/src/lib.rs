//! Run lifecycle orchestration: the bounded-concurrency batch executor, the
//! shutdown controller, the clustering/novelty monitor driver, manifest
//! assembly, and the top-level run service that wires them together.

mod batch;
mod error;
mod manifest;
mod run_monitor;
mod run_orchestrator;
mod service;
mod shutdown;

pub use batch::{run_batch, BatchOutcome};
pub use error::OrchestratorError;
pub use manifest::{build_and_write, ManifestInputs, ARBITER_VERSION, SCHEMA_VERSION};
pub use run_monitor::{EligibleEmbedding, RunMonitor};
pub use run_orchestrator::{RunOrchestrator, RunOutcome};
pub use service::{run, RunOptions, RunReport};
pub use shutdown::{ShutdownController, DEFAULT_DEADLINE_MS};
