//! Embedding finalization (§4.10): `debug/embeddings.jsonl` →
//! `embeddings.arrow` + `embeddings.provenance.json`, with the
//! post-finalization cleanup of the debug JSONL when `--debug` is off.

pub mod error;
pub mod finalize;
pub mod provenance;

pub use error::FinalizerError;
pub use finalize::{finalize, FinalizationOutcome};
pub use provenance::{EmbeddingsProvenance, FinalizationStatus, ProvenanceCounts};
