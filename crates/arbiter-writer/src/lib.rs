//! Append-only JSONL + atomic JSON run-directory writer (§4.6).
//!
//! `ArtifactWriter` is the bus's one mandatory subscriber: every artifact
//! it writes is derived from an event, never polled. Atomic "authoritative"
//! artifacts (resolved config, cluster state, manifest) are written at
//! specific lifecycle points by the run service, not purely event-driven,
//! since they summarize state rather than append a record per event.

pub mod accumulator;
pub mod atomic;
pub mod error;
pub mod jsonl;
pub mod paths;
pub mod writer;

pub use atomic::write_json_atomic;
pub use error::WriterError;
pub use paths::RunPaths;
pub use writer::ArtifactWriter;
