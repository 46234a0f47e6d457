//! Resolved-config loading and validation: the one external collaborator
//! named but left unconstrained by the run engine's own specification.
//! A layered merge (`defaults < file < env < cli`, `deep_merge` over
//! `serde_json::Value`) followed by validation against a precompiled
//! `jsonschema::Validator`, the same pattern `arbiter_executor::contract`
//! uses for decision-contract validation.

pub mod defaults;
pub mod env;
pub mod error;
pub mod layers;
pub mod loader;
pub mod schema;

pub use error::ConfigError;
pub use loader::{load_config, read_file_layer, validate, validate_resolved_value, Strictness};
