//! The trial executor contract shared by the mock and live implementations.

use arbiter_types::config::ResolvedConfig;
use arbiter_types::embedding::EmbeddingRecord;
use arbiter_types::plan::TrialPlanEntry;
use arbiter_types::trial::TrialRecord;
use std::future::Future;

use crate::contract::CompiledContract;

pub struct ExecutionContext<'a> {
    pub resolved: &'a ResolvedConfig,
    pub compiled_contract: Option<&'a CompiledContract>,
}

pub struct ExecutedTrial {
    pub trial: TrialRecord,
    pub embedding: Option<EmbeddingRecord>,
}

/// Runs a single planned trial to completion: message exchange, parsing, and
/// embedding. Mock and live implementations share this contract so the
/// orchestrator is generic over either (§4.4, §4.9).
pub trait TrialExecutor: Send + Sync {
    fn execute(
        &self,
        entry: TrialPlanEntry,
        ctx: &ExecutionContext<'_>,
    ) -> impl Future<Output = ExecutedTrial> + Send;
}
