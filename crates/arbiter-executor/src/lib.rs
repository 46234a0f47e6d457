//! Trial execution: message building, decision-contract parsing, embed-text
//! selection, and the mock/live executor implementations (§4.4).

pub mod contract;
pub mod embed;
pub mod executor;
pub mod live;
pub mod messages;
pub mod mock;

pub use contract::{parse_trial_output, CompiledContract};
pub use executor::{ExecutedTrial, ExecutionContext, TrialExecutor};
pub use live::LiveExecutor;
pub use mock::MockExecutor;
