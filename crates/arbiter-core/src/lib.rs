//! Trial planning and the run-scoped event bus: the two pieces every other
//! engine component depends on (§4.2, §4.3).

pub mod bus;
pub mod planner;

pub use bus::{EventBus, HandlerWarning, SubscriptionId};
pub use planner::build_plan;
