//! Online leader clustering and novelty-based stop monitoring (§4.6, §4.7).

pub mod clustering;
pub mod novelty;

pub use clustering::{ClusterInput, Clusterer};
pub use novelty::{reduce, BatchNoveltyInput, NoveltyState};
