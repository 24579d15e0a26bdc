//! Analyses (§4.2): use-count, live-interval, ordinal and control-flow
//! computation over a function. These are read-only passes that the GAD
//! runs once per function before lowering.

pub mod budget;
pub mod flowgraph;
pub mod live_interval;
pub mod ordinal;
pub mod use_count;

pub use budget::Budget;
pub use flowgraph::ControlFlowGraph;
pub use live_interval::LiveIntervals;
pub use ordinal::Ordinals;
pub use use_count::UseCounts;

use crate::ir::function::Function;

/// Every analysis the GAD needs, computed together so callers don't have
/// to remember the right order (`Ordinals` must precede `LiveIntervals`).
pub struct FunctionAnalyses {
    pub use_counts: UseCounts,
    pub ordinals: Ordinals,
    pub live_intervals: LiveIntervals,
    pub cfg: ControlFlowGraph,
    pub budget: Budget,
}

impl FunctionAnalyses {
    pub fn compute(f: &Function) -> Self {
        let ordinals = Ordinals::compute(f);
        let live_intervals = LiveIntervals::compute(f, &ordinals);
        FunctionAnalyses {
            use_counts: UseCounts::compute(f),
            ordinals,
            live_intervals,
            cfg: ControlFlowGraph::compute(f),
            budget: Budget::compute(f),
        }
    }
}
