use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::extract::Node;

/// Final result of an exploration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExploreOutcome {
    /// Every node reachable from the seeds, each discovered exactly once.
    pub discovered: HashSet<Node>,
    pub stats: ExploreStats,
    /// True when the run was cut short by cancellation rather than
    /// reaching natural quiescence; the discovered set is then partial.
    pub cancelled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExploreStats {
    /// Expansions that completed and produced a (possibly empty) batch.
    pub expansions_ok: usize,
    /// Expansions that failed. The node still counts as processed; the
    /// failure is recorded here instead of aborting the run.
    pub expansions_failed: usize,
    /// Candidate nodes rejected by the frontier as already seen.
    pub duplicates_rejected: usize,
}
