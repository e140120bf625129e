use std::time::Duration;
use thiserror::Error;

use crate::common::Node;
use crate::stat::Stats;

#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("invalid instance: {0}")]
    InvalidInstance(String),

    #[error("agent {agent} cannot reach its target {to:?} from {from:?}")]
    Unreachable { agent: usize, from: Node, to: Node },

    /// Every reachable joint state within the segment budget was expanded.
    #[error("search exhausted after {elapsed:?} without reaching the goal")]
    Exhausted { elapsed: Duration, stats: Stats },

    /// The wall-clock budget ran out before the search concluded.
    #[error("search timed out after {elapsed:?}")]
    Timeout { elapsed: Duration, stats: Stats },
}

impl SearchError {
    /// Runtime spent inside the main loop, if the search got that far.
    pub fn elapsed(&self) -> Option<Duration> {
        match self {
            SearchError::Exhausted { elapsed, .. } | SearchError::Timeout { elapsed, .. } => {
                Some(*elapsed)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecompositionError {
    #[error("no plan has been computed")]
    NoPlan,

    #[error("agents {agents:?} collide at {node:?} on time step {time_step}")]
    CollisionDetected {
        time_step: usize,
        agents: (usize, usize),
        node: Node,
    },

    #[error("window index {index} out of range, decomposition has {windows} windows")]
    IndexOutOfRange { index: usize, windows: usize },
}
