mod history;
mod nohist;

pub use history::{History, HistorySpace, HistoryState};
pub use nohist::{NoHistorySpace, NoHistoryState};

use itertools::Itertools;
use std::fmt::Debug;
use std::hash::Hash;

use crate::common::{Node, Position};
use crate::map::BaseGraph;

/// A composite search node: one position per agent plus whatever bookkeeping
/// the variant needs. Equality and hashing define search-space identity.
pub trait JointState: Clone + Eq + Hash + Debug {
    fn positions(&self) -> &[Position];

    /// Number of history resets on the way to this state.
    fn segments(&self) -> usize {
        0
    }
}

/// Successor model the A* engine is written against.
pub trait StateSpace {
    type State: JointState;

    fn targets(&self) -> &[Node];

    fn start(&self) -> Self::State;

    /// Every legal successor of `state`.
    fn successors(&self, state: &Self::State) -> Vec<Self::State>;

    /// Every agent is either at `Goal` or standing on its target.
    fn is_goal(&self, state: &Self::State) -> bool {
        state
            .positions()
            .iter()
            .zip(self.targets())
            .all(|(position, target)| match position {
                Position::Goal => true,
                Position::At(node) => node == target,
            })
    }
}

/// Next-position options for one agent. An agent on its target (or already
/// gone) can only move to `Goal`.
pub(crate) fn agent_candidates<G: BaseGraph>(
    graph: &G,
    position: Position,
    target: Node,
    allow_wait: bool,
) -> Vec<Position> {
    match position {
        Position::Goal => vec![Position::Goal],
        Position::At(node) if node == target => vec![Position::Goal],
        Position::At(node) => {
            let mut candidates: Vec<Position> = graph
                .neighbors(node)
                .iter()
                .map(|&neighbor| Position::At(neighbor))
                .collect();
            if allow_wait {
                candidates.push(position);
            }
            candidates
        }
    }
}

/// Cross product of every agent's candidates, keeping only legal joint moves.
pub(crate) fn legal_joint_moves<G: BaseGraph>(
    graph: &G,
    current: &[Position],
    targets: &[Node],
    allow_wait: bool,
) -> Vec<Vec<Position>> {
    current
        .iter()
        .zip(targets)
        .map(|(&position, &target)| agent_candidates(graph, position, target, allow_wait))
        .map(|candidates| candidates.into_iter())
        .multi_cartesian_product()
        .filter(|next| is_legal_child(current, next))
        .collect()
}

/// No two agents on the same node, and no two agents swapping along an edge.
/// Agents at `Goal` never conflict.
pub fn is_legal_child(current: &[Position], next: &[Position]) -> bool {
    for ag1 in 0..next.len() {
        let Position::At(next1) = next[ag1] else {
            continue;
        };
        for ag2 in (ag1 + 1)..next.len() {
            let Position::At(next2) = next[ag2] else {
                continue;
            };
            // Vertex collision.
            if next1 == next2 {
                return false;
            }
            // Edge swap.
            if current[ag2] == Position::At(next1) && current[ag1] == Position::At(next2) {
                return false;
            }
        }
    }
    true
}
