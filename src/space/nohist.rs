use super::{legal_joint_moves, JointState, StateSpace};
use crate::common::{Node, Position};
use crate::map::BaseGraph;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NoHistoryState {
    pub positions: Vec<Position>,
}

impl JointState for NoHistoryState {
    fn positions(&self) -> &[Position] {
        &self.positions
    }
}

/// Plain joint state space: agents may wait in place, and a state is just the
/// tuple of positions. Revisits are unbounded.
pub struct NoHistorySpace<'a, G: BaseGraph> {
    graph: &'a G,
    sources: Vec<Node>,
    targets: Vec<Node>,
}

impl<'a, G: BaseGraph> NoHistorySpace<'a, G> {
    pub fn new(graph: &'a G, sources: &[Node], targets: &[Node]) -> Self {
        NoHistorySpace {
            graph,
            sources: sources.to_vec(),
            targets: targets.to_vec(),
        }
    }
}

impl<G: BaseGraph> StateSpace for NoHistorySpace<'_, G> {
    type State = NoHistoryState;

    fn targets(&self) -> &[Node] {
        &self.targets
    }

    fn start(&self) -> NoHistoryState {
        NoHistoryState {
            positions: self.sources.iter().map(|&node| Position::At(node)).collect(),
        }
    }

    fn successors(&self, state: &NoHistoryState) -> Vec<NoHistoryState> {
        legal_joint_moves(self.graph, &state.positions, &self.targets, true)
            .into_iter()
            .map(|positions| NoHistoryState { positions })
            .collect()
    }
}
