use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use super::{legal_joint_moves, JointState, StateSpace};
use crate::common::{Node, Position};
use crate::map::BaseGraph;

/// Which agent most recently claimed each node in the current segment.
///
/// Backed by a `BTreeMap` so iteration is sorted by node: the entry sequence
/// is a canonical form of the relation, independent of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History(BTreeMap<Node, usize>);

impl History {
    fn from_claims(claims: &[(Node, usize)]) -> Self {
        History(claims.iter().copied().collect())
    }

    pub fn claimed_by(&self, node: Node) -> Option<usize> {
        self.0.get(&node).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (Node, usize)> + '_ {
        self.0.iter().map(|(&node, &agent)| (node, agent))
    }

    fn holds_all(&self, claims: &[(Node, usize)]) -> bool {
        claims
            .iter()
            .all(|&(node, agent)| self.claimed_by(node) == Some(agent))
    }
}

/// Joint state of the history-bounded variant.
///
/// The history map is shared between a parent and its children until one of
/// them needs to change it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryState {
    pub positions: Vec<Position>,
    pub segments: usize,
    pub history: Rc<History>,
}

impl Hash for HistoryState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.positions.hash(state);
        self.segments.hash(state);
        state.write_usize(self.history.len());
        for (node, agent) in self.history.entries() {
            node.hash(state);
            agent.hash(state);
        }
    }
}

impl JointState for HistoryState {
    fn positions(&self) -> &[Position] {
        &self.positions
    }

    fn segments(&self) -> usize {
        self.segments
    }
}

/// History-bounded joint state space: agents always move (no waiting), and a
/// new segment starts whenever an agent steps onto a node another agent
/// claimed earlier in the current segment.
pub struct HistorySpace<'a, G: BaseGraph> {
    graph: &'a G,
    sources: Vec<Node>,
    targets: Vec<Node>,
}

impl<'a, G: BaseGraph> HistorySpace<'a, G> {
    pub fn new(graph: &'a G, sources: &[Node], targets: &[Node]) -> Self {
        HistorySpace {
            graph,
            sources: sources.to_vec(),
            targets: targets.to_vec(),
        }
    }

    fn child(&self, parent: &HistoryState, next: Vec<Position>) -> HistoryState {
        let claims: Vec<(Node, usize)> = next
            .iter()
            .enumerate()
            .filter_map(|(agent, position)| position.node().map(|node| (node, agent)))
            .collect();

        let new_segment = claims.iter().any(|&(node, agent)| {
            parent
                .history
                .claimed_by(node)
                .is_some_and(|owner| owner != agent)
        });

        if new_segment {
            return HistoryState {
                positions: next,
                segments: parent.segments + 1,
                history: Rc::new(History::from_claims(&claims)),
            };
        }

        let history = if parent.history.holds_all(&claims) {
            Rc::clone(&parent.history)
        } else {
            let mut history = (*parent.history).clone();
            history.0.extend(claims);
            Rc::new(history)
        };

        HistoryState {
            positions: next,
            segments: parent.segments,
            history,
        }
    }
}

impl<G: BaseGraph> StateSpace for HistorySpace<'_, G> {
    type State = HistoryState;

    fn targets(&self) -> &[Node] {
        &self.targets
    }

    fn start(&self) -> HistoryState {
        let claims: Vec<(Node, usize)> = self
            .sources
            .iter()
            .enumerate()
            .map(|(agent, &node)| (node, agent))
            .collect();
        HistoryState {
            positions: self.sources.iter().map(|&node| Position::At(node)).collect(),
            segments: 0,
            history: Rc::new(History::from_claims(&claims)),
        }
    }

    fn successors(&self, state: &HistoryState) -> Vec<HistoryState> {
        legal_joint_moves(self.graph, &state.positions, &self.targets, false)
            .into_iter()
            .map(|next| self.child(state, next))
            .collect()
    }
}
