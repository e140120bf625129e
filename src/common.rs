use serde::{Deserialize, Serialize};
use std::fmt;

use crate::map::{BaseGraph, Map};

/// A base graph node: (row, col) of a passable grid tile.
pub type Node = (usize, usize);

/// One agent's realized route, source first and target last.
pub type Path = Vec<Node>;

/// Where an agent stands in a joint state.
///
/// `Goal` means the agent reached its target on an earlier step and left the
/// graph. It is terminal: a `Goal` agent never moves again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    At(Node),
    Goal,
}

impl Position {
    pub fn node(&self) -> Option<Node> {
        match self {
            Position::At(node) => Some(*node),
            Position::Goal => None,
        }
    }

    pub fn is_goal(&self) -> bool {
        matches!(self, Position::Goal)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::At((row, col)) => write!(f, "({row}, {col})"),
            Position::Goal => write!(f, "G"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: usize,
    pub start: Node,
    pub goal: Node,
}

impl Agent {
    pub fn verify(&self, map: &Map) -> bool {
        map.contains(self.start) && map.contains(self.goal)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Solution {
    pub paths: Vec<Path>,
}

impl Solution {
    pub fn makespan(&self) -> usize {
        self.paths.iter().map(|path| path.len()).max().unwrap_or(0)
    }

    /// Sum of per-agent moves, not counting the start node.
    pub fn cost(&self) -> usize {
        self.paths
            .iter()
            .map(|path| path.len().saturating_sub(1))
            .sum()
    }

    /// Checks every path is a walk over `graph` (waiting allowed) from the
    /// agent's start to its goal, and no two agents share a node or swap along
    /// an edge. Agents leave the graph after their last step.
    pub fn verify<G: BaseGraph>(&self, graph: &G, agents: &[Agent]) -> bool {
        if self.paths.len() != agents.len() {
            return false;
        }

        for (path, agent) in self.paths.iter().zip(agents) {
            if path.first() != Some(&agent.start) || path.last() != Some(&agent.goal) {
                return false;
            }
            if path
                .windows(2)
                .any(|step| step[0] != step[1] && !graph.neighbors(step[0]).contains(&step[1]))
            {
                return false;
            }
        }

        for step in 0..self.makespan() {
            for i in 0..self.paths.len() {
                for j in (i + 1)..self.paths.len() {
                    let (path1, path2) = (&self.paths[i], &self.paths[j]);
                    let (Some(pos1), Some(pos2)) = (path1.get(step), path2.get(step)) else {
                        continue;
                    };
                    if pos1 == pos2 {
                        return false;
                    }
                    if step > 0 && path1[step - 1] == *pos2 && path2[step - 1] == *pos1 {
                        return false;
                    }
                }
            }
        }

        true
    }
}
