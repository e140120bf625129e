use serde::Serialize;
use std::collections::HashMap;
use std::ops::Range;
use tracing::{debug, instrument};

use crate::common::{Node, Path};
use crate::error::DecompositionError;

/// Breakpoints `[0, b1, ..., T + 1]` over a joint plan of makespan `T`.
///
/// Window `k` is the half-open step range `[breakpoints[k], breakpoints[k + 1])`.
/// Within a window no node is visited by two different agents, at any time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decomposition {
    breakpoints: Vec<usize>,
}

impl Decomposition {
    pub fn breakpoints(&self) -> &[usize] {
        &self.breakpoints
    }

    pub fn windows(&self) -> usize {
        self.breakpoints.len() - 1
    }

    pub fn window_range(&self, index: usize) -> Result<Range<usize>, DecompositionError> {
        if index >= self.windows() {
            return Err(DecompositionError::IndexOutOfRange {
                index,
                windows: self.windows(),
            });
        }
        Ok(self.breakpoints[index]..self.breakpoints[index + 1])
    }

    /// Each agent's nodes inside window `index`.
    pub fn window_nodes(
        &self,
        paths: &[Path],
        index: usize,
    ) -> Result<Vec<Path>, DecompositionError> {
        let range = self.window_range(index)?;
        Ok(paths
            .iter()
            .map(|path| clamp(path, &range).to_vec())
            .collect())
    }
}

fn clamp<'a>(path: &'a [Node], range: &Range<usize>) -> &'a [Node] {
    let end = range.end.min(path.len());
    let start = range.start.min(end);
    &path[start..end]
}

fn makespan(paths: &[Path]) -> usize {
    paths.iter().map(|path| path.len()).max().unwrap_or(0)
}

/// The first time step at which two agents stand on the same node, if any.
/// Agents whose path already ended take no part.
pub fn find_collision(paths: &[Path]) -> Option<DecompositionError> {
    for time_step in 0..makespan(paths) {
        let mut occupied: HashMap<Node, usize> = HashMap::new();
        for (agent, path) in paths.iter().enumerate() {
            let Some(&node) = path.get(time_step) else {
                continue;
            };
            if let Some(&other) = occupied.get(&node) {
                return Some(DecompositionError::CollisionDetected {
                    time_step,
                    agents: (other, agent),
                    node,
                });
            }
            occupied.insert(node, agent);
        }
    }
    None
}

pub fn check_collision(paths: &[Path]) -> bool {
    find_collision(paths).is_some()
}

/// No node appears in the window of two different agents. Repeats by the
/// same agent are fine.
fn is_disjoint(paths: &[Path], range: Range<usize>) -> bool {
    let mut owner: HashMap<Node, usize> = HashMap::new();
    for (agent, path) in paths.iter().enumerate() {
        for &node in clamp(path, &range) {
            match owner.get(&node) {
                Some(&other) if other != agent => return false,
                Some(_) => {}
                None => {
                    owner.insert(node, agent);
                }
            }
        }
    }
    true
}

/// Splits a collision-free joint plan into disjoint windows with one greedy
/// left-to-right scan: each window is grown until adding the next step would
/// make two agents share a node, then closed.
///
/// The result has the fewest windows this scan can produce, which is not
/// necessarily the fewest over every possible split.
#[instrument(skip_all, name = "decompose", fields(agents = paths.len()), level = "debug")]
pub fn decompose(paths: &[Path]) -> Result<Decomposition, DecompositionError> {
    if let Some(collision) = find_collision(paths) {
        debug!("refusing to decompose: {collision}");
        return Err(collision);
    }

    let makespan = makespan(paths);
    let mut breakpoints = vec![0];
    let mut last = 0;
    let mut i = 0;

    while i <= makespan {
        if is_disjoint(paths, last..i) {
            i += 1;
        } else {
            // Single steps are collision-free, so the window holds at least
            // two steps here and `i - 1 > last`.
            debug_assert!(i >= last + 2);
            breakpoints.push(i - 1);
            last = i - 1;
        }
    }
    breakpoints.push(makespan + 1);

    debug!("breakpoints: {breakpoints:?}");
    Ok(Decomposition { breakpoints })
}
