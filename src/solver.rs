mod astar;

pub use astar::{JointPlan, SearchLimits, TIMEOUT_CHECK_INTERVAL};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, instrument};

use crate::common::Node;
use crate::error::SearchError;
use crate::heuristic::HeuristicTable;
use crate::map::BaseGraph;
use crate::space::{HistorySpace, NoHistorySpace};

/// Which joint state space the solver searches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SearchMode {
    /// Agents always move; history resets bound the state space.
    #[default]
    History,
    /// Agents may wait; no history bookkeeping.
    NoHistory,
}

/// Joint-state A* solver bound to one base graph.
///
/// The heuristic table is computed once on construction and shared by every
/// later `search` call. Nothing else survives between calls.
pub struct JointSolver<'a, G: BaseGraph> {
    graph: &'a G,
    heuristic: HeuristicTable,
    mode: SearchMode,
}

impl<'a, G: BaseGraph> JointSolver<'a, G> {
    pub fn new(graph: &'a G, mode: SearchMode) -> Self {
        JointSolver {
            graph,
            heuristic: HeuristicTable::build(graph),
            mode,
        }
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    /// Plans every agent from `sources[i]` to `targets[i]`.
    ///
    /// `max_segments` bounds the number of history resets and is ignored in
    /// [`SearchMode::NoHistory`].
    #[instrument(skip_all, name = "joint_solver", fields(mode = ?self.mode, agents = sources.len()), level = "debug")]
    pub fn search(
        &self,
        sources: &[Node],
        targets: &[Node],
        max_segments: usize,
        timeout: Duration,
    ) -> Result<JointPlan, SearchError> {
        self.validate(sources, targets)?;

        let result = match self.mode {
            SearchMode::History => astar::joint_a_star_search(
                &HistorySpace::new(self.graph, sources, targets),
                &self.heuristic,
                &SearchLimits {
                    max_segments: Some(max_segments),
                    timeout,
                },
            ),
            SearchMode::NoHistory => astar::joint_a_star_search(
                &NoHistorySpace::new(self.graph, sources, targets),
                &self.heuristic,
                &SearchLimits {
                    max_segments: None,
                    timeout,
                },
            ),
        };

        match &result {
            Ok(plan) => info!(
                "found plan: {} joint steps, {} segments, runtime {:?}",
                plan.cost,
                plan.segments.last().copied().unwrap_or(0),
                plan.runtime
            ),
            Err(err) => info!("no plan: {err}"),
        }
        result
    }

    fn validate(&self, sources: &[Node], targets: &[Node]) -> Result<(), SearchError> {
        if sources.is_empty() {
            return Err(SearchError::InvalidInstance("no agents".to_string()));
        }
        if sources.len() != targets.len() {
            return Err(SearchError::InvalidInstance(format!(
                "{} sources but {} targets",
                sources.len(),
                targets.len()
            )));
        }

        let mut occupied = HashSet::new();
        for (agent, (&source, &target)) in sources.iter().zip(targets).enumerate() {
            if !self.graph.contains(source) {
                return Err(SearchError::InvalidInstance(format!(
                    "source {source:?} of agent {agent} is not a graph node"
                )));
            }
            if !self.graph.contains(target) {
                return Err(SearchError::InvalidInstance(format!(
                    "target {target:?} of agent {agent} is not a graph node"
                )));
            }
            if !occupied.insert(source) {
                return Err(SearchError::InvalidInstance(format!(
                    "agent {agent} shares source {source:?} with another agent"
                )));
            }
            if self.heuristic.distance(source, target).is_none() {
                return Err(SearchError::Unreachable {
                    agent,
                    from: source,
                    to: target,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Agent, Position};
    use crate::decomposition::decompose;
    use crate::map::Map;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .try_init();
    }

    const TIMEOUT: Duration = Duration::from_secs(60);

    #[test]
    fn test_head_on_in_single_lane_fails() {
        init_tracing();
        let map = Map::parse("type octile\nheight 1\nwidth 3\nmap\n...\n").unwrap();

        for mode in [SearchMode::History, SearchMode::NoHistory] {
            let solver = JointSolver::new(&map, mode);
            let result = solver.search(&[(0, 0), (0, 2)], &[(0, 2), (0, 0)], 1, TIMEOUT);
            assert!(
                matches!(result, Err(SearchError::Exhausted { .. })),
                "{mode:?}: {result:?}"
            );
        }
    }

    #[test]
    fn test_parallel_lanes_succeed() {
        init_tracing();
        let map = Map::parse("type octile\nheight 2\nwidth 3\nmap\n...\n...\n").unwrap();
        let solver = JointSolver::new(&map, SearchMode::History);
        let agents = [
            Agent {
                id: 0,
                start: (0, 0),
                goal: (0, 2),
            },
            Agent {
                id: 1,
                start: (1, 2),
                goal: (1, 0),
            },
        ];

        let plan = solver
            .search(&[(0, 0), (1, 2)], &[(0, 2), (1, 0)], 1, TIMEOUT)
            .unwrap();
        assert!(plan.solution.verify(&map, &agents));
        assert_eq!(plan.cost, 2);
    }

    #[test]
    fn test_disjoint_subgraphs_need_one_window() {
        init_tracing();
        let map = Map::parse("type octile\nheight 3\nwidth 3\nmap\n...\n@@@\n...\n").unwrap();
        let solver = JointSolver::new(&map, SearchMode::History);

        let plan = solver
            .search(&[(0, 0), (2, 2)], &[(0, 2), (2, 0)], 0, TIMEOUT)
            .unwrap();
        assert!(plan.segments.iter().all(|&segments| segments == 0));
        assert_eq!(
            plan.solution.paths,
            vec![vec![(0, 0), (0, 1), (0, 2)], vec![(2, 2), (2, 1), (2, 0)]]
        );

        let decomposition = decompose(&plan.solution.paths).unwrap();
        assert_eq!(decomposition.breakpoints(), &[0, 4]);
        assert_eq!(decomposition.windows(), 1);
    }

    #[test]
    fn test_segment_count_never_decreases() {
        init_tracing();
        let map = Map::parse("type octile\nheight 1\nwidth 5\nmap\n.....\n").unwrap();
        let solver = JointSolver::new(&map, SearchMode::History);

        let plan = solver
            .search(&[(0, 0), (0, 1)], &[(0, 3), (0, 4)], 5, TIMEOUT)
            .unwrap();
        assert!(plan.segments.windows(2).all(|pair| pair[0] <= pair[1]));
        for pair in plan.states.windows(2) {
            for (before, after) in pair[0].iter().zip(&pair[1]) {
                if *before == Position::Goal {
                    assert_eq!(*after, Position::Goal);
                }
            }
        }
    }

    #[test]
    fn test_invalid_instances() {
        let map = Map::parse("type octile\nheight 3\nwidth 3\nmap\n...\n@@@\n...\n").unwrap();
        let solver = JointSolver::new(&map, SearchMode::History);

        let result = solver.search(&[], &[], 1, TIMEOUT);
        assert!(matches!(result, Err(SearchError::InvalidInstance(_))));

        let result = solver.search(&[(0, 0)], &[(0, 1), (0, 2)], 1, TIMEOUT);
        assert!(matches!(result, Err(SearchError::InvalidInstance(_))));

        let result = solver.search(&[(1, 1)], &[(0, 1)], 1, TIMEOUT);
        assert!(matches!(result, Err(SearchError::InvalidInstance(_))));

        let result = solver.search(&[(0, 0), (0, 0)], &[(0, 1), (0, 2)], 1, TIMEOUT);
        assert!(matches!(result, Err(SearchError::InvalidInstance(_))));

        match solver.search(&[(0, 0), (2, 0)], &[(0, 2), (0, 1)], 1, TIMEOUT) {
            Err(SearchError::Unreachable { agent, from, to }) => {
                assert_eq!(agent, 1);
                assert_eq!(from, (2, 0));
                assert_eq!(to, (0, 1));
            }
            other => panic!("expected unreachable, got {other:?}"),
        }
    }

    #[test]
    fn test_timeout_is_distinct_from_exhaustion() {
        let map = Map::from_file("map_file/test/test.map").unwrap();
        let solver = JointSolver::new(&map, SearchMode::NoHistory);

        let result = solver.search(&[(0, 0), (2, 2)], &[(2, 2), (0, 0)], 0, Duration::ZERO);
        let err = result.unwrap_err();
        assert!(matches!(err, SearchError::Timeout { .. }));
        assert!(err.elapsed().is_some());
    }
}
