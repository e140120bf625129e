use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::common::{Agent, Node, Path};
use crate::decomposition::{decompose, Decomposition};
use crate::error::{DecompositionError, SearchError};
use crate::map::{BaseGraph, Map};
use crate::solver::{JointPlan, JointSolver, SearchMode};
use crate::stat::Stats;

/// Owns one planning instance: the map, the agents' sources and targets, the
/// computed plan and its decomposition.
pub struct ExplainablePlanner<'a> {
    map: &'a Map,
    agents: Vec<Agent>,
    solver: JointSolver<'a, Map>,
    plan: Option<JointPlan>,
    failure: Option<SearchError>,
    decomposition: Option<Decomposition>,
}

impl<'a> ExplainablePlanner<'a> {
    pub fn new(map: &'a Map, agents: Vec<Agent>, mode: SearchMode) -> Self {
        ExplainablePlanner {
            map,
            agents,
            solver: JointSolver::new(map, mode),
            plan: None,
            failure: None,
            decomposition: None,
        }
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Runs the joint search. A previous plan and decomposition are dropped
    /// first, whatever the outcome.
    #[instrument(skip_all, name = "plan", fields(agents = self.agents.len(), max_segments), level = "debug")]
    pub fn plan(
        &mut self,
        max_segments: usize,
        timeout: Duration,
    ) -> Result<&JointPlan, SearchError> {
        self.plan = None;
        self.failure = None;
        self.decomposition = None;

        let sources: Vec<Node> = self.agents.iter().map(|agent| agent.start).collect();
        let targets: Vec<Node> = self.agents.iter().map(|agent| agent.goal).collect();

        match self.solver.search(&sources, &targets, max_segments, timeout) {
            Ok(plan) => {
                debug_assert!(plan.solution.verify(self.map, &self.agents));
                Ok(&*self.plan.insert(plan))
            }
            Err(err) => {
                warn!("No plan: {err}");
                self.failure = Some(err.clone());
                Err(err)
            }
        }
    }

    pub fn found_plan(&self) -> bool {
        self.plan.is_some()
    }

    pub fn joint_plan(&self) -> Option<&JointPlan> {
        self.plan.as_ref()
    }

    pub fn paths(&self) -> Option<&[Path]> {
        self.plan.as_ref().map(|plan| plan.solution.paths.as_slice())
    }

    /// Recomputes the greedy minimal disjoint decomposition of the current plan.
    pub fn minimal_decomposition(&mut self) -> Result<&Decomposition, DecompositionError> {
        let paths = self.paths().ok_or(DecompositionError::NoPlan)?;
        match decompose(paths) {
            Ok(decomposition) => {
                info!("Decomposition: {:?}", decomposition.breakpoints());
                Ok(&*self.decomposition.insert(decomposition))
            }
            Err(err) => {
                warn!("Collision detected, no decomposition: {err}");
                self.decomposition = None;
                Err(err)
            }
        }
    }

    /// Each agent's nodes inside window `index` of the last decomposition.
    pub fn decomposition_nodes(&self, index: usize) -> Result<Vec<Path>, DecompositionError> {
        let (Some(paths), Some(decomposition)) = (self.paths(), self.decomposition.as_ref()) else {
            return Err(DecompositionError::NoPlan);
        };
        decomposition.window_nodes(paths, index)
    }

    pub fn report(&self, graph_file: &str, bench_file: &str, num_segments: usize) -> RunReport {
        let (outcome, runtime, stats) = match (&self.plan, &self.failure) {
            (Some(plan), _) => (Outcome::Plan, Some(plan.runtime), Some(plan.stats.clone())),
            (None, Some(SearchError::Timeout { elapsed, stats })) => {
                (Outcome::Timeout, Some(*elapsed), Some(stats.clone()))
            }
            (None, Some(SearchError::Exhausted { elapsed, stats })) => {
                (Outcome::Exhausted, Some(*elapsed), Some(stats.clone()))
            }
            (None, Some(_)) => (Outcome::Invalid, None, None),
            (None, None) => (Outcome::NotRun, None, None),
        };

        RunReport {
            graph_file: graph_file.to_string(),
            bench_file: bench_file.to_string(),
            graph_nodes: self.map.nodes().len(),
            graph_edges: self.map.edge_count(),
            num_agents: self.agents.len(),
            max_decomp_parts: num_segments,
            mode: self.solver.mode(),
            outcome,
            plans: self.paths().map(|paths| paths.to_vec()),
            decomposition: self
                .decomposition
                .as_ref()
                .map(|decomposition| decomposition.breakpoints().to_vec()),
            decomp_parts: self.decomposition.as_ref().map(Decomposition::windows),
            runtime_secs: runtime.map(|runtime| runtime.as_secs_f64()),
            stats,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Plan,
    Exhausted,
    Timeout,
    Invalid,
    NotRun,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub graph_file: String,
    pub bench_file: String,
    pub graph_nodes: usize,
    pub graph_edges: usize,
    pub num_agents: usize,
    pub max_decomp_parts: usize,
    pub mode: SearchMode,
    pub outcome: Outcome,
    pub plans: Option<Vec<Path>>,
    pub decomposition: Option<Vec<usize>>,
    pub decomp_parts: Option<usize>,
    pub runtime_secs: Option<f64>,
    pub stats: Option<Stats>,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "GRAPH FILE:\t{}", self.graph_file)?;
        writeln!(f, "BENCH FILE:\t{}", self.bench_file)?;
        writeln!(f, "NUM_AGENTS:\t{}", self.num_agents)?;
        writeln!(f, "MAX_DECOMP_PARTS:\t{}", self.max_decomp_parts)?;
        let runtime = self.runtime_secs.unwrap_or(0.0);

        let Some(plans) = &self.plans else {
            return writeln!(f, "NO PLAN ({:?})\nRUNTIME:\t{runtime}", self.outcome);
        };
        for (agent, path) in plans.iter().enumerate() {
            writeln!(f, "AGENT {agent} PLAN:\t{path:?}")?;
        }
        if let (Some(decomposition), Some(parts)) = (&self.decomposition, self.decomp_parts) {
            writeln!(f, "DECOMPOSITION:\t{decomposition:?}")?;
            writeln!(f, "DECOMP PARTS:\t{parts}")?;
        }
        writeln!(f, "RUNTIME:\t{runtime}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .try_init();
    }

    const TIMEOUT: Duration = Duration::from_secs(60);

    // Two agents share the top lane, one uses the bottom lane.
    fn lanes() -> (Map, Vec<Agent>) {
        let map = Map::from_file("map_file/test/lanes.map").unwrap();
        let agents = vec![
            Agent {
                id: 0,
                start: (0, 0),
                goal: (0, 4),
            },
            Agent {
                id: 1,
                start: (2, 4),
                goal: (2, 0),
            },
            Agent {
                id: 2,
                start: (0, 1),
                goal: (0, 3),
            },
        ];
        (map, agents)
    }

    #[test]
    fn test_overlapping_agents_decompose_into_several_windows() {
        init_tracing();
        let (map, agents) = lanes();
        let mut planner = ExplainablePlanner::new(&map, agents, SearchMode::History);

        let plan = planner.plan(3, TIMEOUT).unwrap();
        assert_eq!(plan.segments.last(), Some(&3));
        assert_eq!(
            plan.solution.paths,
            vec![
                vec![(0, 0), (0, 1), (0, 2), (0, 3), (0, 4)],
                vec![(2, 4), (2, 3), (2, 2), (2, 1), (2, 0)],
                vec![(0, 1), (0, 2), (0, 3)],
            ]
        );

        let decomposition = planner.minimal_decomposition().unwrap();
        assert_eq!(decomposition.breakpoints(), &[0, 1, 2, 3, 6]);
        assert!(decomposition.windows() > 1);
        let makespan = 5;
        assert!(decomposition.breakpoints()[1..decomposition.windows()]
            .iter()
            .all(|&bp| bp > 0 && bp < makespan + 1));

        assert_eq!(
            planner.decomposition_nodes(1).unwrap(),
            vec![vec![(0, 1)], vec![(2, 3)], vec![(0, 2)]]
        );
        assert_eq!(
            planner.decomposition_nodes(4),
            Err(DecompositionError::IndexOutOfRange {
                index: 4,
                windows: 4,
            })
        );
    }

    #[test]
    fn test_segment_budget_changes_the_plan() {
        init_tracing();
        let (map, agents) = lanes();
        let mut planner = ExplainablePlanner::new(&map, agents, SearchMode::History);

        assert!(matches!(
            planner.plan(1, TIMEOUT),
            Err(SearchError::Exhausted { .. })
        ));
        assert!(!planner.found_plan());
        assert_eq!(
            planner.minimal_decomposition(),
            Err(DecompositionError::NoPlan)
        );

        // With two resets agent 0 backs off once before following.
        let plan = planner.plan(2, TIMEOUT).unwrap();
        assert_eq!(plan.segments.last(), Some(&2));
        assert_eq!(
            plan.solution.paths[0],
            vec![(0, 0), (0, 1), (0, 0), (0, 1), (0, 2), (0, 3), (0, 4)]
        );
        assert_eq!(
            planner.minimal_decomposition().unwrap().breakpoints(),
            &[0, 1, 4, 8]
        );
    }

    #[test]
    fn test_no_history_mode() {
        init_tracing();
        let (map, agents) = lanes();
        let mut planner = ExplainablePlanner::new(&map, agents, SearchMode::NoHistory);

        assert!(planner.plan(0, TIMEOUT).is_ok());
        let plan = planner.joint_plan().unwrap();
        assert!(plan.segments.iter().all(|&segments| segments == 0));
        assert!(plan.solution.verify(&map, planner.agents()));
        assert_eq!(
            planner.minimal_decomposition().unwrap().breakpoints(),
            &[0, 1, 2, 3, 6]
        );
    }

    #[test]
    fn test_report() {
        init_tracing();
        let (map, agents) = lanes();
        let mut planner = ExplainablePlanner::new(&map, agents, SearchMode::History);

        let report = planner.report("lanes.map", "lanes.scen", 4);
        assert_eq!(report.outcome, Outcome::NotRun);

        planner.plan(3, TIMEOUT).unwrap();
        planner.minimal_decomposition().unwrap();
        let report = planner.report("lanes.map", "lanes.scen", 4);
        assert_eq!(report.outcome, Outcome::Plan);
        assert_eq!(report.decomp_parts, Some(4));
        assert_eq!(report.graph_nodes, 10);
        let text = report.to_string();
        assert!(text.contains("DECOMP PARTS:\t4"));
        assert!(text.contains("AGENT 2 PLAN:\t[(0, 1), (0, 2), (0, 3)]"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcome"], "plan");
        assert_eq!(json["mode"], "history");

        let (_, mut agents) = lanes();
        agents[1].goal = (0, 0);
        let mut planner = ExplainablePlanner::new(&map, agents, SearchMode::History);
        assert!(matches!(
            planner.plan(3, TIMEOUT),
            Err(SearchError::Unreachable { agent: 1, .. })
        ));
        let report = planner.report("lanes.map", "lanes.scen", 4);
        assert_eq!(report.outcome, Outcome::Invalid);
        assert!(report.to_string().contains("NO PLAN"));
    }
}
