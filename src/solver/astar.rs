use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, trace};

use crate::common::{Path, Position, Solution};
use crate::error::SearchError;
use crate::heuristic::HeuristicTable;
use crate::space::{JointState, StateSpace};
use crate::stat::Stats;

/// The wall clock is read whenever this many nodes have been expanded or
/// generated since the last read, and once before the first expansion.
pub const TIMEOUT_CHECK_INTERVAL: usize = 1000;

#[derive(Debug, Clone, Copy)]
pub struct SearchLimits {
    /// Children with more segments than this are discarded. `None` disables
    /// the check (variants without history never start a new segment).
    pub max_segments: Option<usize>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct JointPlan {
    pub solution: Solution,
    /// Joint positions from the start state to the goal state.
    pub states: Vec<Vec<Position>>,
    /// Segment count of each state in `states`.
    pub segments: Vec<usize>,
    /// Number of joint steps from start to goal.
    pub cost: usize,
    pub runtime: Duration,
    pub stats: Stats,
}

type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Open,
    Closed,
}

#[derive(Debug)]
struct SearchNode<S> {
    state: Rc<S>,
    parent: Option<NodeId>,
    g_cost: usize,
    status: Status,
}

// Lowest f first, then fewest segments, then oldest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct OpenEntry {
    f_cost: usize,
    segments: usize,
    id: NodeId,
}

/// Node arena, identity index and priority queue kept together, so "already
/// queued" and "already expanded" are one O(1) lookup and cannot drift apart.
/// The arena and the index share one allocation per state.
struct OpenList<S: JointState> {
    heap: BinaryHeap<Reverse<OpenEntry>>,
    nodes: Vec<SearchNode<S>>,
    lookup: HashMap<Rc<S>, NodeId>,
    open_len: usize,
}

impl<S: JointState> OpenList<S> {
    fn new() -> Self {
        OpenList {
            heap: BinaryHeap::new(),
            nodes: Vec::new(),
            lookup: HashMap::new(),
            open_len: 0,
        }
    }

    /// Whether `state` was ever queued, whether still open or already closed.
    fn contains(&self, state: &S) -> bool {
        self.lookup.contains_key(state)
    }

    fn push(&mut self, state: S, parent: Option<NodeId>, g_cost: usize, h_cost: usize) {
        let id = self.nodes.len();
        let state = Rc::new(state);
        self.heap.push(Reverse(OpenEntry {
            f_cost: g_cost + h_cost,
            segments: state.segments(),
            id,
        }));
        self.lookup.insert(Rc::clone(&state), id);
        self.nodes.push(SearchNode {
            state,
            parent,
            g_cost,
            status: Status::Open,
        });
        self.open_len += 1;
    }

    /// Removes the best open node and marks it closed.
    fn pop(&mut self) -> Option<NodeId> {
        let Reverse(entry) = self.heap.pop()?;
        let node = &mut self.nodes[entry.id];
        debug_assert_eq!(node.status, Status::Open);
        node.status = Status::Closed;
        self.open_len -= 1;
        Some(entry.id)
    }

    fn node(&self, id: NodeId) -> &SearchNode<S> {
        &self.nodes[id]
    }

    fn open_len(&self) -> usize {
        self.open_len
    }

    fn closed_len(&self) -> usize {
        self.nodes.len() - self.open_len
    }

    /// States from the root to `goal`, following parent handles.
    fn trace_back(&self, goal: NodeId) -> Vec<&S> {
        let mut states = Vec::new();
        let mut current = Some(goal);
        while let Some(id) = current {
            let node = self.node(id);
            states.push(node.state.as_ref());
            current = node.parent;
        }
        states.reverse();
        states
    }
}

/// Best-first search over the joint state space, ordered by `f = g + h` with
/// unit step cost and `h` the sum of per-agent shortest-path distances.
///
/// A state is queued at most once: a child already open or closed is skipped
/// even if the new path to it is cheaper.
#[instrument(skip_all, name = "joint_a_star", fields(agents = space.targets().len(), max_segments = ?limits.max_segments), level = "debug")]
pub(crate) fn joint_a_star_search<S: StateSpace>(
    space: &S,
    heuristic: &HeuristicTable,
    limits: &SearchLimits,
) -> Result<JointPlan, SearchError> {
    let search_start_time = Instant::now();
    let targets = space.targets();
    let mut stats = Stats::default();
    let mut open_list = OpenList::new();

    let start = space.start();
    if let Some(start_h) = heuristic.joint_cost(start.positions(), targets) {
        open_list.push(start, None, 0, start_h);
    }

    let mut next_timeout_check = 0;
    while let Some(current) = open_list.pop() {
        let work = stats.expanded_nodes + stats.generated_nodes;
        if work >= next_timeout_check {
            next_timeout_check = work + TIMEOUT_CHECK_INTERVAL;
            let elapsed = search_start_time.elapsed();
            debug!(
                "open list size: {}, closed list size: {}, current node: {:?}",
                open_list.open_len(),
                open_list.closed_len(),
                open_list.node(current).state
            );
            if elapsed >= limits.timeout {
                stats.finish(elapsed);
                stats.print();
                debug!("timeout after {elapsed:?}");
                return Err(SearchError::Timeout { elapsed, stats });
            }
        }

        let current_node = open_list.node(current);
        trace!("expand node: {:?}", current_node.state);

        if space.is_goal(&current_node.state) {
            let runtime = search_start_time.elapsed();
            stats.finish(runtime);
            stats.print();
            return Ok(build_plan(&open_list, current, runtime, stats));
        }

        stats.expanded_nodes += 1;
        let tentative_g_cost = current_node.g_cost + 1;
        let children = space.successors(&current_node.state);

        for child in children {
            stats.generated_nodes += 1;

            if limits
                .max_segments
                .is_some_and(|max_segments| child.segments() > max_segments)
            {
                stats.pruned_by_segments += 1;
                continue;
            }

            // Closed or already queued: never re-opened or updated.
            if open_list.contains(&child) {
                continue;
            }

            // Some agent moved somewhere its target cannot be reached from.
            let Some(h_cost) = heuristic.joint_cost(child.positions(), targets) else {
                continue;
            };

            open_list.push(child, Some(current), tentative_g_cost, h_cost);
        }

        stats.max_open_size = stats.max_open_size.max(open_list.open_len());
    }

    let elapsed = search_start_time.elapsed();
    stats.finish(elapsed);
    stats.print();
    debug!("cannot find solution");
    Err(SearchError::Exhausted { elapsed, stats })
}

fn build_plan<S: JointState>(
    open_list: &OpenList<S>,
    goal: NodeId,
    runtime: Duration,
    stats: Stats,
) -> JointPlan {
    let trace = open_list.trace_back(goal);
    let states: Vec<Vec<Position>> = trace.iter().map(|state| state.positions().to_vec()).collect();
    let segments = trace.iter().map(|state| state.segments()).collect();
    let num_agents = states.first().map_or(0, |positions| positions.len());

    let paths: Vec<Path> = (0..num_agents)
        .map(|agent| {
            states
                .iter()
                .map(|positions| positions[agent])
                .take_while(|position| !position.is_goal())
                .filter_map(|position| position.node())
                .collect()
        })
        .collect();

    JointPlan {
        solution: Solution { paths },
        cost: open_list.node(goal).g_cost,
        states,
        segments,
        runtime,
        stats,
    }
}
