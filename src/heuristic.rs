use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use tracing::{debug, instrument};

use crate::common::{Node, Position};
use crate::map::BaseGraph;

/// All-pairs shortest-path lengths (in edges) over a base graph.
///
/// Built once per solver and read-only afterwards. Memory is O(V^2).
#[derive(Debug, Clone)]
pub struct HeuristicTable {
    index: HashMap<Node, usize>,
    distances: Vec<Vec<usize>>, // usize::MAX marks an unreachable pair
}

impl HeuristicTable {
    #[instrument(skip_all, name = "heuristic_table", level = "debug")]
    pub fn build<G: BaseGraph>(graph: &G) -> Self {
        let nodes = graph.nodes();
        let index: HashMap<Node, usize> = nodes
            .iter()
            .enumerate()
            .map(|(idx, &node)| (node, idx))
            .collect();

        let distances = nodes
            .iter()
            .map(|&source| Self::single_source(graph, &index, source))
            .collect();
        debug!("built distance table for {} nodes", nodes.len());

        HeuristicTable { index, distances }
    }

    fn single_source<G: BaseGraph>(
        graph: &G,
        index: &HashMap<Node, usize>,
        source: Node,
    ) -> Vec<usize> {
        let mut distance = vec![usize::MAX; index.len()];
        let mut heap = BinaryHeap::new();

        distance[index[&source]] = 0;
        heap.push((Reverse(0), source));

        while let Some((Reverse(cost), node)) = heap.pop() {
            if cost > distance[index[&node]] {
                continue;
            }

            for neighbor in graph.neighbors(node) {
                let Some(&neighbor_idx) = index.get(neighbor) else {
                    continue;
                };
                let next_cost = cost + 1;
                if next_cost < distance[neighbor_idx] {
                    heap.push((Reverse(next_cost), *neighbor));
                    distance[neighbor_idx] = next_cost;
                }
            }
        }

        distance
    }

    /// Shortest-path length from `from` to `to`, `None` if no path exists or
    /// either node is outside the graph.
    pub fn distance(&self, from: Node, to: Node) -> Option<usize> {
        let from_idx = *self.index.get(&from)?;
        let to_idx = *self.index.get(&to)?;
        match self.distances[from_idx][to_idx] {
            usize::MAX => None,
            distance => Some(distance),
        }
    }

    /// Sum over agents not yet at `Goal` of the distance to their target.
    /// `None` when some agent can no longer reach its target.
    pub fn joint_cost(&self, positions: &[Position], targets: &[Node]) -> Option<usize> {
        positions
            .iter()
            .zip(targets)
            .try_fold(0, |total, (position, &target)| match position {
                Position::Goal => Some(total),
                Position::At(node) => Some(total + self.distance(*node, target)?),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::Map;

    // Floyd-Warshall over the same graph, for cross-checking.
    fn brute_force(map: &Map) -> HashMap<(Node, Node), usize> {
        let nodes = map.nodes();
        let mut dist = HashMap::new();
        for &u in &nodes {
            dist.insert((u, u), 0);
            for &v in map.neighbors(u) {
                dist.insert((u, v), 1);
            }
        }
        for &k in &nodes {
            for &i in &nodes {
                for &j in &nodes {
                    if let (Some(&ik), Some(&kj)) = (dist.get(&(i, k)), dist.get(&(k, j))) {
                        let through = ik + kj;
                        if dist.get(&(i, j)).is_none_or(|&ij| through < ij) {
                            dist.insert((i, j), through);
                        }
                    }
                }
            }
        }
        dist
    }

    #[test]
    fn test_matches_brute_force() {
        let map = Map::parse("type octile\nheight 3\nwidth 4\nmap\n..@.\n.@..\n....\n").unwrap();
        let table = HeuristicTable::build(&map);
        let expected = brute_force(&map);

        assert_eq!(table.distance((0, 2), (0, 0)), None);
        for u in map.nodes() {
            for v in map.nodes() {
                assert_eq!(table.distance(u, v), expected.get(&(u, v)).copied());
            }
        }
        assert_eq!(table.distance((0, 0), (0, 3)), Some(7));
    }

    #[test]
    fn test_unreachable_pairs() {
        let map = Map::parse("type octile\nheight 3\nwidth 3\nmap\n...\n@@@\n...\n").unwrap();
        let table = HeuristicTable::build(&map);

        assert_eq!(table.distance((0, 0), (2, 0)), None);
        assert_eq!(table.distance((0, 0), (1, 1)), None);
        assert_eq!(table.distance((0, 0), (0, 2)), Some(2));
    }

    #[test]
    fn test_joint_cost_skips_goal_agents() {
        let map = Map::from_file("map_file/test/test.map").unwrap();
        let table = HeuristicTable::build(&map);
        let targets = [(2, 2), (0, 0)];

        let positions = [Position::At((0, 0)), Position::Goal];
        assert_eq!(table.joint_cost(&positions, &targets), Some(4));

        let positions = [Position::At((0, 0)), Position::At((2, 2))];
        assert_eq!(table.joint_cost(&positions, &targets), Some(8));
    }
}
