use anyhow::{anyhow, bail, Context, Result};
use rand::prelude::*;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use tracing::info;

use crate::common::Agent;

#[derive(Debug, Deserialize, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Route {
    pub start_x: usize,
    pub start_y: usize,
    pub goal_x: usize,
    pub goal_y: usize,
}

impl Route {
    fn to_agent(&self, id: usize) -> Agent {
        Agent {
            id,
            start: (self.start_x, self.start_y),
            goal: (self.goal_x, self.goal_y),
        }
    }
}

type Bucket = Vec<Route>;

/// A MovingAI scenario: routes in file order, also grouped by bucket.
#[derive(Debug)]
pub struct Scenario {
    pub map: String,
    pub map_width: usize,
    pub map_height: usize,
    pub routes: Vec<Route>,
    pub buckets: BTreeMap<usize, Bucket>,
}

impl Scenario {
    pub fn load_from_scen(path: &str) -> Result<Scenario> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("cannot read scenario file {path}"))?;
        Self::parse(&contents).with_context(|| format!("malformed scenario file {path}"))
    }

    pub fn parse(contents: &str) -> Result<Scenario> {
        let mut lines = contents.lines();

        // First line is "version x.x" which we can skip
        let _version = lines.next().ok_or_else(|| anyhow!("empty scenario"))?;

        let mut scenario = Scenario {
            map: String::new(),
            map_width: 0,
            map_height: 0,
            routes: Vec::new(),
            buckets: BTreeMap::new(),
        };

        for (line_no, line) in lines.enumerate() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.is_empty() {
                continue;
            }
            if parts.len() < 8 {
                bail!(
                    "line {} has {} columns, expected at least 8",
                    line_no + 2,
                    parts.len()
                );
            }
            let field = |idx: usize| -> Result<usize> {
                parts[idx]
                    .parse()
                    .with_context(|| format!("line {}: bad column {idx}", line_no + 2))
            };

            let bucket_index = field(0)?;

            // Columns are x (column) then y (row); nodes are (row, col).
            let route = Route {
                start_x: field(5)?,
                start_y: field(4)?,
                goal_x: field(7)?,
                goal_y: field(6)?,
            };

            if scenario.map.is_empty() {
                // Initialize map details from the first route entry
                scenario.map = parts[1].to_string();
                scenario.map_width = field(2)?;
                scenario.map_height = field(3)?;
            }

            scenario
                .buckets
                .entry(bucket_index)
                .or_default()
                .push(route.clone());
            scenario.routes.push(route);
        }

        Ok(scenario)
    }

    /// The first `num_agents` routes in file order.
    pub fn first_agents(&self, num_agents: usize) -> Result<Vec<Agent>> {
        if self.routes.len() < num_agents {
            bail!(
                "scenario has {} routes, {num_agents} agents requested",
                self.routes.len()
            );
        }
        let agents: Vec<Agent> = self
            .routes
            .iter()
            .take(num_agents)
            .enumerate()
            .map(|(id, route)| route.to_agent(id))
            .collect();
        info!("Generate scen: {agents:?}");
        Ok(agents)
    }

    pub fn generate_agents_by_buckets<R: Rng + ?Sized>(
        &self,
        num_agents: usize,
        agent_buckets: &[usize],
        rng: &mut R,
    ) -> Result<Vec<Agent>> {
        if agent_buckets.len() != num_agents {
            bail!("Number of agents does not match the length of agent_buckets");
        }

        let mut agents: Vec<Agent> = Vec::new();
        let mut used_routes: BTreeMap<usize, HashSet<usize>> = BTreeMap::new();

        for (agent_id, &bucket_index) in agent_buckets.iter().enumerate() {
            let bucket = self
                .buckets
                .get(&bucket_index)
                .ok_or_else(|| anyhow!("Bucket {bucket_index} not found"))?;

            // Find unused routes
            let available_routes: Vec<usize> = (0..bucket.len())
                .filter(|idx| {
                    used_routes
                        .get(&bucket_index)
                        .is_none_or(|used| !used.contains(idx))
                })
                .collect();

            // Select a random route from available ones
            let route_index = available_routes
                .choose(rng)
                .ok_or_else(|| anyhow!("No available routes left in bucket {bucket_index}"))?;

            agents.push(bucket[*route_index].to_agent(agent_id));

            // Mark this route as used
            used_routes
                .entry(bucket_index)
                .or_default()
                .insert(*route_index);
        }

        info!("Generate scen: {agents:?}");
        Ok(agents)
    }

    pub fn generate_agents_randomly<R: Rng + ?Sized>(
        &self,
        num_agents: usize,
        rng: &mut R,
    ) -> Result<Vec<Agent>> {
        let mut available_routes = self.routes.clone();
        available_routes.sort();
        available_routes.dedup();

        if available_routes.len() < num_agents {
            bail!("Not enough unique routes available to match the number of agents");
        }

        // Shuffle the available routes to randomize the route selection
        available_routes.shuffle(rng);

        let agents: Vec<Agent> = available_routes
            .iter()
            .take(num_agents)
            .enumerate()
            .map(|(id, route)| route.to_agent(id))
            .collect();

        info!("Generate scen: {agents:?}");
        Ok(agents)
    }

    pub fn load_agents_from_yaml(path: &str) -> Result<Vec<Agent>> {
        let file = File::open(path).with_context(|| format!("cannot open agents file {path}"))?;
        let reader = BufReader::new(file);
        let agents = serde_yaml::from_reader(reader)
            .with_context(|| format!("malformed agents file {path}"))?;
        Ok(agents)
    }

    pub fn write_agents_to_yaml(path: &str, agents: &[Agent]) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = io::BufWriter::new(file);
        let yaml_data = serde_yaml::to_string(&agents)?;
        writer.write_all(yaml_data.as_bytes())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_read_scenario() {
        let scen = Scenario::load_from_scen("map_file/test/lanes.scen")
            .expect("Error loading scenario");

        assert_eq!(scen.map, "lanes.map");
        assert_eq!(scen.map_width, 5);
        assert_eq!(scen.map_height, 3);
        assert_eq!(scen.routes.len(), 3);
        assert_eq!(scen.buckets[&0].len(), 2);

        let agents = scen.first_agents(2).unwrap();
        let answer = [
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
        ];
        assert_eq!(agents, answer);
        assert!(scen.first_agents(4).is_err());
    }

    #[test]
    fn test_generate_agents_by_buckets() {
        let scen = Scenario::load_from_scen("map_file/test/lanes.scen").unwrap();
        let mut rng = StdRng::seed_from_u64(0);

        let agents = scen
            .generate_agents_by_buckets(2, &[1, 0], &mut rng)
            .unwrap();
        assert_eq!(agents.len(), 2);
        assert_eq!(
            agents[0],
            Agent {
                id: 0,
                start: (0, 1),
                goal: (0, 3),
            }
        );
        assert_eq!(agents[1].id, 1);

        // Bucket 1 only holds one route.
        assert!(scen
            .generate_agents_by_buckets(2, &[1, 1], &mut rng)
            .is_err());
        assert!(scen.generate_agents_by_buckets(1, &[7], &mut rng).is_err());
    }

    #[test]
    fn test_generate_agents_randomly_is_seeded() {
        let scen = Scenario::load_from_scen("map_file/test/lanes.scen").unwrap();
        let first = scen
            .generate_agents_randomly(3, &mut StdRng::seed_from_u64(7))
            .unwrap();
        let second = scen
            .generate_agents_randomly(3, &mut StdRng::seed_from_u64(7))
            .unwrap();
        assert_eq!(first, second);
        assert!(scen
            .generate_agents_randomly(4, &mut StdRng::seed_from_u64(7))
            .is_err());
    }

    #[test]
    fn test_malformed_scenario() {
        assert!(Scenario::parse("").is_err());
        assert!(Scenario::parse("version 1\n0\tx.map\t5\t3\t0\n").is_err());
        assert!(Scenario::parse("version 1\n0\tx.map\t5\t3\ta\t0\t1\t1\t1.0\n").is_err());

        // The trailing optimal-length column is optional.
        let scen = Scenario::parse("version 1\n0\tx.map\t5\t3\t2\t0\t4\t1\n").unwrap();
        assert_eq!(scen.routes[0].to_agent(0).start, (0, 2));
        assert_eq!(scen.routes[0].to_agent(0).goal, (1, 4));
        let err = Scenario::parse("version 1\n0\tx.map\t5\t3\t2\t0\t4\n").unwrap_err();
        assert!(format!("{err:#}").contains("has 7 columns, expected at least 8"));
    }
}
