use anyhow::{bail, Context};
use clap::Parser;
use serde::Deserialize;
use std::time::Duration;

use crate::solver::SearchMode;

#[derive(Parser, Debug, Default)]
#[command(
    name = "Explainable MAPF",
    about = "Joint-state A* multi-agent planning with minimal disjoint decomposition.",
    version = "1.0"
)]
pub struct Cli {
    #[arg(long, help = "Path to a YAML config file, overridden by other flags")]
    pub config: Option<String>,

    #[arg(long, help = "Path to the map file")]
    pub map_path: Option<String>,

    #[arg(long, help = "Path to the scenario file")]
    pub scen_path: Option<String>,

    #[arg(long, help = "Path to write the JSON result report to")]
    pub output_path: Option<String>,

    #[arg(long, help = "Load agents from a YAML file instead of the scenario")]
    pub agents_yaml: Option<String>,

    #[arg(long, help = "Write the selected agents to a YAML file")]
    pub dump_agents: Option<String>,

    #[arg(long, help = "Number of agents")]
    pub num_agents: Option<usize>,

    #[arg(long, help = "Maximum number of decomposition parts (minimum 1)")]
    pub num_segments: Option<usize>,

    #[arg(long, help = "Time limit in seconds")]
    pub timeout_secs: Option<u64>,

    #[arg(long, value_enum, help = "Joint state space to search")]
    pub mode: Option<SearchMode>,

    #[arg(long, help = "Scenario bucket per agent", use_value_delimiter = true)]
    pub agents_dist: Vec<usize>,

    #[arg(long, help = "Pick scenario routes at random instead of in file order")]
    pub random_agents: bool,

    #[arg(long, help = "Seed for the random number generator")]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub map_path: String,
    pub scen_path: String,
    pub output_path: Option<String>,
    pub agents_yaml: Option<String>,
    pub dump_agents: Option<String>,
    pub num_agents: usize,
    pub num_segments: usize,
    pub timeout_secs: u64,
    pub mode: SearchMode,
    pub agents_dist: Vec<usize>,
    pub random_agents: bool,
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            map_path: "map_file/test/lanes.map".to_string(),
            scen_path: "map_file/test/lanes.scen".to_string(),
            output_path: None,
            agents_yaml: None,
            dump_agents: None,
            num_agents: 2,
            num_segments: 1,
            timeout_secs: 300,
            mode: SearchMode::History,
            agents_dist: Vec::new(),
            random_agents: false,
            seed: 0,
        }
    }
}

impl Config {
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(yaml).context("invalid config yaml")
    }

    pub fn override_from_command_line(mut self, cli: &Cli) -> anyhow::Result<Self> {
        if let Some(map_path) = &cli.map_path {
            self.map_path = map_path.clone();
        }
        if let Some(scen_path) = &cli.scen_path {
            self.scen_path = scen_path.clone();
        }
        if cli.output_path.is_some() {
            self.output_path = cli.output_path.clone();
        }
        if cli.agents_yaml.is_some() {
            self.agents_yaml = cli.agents_yaml.clone();
        }
        if cli.dump_agents.is_some() {
            self.dump_agents = cli.dump_agents.clone();
        }
        if let Some(num_agents) = cli.num_agents {
            self.num_agents = num_agents;
        }
        if let Some(num_segments) = cli.num_segments {
            self.num_segments = num_segments;
        }
        if let Some(timeout_secs) = cli.timeout_secs {
            self.timeout_secs = timeout_secs;
        }
        if let Some(mode) = cli.mode {
            self.mode = mode;
        }
        if !cli.agents_dist.is_empty() {
            self.agents_dist = cli.agents_dist.clone();
        }
        if cli.random_agents {
            self.random_agents = true;
        }
        if let Some(seed) = cli.seed {
            self.seed = seed;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.num_agents == 0 {
            bail!("Number of agents must be at least 1, got 0");
        }
        if self.num_segments == 0 {
            bail!("Number of segments must be at least 1, got 0");
        }
        if !self.agents_dist.is_empty() && self.agents_dist.len() != self.num_agents {
            bail!(
                "agents_dist has {} entries but {} agents are requested",
                self.agents_dist.len(),
                self.num_agents
            );
        }
        if !self.agents_dist.is_empty() && self.random_agents {
            bail!("agents_dist and random_agents are mutually exclusive");
        }
        Ok(())
    }

    /// History resets the search may spend: one fewer than the number of
    /// decomposition parts.
    pub fn max_segments(&self) -> usize {
        self.num_segments.saturating_sub(1)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
