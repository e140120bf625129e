use explainable_mapf::config::{Cli, Config};
use explainable_mapf::map::Map;
use explainable_mapf::planner::ExplainablePlanner;
use explainable_mapf::scenario::Scenario;

use anyhow::{bail, Context};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let cli = Cli::parse();

    let config = if let Some(config_file) = cli.config.as_ref() {
        let config_str = std::fs::read_to_string(config_file)
            .with_context(|| format!("cannot read config file: {config_file}"))?;
        Config::from_yaml_str(&config_str)
            .with_context(|| format!("error with config file: {config_file}"))?
    } else {
        info!("No config file specified, using default config");
        Config::default()
    }
    .override_from_command_line(&cli)?;

    let map = Map::from_file(&config.map_path)?;
    let agents = if let Some(agents_yaml) = &config.agents_yaml {
        Scenario::load_agents_from_yaml(agents_yaml)?
    } else {
        let scenario = Scenario::load_from_scen(&config.scen_path)?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        if !config.agents_dist.is_empty() {
            scenario.generate_agents_by_buckets(config.num_agents, &config.agents_dist, &mut rng)?
        } else if config.random_agents {
            scenario.generate_agents_randomly(config.num_agents, &mut rng)?
        } else {
            scenario.first_agents(config.num_agents)?
        }
    };
    if let Some(dump_path) = &config.dump_agents {
        Scenario::write_agents_to_yaml(dump_path, &agents)
            .with_context(|| format!("cannot write agents to {dump_path}"))?;
    }
    for agent in &agents {
        if !agent.verify(&map) {
            bail!("agent {} has an endpoint off the map: {agent:?}", agent.id);
        }
    }

    let mut planner = ExplainablePlanner::new(&map, agents, config.mode);
    if let Err(err) = planner.plan(config.max_segments(), config.timeout()) {
        error!("planning fails: {err}");
    } else if let Some(plan) = planner.joint_plan() {
        info!(
            "Plan makespan {}, sum of costs {}, segments used {}",
            plan.solution.makespan(),
            plan.solution.cost(),
            plan.segments.last().copied().unwrap_or(0)
        );
        if let Err(err) = planner.minimal_decomposition() {
            error!("decomposition fails: {err}");
        }
    }

    let report = planner.report(&config.map_path, &config.scen_path, config.num_segments);
    info!("\n{report}");
    if let Some(output_path) = &config.output_path {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(output_path, json)
            .with_context(|| format!("cannot write report to {output_path}"))?;
        info!("Report written to {output_path}");
    }

    Ok(())
}
