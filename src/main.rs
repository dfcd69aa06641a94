use mapf_aco::config::{Cli, Config};
use mapf_aco::map::Map;
use mapf_aco::scenario::Scenario;
use mapf_aco::solver::{Solver, CBS};

use anyhow::{bail, Context};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
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

    let mut scenario = if let Some(generate) = &config.generate {
        let mut rng = StdRng::seed_from_u64(config.seed);
        Scenario::generate(
            generate.rows,
            generate.cols,
            generate.num_agents,
            generate.obstacle_density,
            &mut rng,
        )
        .context("error generating map")?
    } else {
        Scenario::load_from_file(&config.map_path)
            .with_context(|| format!("error loading map: {}", config.map_path))?
    };
    if let Some(agents_path) = &config.agents_path {
        scenario.agents = Scenario::load_agents_from_yaml(agents_path)
            .with_context(|| format!("error loading agents: {agents_path}"))?;
    }
    if let Some(save_map_path) = &config.save_map_path {
        scenario
            .write_to_file(save_map_path)
            .with_context(|| format!("error saving map: {save_map_path}"))?;
        info!("Map saved to {save_map_path}");
    }

    let map = Map::construct_graph(&scenario.occupancy)?;
    info!(
        "Map {}x{}, {} agents",
        map.height,
        map.width,
        scenario.agents.len()
    );

    let mut cbs_solver = CBS::new(scenario.agents.clone(), &map);
    let solution = match cbs_solver.solve(&config) {
        Ok(solution) => solution,
        Err(err) => {
            error!("cbs solve fails: {err}");
            cbs_solver.stats().print();
            return Err(err.into());
        }
    };
    if !solution.verify(&map, &scenario.agents) {
        bail!("solution failed verification");
    }
    for (agent, path) in scenario.agents.iter().zip(&solution.paths) {
        info!("agent {} path: {path:?}", agent.id);
    }

    if let Some(output_path) = &config.output_path {
        let json = serde_json::to_string_pretty(&solution)?;
        std::fs::write(output_path, json)
            .with_context(|| format!("error writing solution: {output_path}"))?;
        info!("Solution written to {output_path}");
    }

    Ok(())
}
