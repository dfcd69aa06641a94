use anyhow::anyhow;
use clap::Parser;
use serde::Deserialize;

use crate::algorithm::{AcoParams, PlannerKind};
use crate::common::ConflictPolicy;

#[derive(Parser, Debug)]
#[command(
    name = "MAPF ACO",
    about = "Conflict-based search over ant colony and A* single-agent planners.",
    version = "1.0"
)]
pub struct Cli {
    #[arg(long, help = "Path to a YAML config file")]
    pub config: Option<String>,

    #[arg(long, help = "Path to the grid map file (E/O/S/F tokens)")]
    pub map_path: Option<String>,

    #[arg(long, help = "Path to a YAML agent list replacing the S/F markers")]
    pub agents_path: Option<String>,

    #[arg(long, help = "Path to write the JSON solution to")]
    pub output_path: Option<String>,

    #[arg(long, help = "Seed for the random number generator")]
    pub seed: Option<u64>,

    #[arg(long, value_enum, help = "Single-agent planner")]
    pub planner: Option<PlannerKind>,

    #[arg(
        long,
        value_enum,
        help = "Planner for constraint tree replans (defaults to --planner)"
    )]
    pub branch_planner: Option<PlannerKind>,

    #[arg(long, value_enum, help = "Which conflict to branch on")]
    pub conflict_policy: Option<ConflictPolicy>,

    #[arg(long, help = "Maximum number of constraint tree expansions")]
    pub max_expansions: Option<usize>,

    #[arg(long, help = "ACO: number of ants per iteration")]
    pub ants: Option<usize>,

    #[arg(long, help = "ACO: number of iterations")]
    pub iterations: Option<usize>,

    #[arg(long, help = "ACO: pheromone exponent")]
    pub alpha: Option<f64>,

    #[arg(long, help = "ACO: heuristic exponent")]
    pub beta: Option<f64>,

    #[arg(long, help = "ACO: evaporation rate")]
    pub rho: Option<f64>,

    #[arg(long, help = "ACO: pheromone deposit constant")]
    pub q: Option<f64>,

    #[arg(long, help = "ACO: maximum time steps per ant")]
    pub max_time_steps: Option<usize>,

    #[arg(
        long,
        value_delimiter = ',',
        value_name = "ROWS,COLS,AGENTS,DENSITY",
        help = "Generate a random map instead of reading one: rows,cols,agents,density"
    )]
    pub generate: Option<Vec<String>>,

    #[arg(long, help = "Path to save the generated map to")]
    pub save_map_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GenerateParams {
    pub rows: usize,
    pub cols: usize,
    pub num_agents: usize,
    pub obstacle_density: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub map_path: String,
    pub agents_path: Option<String>,
    pub output_path: Option<String>,
    pub seed: u64,
    pub planner: PlannerKind,
    pub branch_planner: Option<PlannerKind>,
    pub conflict_policy: ConflictPolicy,
    pub max_expansions: usize,
    pub aco: AcoParams,
    pub generate: Option<GenerateParams>,
    pub save_map_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            map_path: "map_file/small.txt".to_string(),
            agents_path: None,
            output_path: None,
            seed: 0,
            planner: PlannerKind::Astar,
            branch_planner: None,
            conflict_policy: ConflictPolicy::First,
            max_expansions: 1000,
            aco: AcoParams::default(),
            generate: None,
            save_map_path: None,
        }
    }
}

impl Config {
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn override_from_command_line(mut self, cli: &Cli) -> anyhow::Result<Self> {
        if let Some(map_path) = &cli.map_path {
            self.map_path = map_path.clone();
        }
        if cli.agents_path.is_some() {
            self.agents_path = cli.agents_path.clone();
        }
        if cli.output_path.is_some() {
            self.output_path = cli.output_path.clone();
        }
        if let Some(seed) = cli.seed {
            self.seed = seed;
        }
        if let Some(planner) = cli.planner {
            self.planner = planner;
        }
        if cli.branch_planner.is_some() {
            self.branch_planner = cli.branch_planner;
        }
        if let Some(conflict_policy) = cli.conflict_policy {
            self.conflict_policy = conflict_policy;
        }
        if let Some(max_expansions) = cli.max_expansions {
            self.max_expansions = max_expansions;
        }

        if let Some(n_ants) = cli.ants {
            self.aco.n_ants = n_ants;
        }
        if let Some(iterations) = cli.iterations {
            self.aco.iterations = iterations;
        }
        if let Some(alpha) = cli.alpha {
            self.aco.alpha = alpha;
        }
        if let Some(beta) = cli.beta {
            self.aco.beta = beta;
        }
        if let Some(rho) = cli.rho {
            self.aco.rho = rho;
        }
        if let Some(q) = cli.q {
            self.aco.q = q;
        }
        if let Some(max_time_steps) = cli.max_time_steps {
            self.aco.max_time_steps = max_time_steps;
        }

        if let Some(values) = &cli.generate {
            let [rows, cols, num_agents, density] = values.as_slice() else {
                return Err(anyhow!("--generate expects rows,cols,agents,density"));
            };
            self.generate = Some(GenerateParams {
                rows: rows.trim().parse()?,
                cols: cols.trim().parse()?,
                num_agents: num_agents.trim().parse()?,
                obstacle_density: density.trim().parse()?,
            });
        }
        if cli.save_map_path.is_some() {
            self.save_map_path = cli.save_map_path.clone();
        }

        self.validate()?;
        Ok(self)
    }

    pub fn branch_planner(&self) -> PlannerKind {
        self.branch_planner.unwrap_or(self.planner)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let aco = &self.aco;
        if aco.n_ants == 0 {
            return Err(anyhow!("ACO needs at least one ant"));
        }
        if aco.iterations == 0 {
            return Err(anyhow!("ACO needs at least one iteration"));
        }
        if !(aco.rho > 0.0 && aco.rho <= 1.0) {
            return Err(anyhow!(
                "Evaporation rate must be in (0, 1], got {}",
                aco.rho
            ));
        }
        if aco.alpha < 0.0 || aco.beta < 0.0 {
            return Err(anyhow!(
                "Alpha and beta must be non-negative, got {} and {}",
                aco.alpha,
                aco.beta
            ));
        }
        if aco.q <= 0.0 {
            return Err(anyhow!("Deposit constant must be positive, got {}", aco.q));
        }
        if aco.initial_pheromone <= 0.0 {
            return Err(anyhow!(
                "Initial pheromone must be positive, got {}",
                aco.initial_pheromone
            ));
        }
        if aco.max_time_steps == 0 {
            return Err(anyhow!("Max time steps must be positive"));
        }
        if self.max_expansions == 0 {
            return Err(anyhow!("Max expansions must be positive"));
        }
        if let Some(generate) = &self.generate {
            if !(0.0..1.0).contains(&generate.obstacle_density) {
                return Err(anyhow!(
                    "Obstacle density must be in [0, 1), got {}",
                    generate.obstacle_density
                ));
            }
            if generate.rows == 0 || generate.cols == 0 || generate.num_agents == 0 {
                return Err(anyhow!("Generated map needs rows, cols and agents"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
map_path: map_file/middle.txt
seed: 7
planner: aco
branch_planner: astar
conflict_policy: earliest
aco:
  n_ants: 8
  rho: 0.3
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.map_path, "map_file/middle.txt");
        assert_eq!(config.seed, 7);
        assert_eq!(config.planner, PlannerKind::Aco);
        assert_eq!(config.branch_planner(), PlannerKind::Astar);
        assert_eq!(config.conflict_policy, ConflictPolicy::Earliest);
        assert_eq!(config.aco.n_ants, 8);
        assert_eq!(config.aco.rho, 0.3);
        assert_eq!(config.aco.iterations, AcoParams::default().iterations);
        assert_eq!(config.max_expansions, Config::default().max_expansions);
    }

    #[test]
    fn test_config_rejects_bad_values() {
        assert!(Config::from_yaml_str("aco:\n  rho: 0.0\n").is_err());
        assert!(Config::from_yaml_str("aco:\n  n_ants: 0\n").is_err());
        assert!(Config::from_yaml_str("max_expansions: 0\n").is_err());
        assert!(Config::from_yaml_str(
            "generate:\n  rows: 4\n  cols: 4\n  num_agents: 2\n  obstacle_density: 1.5\n"
        )
        .is_err());
    }

    #[test]
    fn test_command_line_override() {
        let cli = Cli::parse_from([
            "mapf_aco",
            "--planner",
            "aco",
            "--ants",
            "5",
            "--rho",
            "0.5",
            "--generate",
            "8,8,3,0.2",
        ]);
        let config = Config::default().override_from_command_line(&cli).unwrap();
        assert_eq!(config.planner, PlannerKind::Aco);
        assert_eq!(config.branch_planner(), PlannerKind::Aco);
        assert_eq!(config.aco.n_ants, 5);
        assert_eq!(config.aco.rho, 0.5);
        assert_eq!(
            config.generate,
            Some(GenerateParams {
                rows: 8,
                cols: 8,
                num_agents: 3,
                obstacle_density: 0.2,
            })
        );

        let bad = Cli::parse_from(["mapf_aco", "--rho", "2.0"]);
        assert!(Config::default().override_from_command_line(&bad).is_err());
    }
}
