use super::Solver;
use crate::algorithm::build_planner;
use crate::common::{detect_conflicts, Agent, HighLevelNode, Solution};
use crate::config::Config;
use crate::error::{MapfError, MapfResult};
use crate::map::Map;
use crate::stat::Stats;

use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{debug, info, instrument};

pub struct CBS<'a> {
    agents: Vec<Agent>,
    map: &'a Map,
    stats: Stats,
}

impl<'a> CBS<'a> {
    pub fn new(agents: Vec<Agent>, map: &'a Map) -> Self {
        CBS {
            agents,
            map,
            stats: Stats::default(),
        }
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }
}

impl Solver for CBS<'_> {
    #[instrument(skip_all, name = "cbs", fields(agents = self.agents.len()))]
    fn solve(&mut self, config: &Config) -> MapfResult<Solution> {
        let total_solve_start_time = Instant::now();
        for (index, agent) in self.agents.iter().enumerate() {
            if agent.id != index {
                return Err(MapfError::MapFormat(format!(
                    "agent at position {index} has id {}",
                    agent.id
                )));
            }
            agent.verify(self.map)?;
        }

        let root_planner = build_planner(config.planner, &config.aco, config.seed);
        let branch_planner = build_planner(config.branch_planner(), &config.aco, config.seed);
        info!(
            "root planner: {}, branch planner: {}, conflict policy: {:?}",
            root_planner.name(),
            branch_planner.name(),
            config.conflict_policy
        );

        let root = HighLevelNode::new(&self.agents, self.map, root_planner.as_ref(), &mut self.stats)?;
        let mut next_id = 1;
        let mut open = BTreeSet::new();
        open.insert(root);

        while let Some(current_node) = open.pop_first() {
            if self.stats.high_level_expand_nodes >= config.max_expansions {
                info!("expansion budget of {} exhausted", config.max_expansions);
                self.stats.time_us = total_solve_start_time.elapsed().as_micros() as usize;
                return Err(MapfError::NoConflictFreeSolution {
                    expanded: self.stats.high_level_expand_nodes,
                });
            }
            self.stats.high_level_expand_nodes += 1;

            let Some(conflict) = config.conflict_policy.select(&current_node.paths) else {
                // No conflicts, return solution.
                self.stats.time_us = total_solve_start_time.elapsed().as_micros() as usize;
                self.stats.costs = current_node.cost;
                self.stats.print();

                let solution = current_node.into_solution();
                debug_assert!(detect_conflicts(&solution.paths).is_empty());
                return Ok(solution);
            };
            debug!(
                "expand node {} (cost {:.3}, {} constraints), conflict: {conflict:?}",
                current_node.id,
                current_node.cost,
                current_node.constraints.len()
            );

            for resolve_first in [true, false] {
                if let Some(child) = current_node.update_constraint(
                    &conflict,
                    resolve_first,
                    &self.agents,
                    self.map,
                    branch_planner.as_ref(),
                    &mut self.stats,
                    next_id,
                ) {
                    open.insert(child);
                    next_id += 1;
                }
            }
        }

        info!("constraint tree exhausted");
        self.stats.time_us = total_solve_start_time.elapsed().as_micros() as usize;
        Err(MapfError::NoConflictFreeSolution {
            expanded: self.stats.high_level_expand_nodes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::{AcoParams, PlannerKind};
    use crate::common::{path_cost, Cell, ConflictPolicy};
    use crate::scenario::parse_occupancy;
    use crate::solver::solve_mapf;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("info")
            .with_test_writer()
            .try_init();
    }

    fn agents(pairs: &[(Cell, Cell)]) -> Vec<Agent> {
        pairs
            .iter()
            .enumerate()
            .map(|(id, &(start, goal))| Agent { id, start, goal })
            .collect()
    }

    fn map_from(text: &str) -> Map {
        Map::construct_graph(&parse_occupancy(text).unwrap()).unwrap()
    }

    #[test]
    fn test_cbs_around_obstacle() {
        init_tracing();
        let map = map_from("E E E E E\nE E E E E\nE E O E E\nE E E E E\nE E E E E");
        let agents = agents(&[((0, 0), (4, 4)), ((4, 0), (0, 4))]);

        let astar = Config::default();
        let hybrid = Config {
            planner: PlannerKind::Aco,
            branch_planner: Some(PlannerKind::Astar),
            seed: 3,
            ..Config::default()
        };
        for config in [astar, hybrid] {
            let mut solver = CBS::new(agents.clone(), &map);
            let solution = solver.solve(&config).unwrap();
            assert_eq!(solution.paths.len(), 2);
            for (agent, path) in agents.iter().zip(&solution.paths) {
                assert_eq!(path.last(), Some(&agent.goal));
            }
            assert!(detect_conflicts(&solution.paths).is_empty());
            assert!(solution.verify(&map, &agents));
        }
    }

    #[test]
    fn test_cbs_crossing_needs_branching() {
        init_tracing();
        let map = map_from("E E E\nE E E\nE E E");
        let agents = agents(&[((1, 0), (1, 2)), ((0, 1), (2, 1))]);

        for conflict_policy in [ConflictPolicy::First, ConflictPolicy::Earliest] {
            let config = Config {
                conflict_policy,
                ..Config::default()
            };
            let mut solver = CBS::new(agents.clone(), &map);
            let solution = solver.solve(&config).unwrap();
            assert!(solver.stats().high_level_expand_nodes > 1);
            assert!(solution.verify(&map, &agents));
            assert!((solution.cost - (2.0 + 2.0 * 2f64.sqrt())).abs() < 1e-9);
        }
    }

    #[test]
    fn test_cbs_corridor_swap() {
        init_tracing();
        let map = map_from("E E E\nO E O");
        let agents = agents(&[((0, 0), (0, 2)), ((0, 2), (0, 0))]);

        let solution = solve_mapf(&map, &agents, &Config::default()).unwrap();
        assert!(solution.verify(&map, &agents));
        assert!((solution.cost - (2.0 + 2.0 * 2f64.sqrt())).abs() < 1e-9);
        let total: f64 = solution.paths.iter().map(|path| path_cost(path)).sum();
        assert!((solution.cost - total).abs() < 1e-9);
    }

    #[test]
    fn test_cbs_shared_start_exhausts() {
        init_tracing();
        let map = map_from("E E\nE E");
        let agents = agents(&[((0, 0), (1, 1)), ((0, 0), (0, 1))]);

        let result = solve_mapf(&map, &agents, &Config::default());
        assert!(matches!(
            result,
            Err(MapfError::NoConflictFreeSolution { expanded: 1 })
        ));
    }

    #[test]
    fn test_cbs_shared_goal_hits_budget() {
        init_tracing();
        let map = map_from("E E E\nE E E");
        let agents = agents(&[((0, 0), (0, 2)), ((1, 0), (0, 2))]);
        let config = Config {
            max_expansions: 50,
            ..Config::default()
        };

        let mut solver = CBS::new(agents.clone(), &map);
        let result = solver.solve(&config);
        assert!(matches!(
            result,
            Err(MapfError::NoConflictFreeSolution { expanded: 50 })
        ));
        assert_eq!(solver.stats().high_level_expand_nodes, 50);
        assert!(solver.stats().time_us > 0);
        assert!(solver.stats().low_level_expand_nodes > 0);
    }

    #[test]
    fn test_cbs_rejects_blocked_start() {
        init_tracing();
        let map = map_from("O E\nE E");
        let agents = agents(&[((0, 0), (1, 1))]);

        let result = solve_mapf(&map, &agents, &Config::default());
        assert!(matches!(
            result,
            Err(MapfError::ObstacleStart { agent: 0, cell: (0, 0) })
        ));
    }

    #[test]
    fn test_cbs_with_aco_only() {
        init_tracing();
        let map = map_from("E E E\nO O O\nE E E");
        let agents = agents(&[((0, 0), (0, 2)), ((2, 0), (2, 2))]);
        let config = Config {
            planner: PlannerKind::Aco,
            aco: AcoParams {
                n_ants: 5,
                iterations: 3,
                ..AcoParams::default()
            },
            ..Config::default()
        };

        let mut solver = CBS::new(agents.clone(), &map);
        let solution = solver.solve(&config).unwrap();
        assert_eq!(solution.paths[0], vec![(0, 0), (0, 1), (0, 2)]);
        assert_eq!(solution.paths[1], vec![(2, 0), (2, 1), (2, 2)]);
        assert_eq!(solver.stats().high_level_expand_nodes, 1);
        assert_eq!(solver.stats().aco_iterations, 6);
    }

    #[test]
    fn test_cbs_repairs_with_aco_branches() {
        init_tracing();
        let crossing = (
            map_from("E E E\nE E E\nE E E"),
            agents(&[((1, 0), (1, 2)), ((0, 1), (2, 1))]),
        );
        let around_obstacle = (
            map_from("E E E E E\nE E E E E\nE E O E E\nE E E E E\nE E E E E"),
            agents(&[((0, 0), (4, 4)), ((4, 0), (0, 4))]),
        );

        for seed in 0..5 {
            let config = Config {
                planner: PlannerKind::Aco,
                seed,
                ..Config::default()
            };
            assert_eq!(config.branch_planner(), PlannerKind::Aco);

            let (map, agents) = &crossing;
            let mut solver = CBS::new(agents.clone(), map);
            let solution = solver.solve(&config).unwrap();
            assert!(solver.stats().high_level_expand_nodes > 1);
            assert!(solver.stats().aco_iterations > 2 * config.aco.iterations);
            assert!(solution.verify(map, agents));

            let (map, agents) = &around_obstacle;
            let solution = solve_mapf(map, agents, &config).unwrap();
            assert!(solution.verify(map, agents));
        }
    }
}
