mod aco;
mod astar;

pub use aco::{AcoParams, AcoPlanner, PheromoneField};
pub use astar::AStarPlanner;

use clap::ValueEnum;
use serde::Deserialize;
use std::collections::HashMap;

use crate::common::{Agent, Cell, ConstraintSet, Path};
use crate::error::MapfResult;
use crate::map::Map;
use crate::stat::Stats;

/// Single-agent search under space-time constraints.
pub trait SingleAgentPlanner: Send + Sync {
    fn name(&self) -> &'static str;

    /// Path for `agent` from its start to its goal respecting every
    /// constraint in `constraints` that names `agent`.
    fn plan(
        &self,
        map: &Map,
        agent: &Agent,
        constraints: &ConstraintSet,
        stats: &mut Stats,
    ) -> MapfResult<Path>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PlannerKind {
    #[default]
    #[serde(alias = "a_star")]
    #[value(alias = "a_star")]
    Astar,
    Aco,
}

pub fn build_planner(kind: PlannerKind, params: &AcoParams, seed: u64) -> Box<dyn SingleAgentPlanner> {
    match kind {
        PlannerKind::Astar => Box::new(AStarPlanner),
        PlannerKind::Aco => Box::new(AcoPlanner::new(params.clone(), seed)),
    }
}

pub fn plan_single_agent(
    map: &Map,
    agent: &Agent,
    constraints: &ConstraintSet,
    kind: PlannerKind,
    params: &AcoParams,
    seed: u64,
    stats: &mut Stats,
) -> MapfResult<Path> {
    build_planner(kind, params, seed).plan(map, agent, constraints, stats)
}

type Trace = HashMap<(Cell, usize), (Cell, usize)>;

fn construct_path(trace: &Trace, mut current: (Cell, usize)) -> Path {
    let mut path = vec![current.0];
    while let Some(&previous) = trace.get(&current) {
        path.push(previous.0);
        current = previous;
    }
    path.reverse();
    path
}
