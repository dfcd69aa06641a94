use super::SingleAgentPlanner;
use crate::common::{euclidean_distance, Agent, Cell, ConstraintSet, Path};
use crate::error::{MapfError, MapfResult};
use crate::map::Map;
use crate::stat::Stats;

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Deserialize;
use tracing::{debug, instrument, trace};

/// 64-bit fractional golden-ratio constant for seed mixing.
const MIXING_CONSTANT: u64 = 0x9e37_79b9_7f4a_7c15;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AcoParams {
    pub n_ants: usize,
    pub iterations: usize,
    /// Pheromone exponent.
    pub alpha: f64,
    /// Heuristic exponent.
    pub beta: f64,
    /// Evaporation rate.
    pub rho: f64,
    /// Pheromone deposit constant.
    pub q: f64,
    pub initial_pheromone: f64,
    pub max_time_steps: usize,
}

impl Default for AcoParams {
    fn default() -> Self {
        AcoParams {
            n_ants: 20,
            iterations: 20,
            alpha: 1.0,
            beta: 2.0,
            rho: 0.1,
            q: 1.0,
            initial_pheromone: 1.0,
            max_time_steps: 100,
        }
    }
}

/// Desirability weight of every directed edge of a [`Map`], laid out as
/// `values[cell_index][edge_index]` parallel to the map's edge lists.
#[derive(Debug, Clone, PartialEq)]
pub struct PheromoneField {
    values: Vec<Vec<f64>>,
}

impl PheromoneField {
    pub fn new(map: &Map, initial: f64) -> Self {
        let mut values = vec![Vec::new(); map.num_cells()];
        for x in 0..map.height {
            for y in 0..map.width {
                values[map.index((x, y))] = vec![initial; map.edges((x, y)).len()];
            }
        }
        PheromoneField { values }
    }

    pub fn get(&self, map: &Map, cell: Cell, edge_index: usize) -> f64 {
        self.values[map.index(cell)][edge_index]
    }

    /// Weight of the edge `from -> to`, if the map has one.
    pub fn between(&self, map: &Map, from: Cell, to: Cell) -> Option<f64> {
        map.edges(from)
            .iter()
            .position(|edge| edge.to == to)
            .map(|edge_index| self.get(map, from, edge_index))
    }

    pub fn evaporate(&mut self, rho: f64) {
        self.values
            .iter_mut()
            .flatten()
            .for_each(|value| *value *= 1.0 - rho);
    }

    pub fn deposit(&mut self, map: &Map, cell: Cell, edge_index: usize, amount: f64) {
        self.values[map.index(cell)][edge_index] += amount;
    }
}

// One ant's successful construction.
#[derive(Debug, Clone)]
struct Candidate {
    path: Path,
    edges: Vec<(Cell, usize)>,
    length: f64,
}

/// Ant colony planner. Every `plan` call owns a fresh [`PheromoneField`];
/// ants of one iteration build their paths in parallel and the field is
/// updated once they have all finished.
#[derive(Debug, Clone)]
pub struct AcoPlanner {
    params: AcoParams,
    seed: u64,
}

impl AcoPlanner {
    pub fn new(params: AcoParams, seed: u64) -> Self {
        AcoPlanner { params, seed }
    }

    /// Runs every iteration against `field`, leaving the reinforced weights
    /// behind for inspection.
    #[instrument(skip_all, name = "aco", fields(agent = agent.id, start = ?agent.start, goal = ?agent.goal), level = "debug")]
    pub fn solve(
        &self,
        map: &Map,
        agent: &Agent,
        constraints: &ConstraintSet,
        field: &mut PheromoneField,
        stats: &mut Stats,
    ) -> MapfResult<Path> {
        if constraints.is_vertex_forbidden(agent.id, agent.start, 0) {
            debug!("start is constrained at time 0");
            return Err(MapfError::NoPathFound { agent: agent.id });
        }
        let goal_block = constraints.last_vertex_block(agent.id, agent.goal);

        let mut best: Option<Candidate> = None;
        for iteration in 0..self.params.iterations {
            let shared: &PheromoneField = field;
            let constructions: Vec<Option<Candidate>> = (0..self.params.n_ants)
                .into_par_iter()
                .map(|ant| {
                    let mut rng =
                        StdRng::seed_from_u64(ant_seed(self.seed, agent.id, iteration, ant));
                    self.construct(map, agent, constraints, shared, goal_block, &mut rng)
                })
                .collect();
            let candidates: Vec<Candidate> = constructions.into_iter().flatten().collect();

            stats.aco_iterations += 1;
            stats.aco_successful_ants += candidates.len();

            field.evaporate(self.params.rho);
            for candidate in candidates.iter().filter(|c| c.length > 0.0) {
                let amount = self.params.q / candidate.length;
                for &(cell, edge_index) in &candidate.edges {
                    field.deposit(map, cell, edge_index, amount);
                }
            }

            let iteration_best = candidates
                .into_iter()
                .min_by(|a, b| a.length.total_cmp(&b.length));
            match &iteration_best {
                Some(candidate) => debug!(
                    "iteration {iteration}: best length {:.3}, nodes {}",
                    candidate.length,
                    candidate.path.len()
                ),
                None => debug!("iteration {iteration}: no ant reached the goal"),
            }

            if let Some(candidate) = iteration_best {
                if best
                    .as_ref()
                    .map_or(true, |current| candidate.length < current.length)
                {
                    best = Some(candidate);
                }
            }
        }

        best.map(|candidate| candidate.path)
            .ok_or(MapfError::NoPathFound { agent: agent.id })
    }

    fn construct<R: Rng + ?Sized>(
        &self,
        map: &Map,
        agent: &Agent,
        constraints: &ConstraintSet,
        field: &PheromoneField,
        goal_block: Option<usize>,
        rng: &mut R,
    ) -> Option<Candidate> {
        let mut visited = vec![false; map.num_cells()];
        let mut current = agent.start;
        visited[map.index(current)] = true;

        let mut candidate = Candidate {
            path: vec![current],
            edges: Vec::new(),
            length: 0.0,
        };

        loop {
            let time_step = candidate.path.len() - 1;
            if current == agent.goal {
                // Ants cannot wait, so arriving while the goal is still
                // reserved kills the construction.
                return goal_block
                    .map_or(true, |t| time_step > t)
                    .then_some(candidate);
            }
            if time_step >= self.params.max_time_steps {
                trace!("ant exceeded {} time steps", self.params.max_time_steps);
                return None;
            }

            let options: Vec<(usize, Cell, f64)> = map
                .constrained_edges(current, time_step, constraints, agent.id)
                .filter(|(_, edge)| !visited[map.index(edge.to)])
                .map(|(edge_index, edge)| (edge_index, edge.to, edge.distance))
                .collect();
            if options.is_empty() {
                trace!("ant stuck at {current:?} at time {time_step}");
                return None;
            }

            let weights: Vec<f64> = options
                .iter()
                .map(|&(edge_index, to, distance)| {
                    let heuristic = 1.0 / (distance + euclidean_distance(to, agent.goal));
                    field.get(map, current, edge_index).powf(self.params.alpha)
                        * heuristic.powf(self.params.beta)
                })
                .collect();
            let choice = match WeightedIndex::new(&weights) {
                Ok(distribution) => distribution.sample(rng),
                // Every weight underflowed to zero.
                Err(_) => rng.gen_range(0..options.len()),
            };

            let (edge_index, next, distance) = options[choice];
            candidate.edges.push((current, edge_index));
            candidate.path.push(next);
            candidate.length += distance;
            visited[map.index(next)] = true;
            current = next;
        }
    }
}

impl SingleAgentPlanner for AcoPlanner {
    fn name(&self) -> &'static str {
        "aco"
    }

    fn plan(
        &self,
        map: &Map,
        agent: &Agent,
        constraints: &ConstraintSet,
        stats: &mut Stats,
    ) -> MapfResult<Path> {
        let mut field = PheromoneField::new(map, self.params.initial_pheromone);
        self.solve(map, agent, constraints, &mut field, stats)
    }
}

// Independent stream per (agent, iteration, ant) so results do not depend on
// how rayon schedules the ants.
fn ant_seed(seed: u64, agent: usize, iteration: usize, ant: usize) -> u64 {
    [agent, iteration, ant].iter().fold(seed, |acc, &value| {
        (acc ^ value as u64)
            .wrapping_mul(MIXING_CONSTANT)
            .rotate_left(31)
    })
}
