use super::{construct_path, SingleAgentPlanner};
use crate::common::{euclidean_distance, Agent, Cell, ConstraintSet, Path, WAIT_COST};
use crate::error::{MapfError, MapfResult};
use crate::map::Map;
use crate::stat::Stats;

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use tracing::{debug, instrument, trace};

#[derive(Debug, Clone, Copy)]
struct LowLevelNode {
    position: Cell,
    f_cost: f64,
    g_cost: f64,
    time_step: usize,
}

impl PartialEq for LowLevelNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for LowLevelNode {}

// Reversed for the max-heap: lowest f first, then higher g (deeper) first.
impl Ord for LowLevelNode {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f_cost
            .total_cmp(&self.f_cost)
            .then_with(|| self.g_cost.total_cmp(&other.g_cost))
            .then_with(|| other.time_step.cmp(&self.time_step))
            .then_with(|| other.position.cmp(&self.position))
    }
}

impl PartialOrd for LowLevelNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Space-time A* with a Euclidean heuristic. Optimal under the move/wait
/// cost model of [`crate::common::step_cost`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AStarPlanner;

impl SingleAgentPlanner for AStarPlanner {
    fn name(&self) -> &'static str {
        "astar"
    }

    #[instrument(skip_all, name = "a_star", fields(agent = agent.id, start = ?agent.start, goal = ?agent.goal), level = "debug")]
    fn plan(
        &self,
        map: &Map,
        agent: &Agent,
        constraints: &ConstraintSet,
        stats: &mut Stats,
    ) -> MapfResult<Path> {
        // Past the last constrained timestep every layer behaves the same, so
        // later times are folded into `horizon + 1` and the search stays finite.
        let horizon = constraints.horizon(agent.id);
        let goal_block = constraints.last_vertex_block(agent.id, agent.goal);
        debug!("constraints: {}, horizon: {horizon:?}", constraints.len());

        if constraints.is_vertex_forbidden(agent.id, agent.start, 0) {
            debug!("start is constrained at time 0");
            return Err(MapfError::NoPathFound { agent: agent.id });
        }

        let mut open_list = BinaryHeap::new();
        let mut closed_list = HashSet::new();
        let mut trace = HashMap::new();
        let mut g_cost_map = HashMap::new();

        open_list.push(LowLevelNode {
            position: agent.start,
            f_cost: euclidean_distance(agent.start, agent.goal),
            g_cost: 0.0,
            time_step: 0,
        });
        g_cost_map.insert((agent.start, 0), 0.0);

        while let Some(current) = open_list.pop() {
            if !closed_list.insert((current.position, current.time_step)) {
                continue;
            }
            trace!("expand node: {current:?}");
            stats.low_level_expand_nodes += 1;

            if current.position == agent.goal && goal_block.map_or(true, |t| current.time_step > t)
            {
                return Ok(construct_path(
                    &trace,
                    (current.position, current.time_step),
                ));
            }

            let within_horizon = horizon.is_some_and(|h| current.time_step <= h);
            let next_time = if within_horizon {
                current.time_step + 1
            } else {
                current.time_step
            };

            let mut successors: Vec<(Cell, f64)> = map
                .constrained_edges(current.position, current.time_step, constraints, agent.id)
                .map(|(_, edge)| (edge.to, edge.distance))
                .collect();
            // Waiting only matters while constraints can still change.
            if within_horizon
                && !constraints.is_violated(
                    agent.id,
                    current.position,
                    current.position,
                    current.time_step + 1,
                )
            {
                successors.push((current.position, WAIT_COST));
            }

            for (neighbor, step_cost) in successors {
                let key = (neighbor, next_time);
                if closed_list.contains(&key) {
                    continue;
                }

                let tentative_g_cost = current.g_cost + step_cost;
                if tentative_g_cost < *g_cost_map.get(&key).unwrap_or(&f64::INFINITY) {
                    g_cost_map.insert(key, tentative_g_cost);
                    trace.insert(key, (current.position, current.time_step));
                    open_list.push(LowLevelNode {
                        position: neighbor,
                        f_cost: tentative_g_cost + euclidean_distance(neighbor, agent.goal),
                        g_cost: tentative_g_cost,
                        time_step: next_time,
                    });
                }
            }
        }

        debug!("cannot find solution");
        Err(MapfError::NoPathFound { agent: agent.id })
    }
}
