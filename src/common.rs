mod conflict;
mod constraint;
mod highlevel;

pub use conflict::{detect_conflicts, first_conflict, Conflict, ConflictPolicy, ConflictType};
pub use constraint::{Constraint, ConstraintSet, Location};
pub(crate) use highlevel::HighLevelNode;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MapfError, MapfResult};
use crate::map::Map;

/// Grid coordinate `(row, col)`.
pub type Cell = (usize, usize);

/// One cell per timestep, starting at the agent's start cell.
pub type Path = Vec<Cell>;

/// Cost of idling one timestep in place.
pub const WAIT_COST: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: usize,
    pub start: Cell,
    pub goal: Cell,
}

impl Agent {
    pub fn verify(&self, map: &Map) -> MapfResult<()> {
        for cell in [self.start, self.goal] {
            if !map.is_passable(cell) {
                return Err(MapfError::ObstacleStart {
                    agent: self.id,
                    cell,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Solution {
    pub paths: Vec<Path>,
    pub costs: Vec<f64>,
    pub cost: f64,
}

impl Solution {
    pub fn new(paths: Vec<Path>) -> Self {
        let costs: Vec<f64> = paths.iter().map(|path| path_cost(path)).collect();
        let cost = costs.iter().sum();
        Solution { paths, costs, cost }
    }

    /// Checks every path is a legal walk from start to goal on `map` and that
    /// the joint solution has no conflicts.
    pub fn verify(&self, map: &Map, agents: &[Agent]) -> bool {
        if self.paths.len() != agents.len() {
            debug!(
                "solution has {} paths for {} agents",
                self.paths.len(),
                agents.len()
            );
            return false;
        }

        for (agent, path) in agents.iter().zip(&self.paths) {
            if path.first() != Some(&agent.start) || path.last() != Some(&agent.goal) {
                debug!("agent {} path does not connect start and goal", agent.id);
                return false;
            }
            if path.iter().any(|&cell| !map.is_passable(cell)) {
                debug!("agent {} path crosses an obstacle", agent.id);
                return false;
            }
            if path
                .windows(2)
                .any(|step| step[0] != step[1] && !is_adjacent(step[0], step[1]))
            {
                debug!("agent {} path jumps between cells", agent.id);
                return false;
            }
        }

        let conflicts = detect_conflicts(&self.paths);
        if !conflicts.is_empty() {
            debug!("solution still has conflicts: {conflicts:?}");
            return false;
        }
        true
    }
}

pub fn euclidean_distance(a: Cell, b: Cell) -> f64 {
    let dr = a.0 as f64 - b.0 as f64;
    let dc = a.1 as f64 - b.1 as f64;
    (dr * dr + dc * dc).sqrt()
}

pub fn is_adjacent(a: Cell, b: Cell) -> bool {
    a != b && a.0.abs_diff(b.0) <= 1 && a.1.abs_diff(b.1) <= 1
}

/// Cost of moving from `from` to `to` in one timestep.
pub fn step_cost(from: Cell, to: Cell) -> f64 {
    if from == to {
        WAIT_COST
    } else {
        euclidean_distance(from, to)
    }
}

pub fn path_cost(path: &[Cell]) -> f64 {
    path.windows(2).map(|step| step_cost(step[0], step[1])).sum()
}
