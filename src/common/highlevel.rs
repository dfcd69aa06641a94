use super::{path_cost, Agent, Conflict, ConstraintSet, Path, Solution};
use crate::algorithm::SingleAgentPlanner;
use crate::error::MapfResult;
use crate::map::Map;
use crate::stat::Stats;

use std::cmp::Ordering;
use tracing::debug;

/// Constraint tree node.
#[derive(Clone, Debug)]
pub(crate) struct HighLevelNode {
    pub(crate) id: usize,
    pub(crate) constraints: ConstraintSet,
    pub(crate) paths: Vec<Path>,
    pub(crate) costs: Vec<f64>,
    pub(crate) cost: f64, // Sum of path costs under current constraints
}

impl PartialEq for HighLevelNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HighLevelNode {}

impl Ord for HighLevelNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cost
            .total_cmp(&other.cost)
            .then_with(|| self.constraints.len().cmp(&other.constraints.len()))
            // Creation order keeps ties deterministic and nodes distinct.
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for HighLevelNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl HighLevelNode {
    /// Root node: every agent planned without constraints.
    pub(crate) fn new(
        agents: &[Agent],
        map: &Map,
        planner: &dyn SingleAgentPlanner,
        stats: &mut Stats,
    ) -> MapfResult<Self> {
        let constraints = ConstraintSet::new();
        let mut paths = Vec::with_capacity(agents.len());
        for agent in agents {
            paths.push(planner.plan(map, agent, &constraints, stats)?);
        }
        let costs: Vec<f64> = paths.iter().map(|path| path_cost(path)).collect();

        Ok(HighLevelNode {
            id: 0,
            constraints,
            cost: costs.iter().sum(),
            costs,
            paths,
        })
    }

    /// Child that adds the constraint resolving `conflict` for one of its
    /// agents and replans only that agent. `None` when the constraint is
    /// already in this branch or the agent cannot be replanned.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn update_constraint(
        &self,
        conflict: &Conflict,
        resolve_first: bool,
        agents: &[Agent],
        map: &Map,
        planner: &dyn SingleAgentPlanner,
        stats: &mut Stats,
        id: usize,
    ) -> Option<HighLevelNode> {
        let constraint = conflict.constraint_for(resolve_first);
        let mut new_constraints = self.constraints.clone();
        if !new_constraints.insert(constraint) {
            debug!("constraint {constraint:?} already in branch, skip child");
            return None;
        }

        let agent_to_update = constraint.agent;
        let new_path = match planner.plan(map, &agents[agent_to_update], &new_constraints, stats)
        {
            Ok(path) => path,
            Err(err) => {
                debug!("drop branch on {constraint:?}: {err}");
                return None;
            }
        };
        debug!("Update agent {agent_to_update:?} with path {new_path:?} for conflict {conflict:?}");

        let mut new_paths = self.paths.clone();
        let mut new_costs = self.costs.clone();
        new_costs[agent_to_update] = path_cost(&new_path);
        new_paths[agent_to_update] = new_path;

        Some(HighLevelNode {
            id,
            constraints: new_constraints,
            cost: new_costs.iter().sum(),
            costs: new_costs,
            paths: new_paths,
        })
    }

    pub(crate) fn into_solution(self) -> Solution {
        Solution {
            paths: self.paths,
            costs: self.costs,
            cost: self.cost,
        }
    }
}
