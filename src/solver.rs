mod cbs;

pub use cbs::CBS;

use crate::common::{Agent, Solution};
use crate::config::Config;
use crate::error::MapfResult;
use crate::map::Map;

pub trait Solver {
    fn solve(&mut self, config: &Config) -> MapfResult<Solution>;
}

/// Conflict-free paths for `agents` on `map`, planned with the planners,
/// conflict policy and budget named in `config`.
pub fn solve_mapf(map: &Map, agents: &[Agent], config: &Config) -> MapfResult<Solution> {
    CBS::new(agents.to_vec(), map).solve(config)
}
