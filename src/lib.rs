pub mod algorithm;
pub mod common;
pub mod config;
pub mod error;
pub mod map;
pub mod scenario;
pub mod solver;
pub mod stat;

pub use algorithm::{plan_single_agent, PlannerKind, SingleAgentPlanner};
pub use common::{detect_conflicts, Agent, Path, Solution};
pub use error::{MapfError, MapfResult};
pub use map::Map;
pub use solver::solve_mapf;
