use thiserror::Error;

use crate::common::Cell;

/// Errors surfaced by the planning core. None of them are fatal: callers may
/// retry with other parameters or another planner.
#[derive(Debug, Error)]
pub enum MapfError {
    #[error("map format error: {0}")]
    MapFormat(String),

    #[error("agent {agent} start or goal {cell:?} is blocked or out of bounds")]
    ObstacleStart { agent: usize, cell: Cell },

    #[error("no path found for agent {agent}")]
    NoPathFound { agent: usize },

    #[error("no conflict-free solution found after {expanded} expansions")]
    NoConflictFreeSolution { expanded: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type MapfResult<T> = Result<T, MapfError>;
