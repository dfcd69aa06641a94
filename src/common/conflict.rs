use clap::ValueEnum;
use serde::Deserialize;
use tracing::trace;

use super::{Cell, Constraint, Location, Path};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConflictType {
    Vertex {
        position: Cell,
        time_step: usize,
    },
    /// `agent_1` moves `u -> v` while `agent_2` moves `v -> u`, both arriving
    /// at `time_step`.
    Edge { u: Cell, v: Cell, time_step: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Conflict {
    pub agent_1: usize,
    pub agent_2: usize,
    pub conflict_type: ConflictType,
}

impl Conflict {
    pub fn time_step(&self) -> usize {
        match self.conflict_type {
            ConflictType::Vertex { time_step, .. } | ConflictType::Edge { time_step, .. } => {
                time_step
            }
        }
    }

    /// Constraint that resolves this conflict for `agent_1` (`resolve_first`)
    /// or for `agent_2`.
    pub fn constraint_for(&self, resolve_first: bool) -> Constraint {
        let agent = if resolve_first {
            self.agent_1
        } else {
            self.agent_2
        };
        match self.conflict_type {
            ConflictType::Vertex {
                position,
                time_step,
            } => Constraint {
                agent,
                location: Location::Vertex(position),
                time_step,
            },
            ConflictType::Edge { u, v, time_step } => Constraint {
                agent,
                location: if resolve_first {
                    Location::Edge(u, v)
                } else {
                    Location::Edge(v, u)
                },
                time_step,
            },
        }
    }
}

/// Which conflict the constraint tree branches on. Every policy yields one
/// conflict, so each expansion has at most two children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// First conflict by agent pair order, then by time.
    #[default]
    First,
    /// Conflict with the smallest timestep over all pairs.
    Earliest,
}

impl ConflictPolicy {
    pub fn select(&self, paths: &[Path]) -> Option<Conflict> {
        match self {
            ConflictPolicy::First => first_conflict(paths),
            ConflictPolicy::Earliest => detect_conflicts(paths)
                .into_iter()
                .min_by_key(|conflict| conflict.time_step()),
        }
    }
}

/// Every vertex and edge conflict, ordered by agent pair and then by time.
/// Finished agents keep occupying their last cell.
pub fn detect_conflicts(paths: &[Path]) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    scan(paths, |conflict| {
        conflicts.push(conflict);
        true
    });
    trace!("detect conflicts: {conflicts:?}");
    conflicts
}

pub fn first_conflict(paths: &[Path]) -> Option<Conflict> {
    let mut first = None;
    scan(paths, |conflict| {
        first = Some(conflict);
        false
    });
    first
}

fn position_at(path: &Path, time: usize) -> Option<Cell> {
    path.get(time).or_else(|| path.last()).copied()
}

// `visit` returns whether to keep scanning.
fn scan(paths: &[Path], mut visit: impl FnMut(Conflict) -> bool) {
    let horizon = paths.iter().map(Vec::len).max().unwrap_or(0);

    for i in 0..paths.len() {
        for j in (i + 1)..paths.len() {
            let (path1, path2) = (&paths[i], &paths[j]);

            for time in 0..horizon {
                let (Some(pos1), Some(pos2)) = (position_at(path1, time), position_at(path2, time))
                else {
                    break;
                };

                if pos1 == pos2
                    && !visit(Conflict {
                        agent_1: i,
                        agent_2: j,
                        conflict_type: ConflictType::Vertex {
                            position: pos1,
                            time_step: time,
                        },
                    })
                {
                    return;
                }

                if time + 1 >= horizon {
                    continue;
                }
                let (Some(next1), Some(next2)) =
                    (position_at(path1, time + 1), position_at(path2, time + 1))
                else {
                    continue;
                };

                if pos1 != next1
                    && pos1 == next2
                    && next1 == pos2
                    && !visit(Conflict {
                        agent_1: i,
                        agent_2: j,
                        conflict_type: ConflictType::Edge {
                            u: pos1,
                            v: next1,
                            time_step: time + 1,
                        },
                    })
                {
                    return;
                }
            }
        }
    }
}
