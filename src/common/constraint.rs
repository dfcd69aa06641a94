use std::collections::BTreeSet;

use super::Cell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Location {
    Vertex(Cell),
    /// Ordered traversal `from -> to`.
    Edge(Cell, Cell),
}

/// Forbids `agent` from occupying (vertex) or arriving through (edge)
/// `location` at `time_step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Constraint {
    pub agent: usize,
    pub location: Location,
    pub time_step: usize,
}

/// Append-only set of constraints owned by one constraint tree branch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstraintSet {
    constraints: BTreeSet<Constraint>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` and leaves the set untouched if `constraint` is
    /// already present.
    pub fn insert(&mut self, constraint: Constraint) -> bool {
        self.constraints.insert(constraint)
    }

    pub fn contains(&self, constraint: &Constraint) -> bool {
        self.constraints.contains(constraint)
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter()
    }

    pub fn for_agent(&self, agent: usize) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(move |c| c.agent == agent)
    }

    pub fn is_vertex_forbidden(&self, agent: usize, cell: Cell, time_step: usize) -> bool {
        self.contains(&Constraint {
            agent,
            location: Location::Vertex(cell),
            time_step,
        })
    }

    /// Whether `agent` may not move `from -> to` arriving at `time_step`.
    /// Waits (`from == to`) are only checked against vertex constraints.
    pub fn is_violated(&self, agent: usize, from: Cell, to: Cell, time_step: usize) -> bool {
        if self.is_vertex_forbidden(agent, to, time_step) {
            return true;
        }
        from != to
            && self.contains(&Constraint {
                agent,
                location: Location::Edge(from, to),
                time_step,
            })
    }

    /// Last timestep at which any constraint binds `agent`.
    pub fn horizon(&self, agent: usize) -> Option<usize> {
        self.for_agent(agent).map(|c| c.time_step).max()
    }

    /// Last timestep at which `agent` is kept off `cell`.
    pub fn last_vertex_block(&self, agent: usize, cell: Cell) -> Option<usize> {
        self.for_agent(agent)
            .filter(|c| c.location == Location::Vertex(cell))
            .map(|c| c.time_step)
            .max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_deduplicates() {
        let mut constraints = ConstraintSet::new();
        let constraint = Constraint {
            agent: 0,
            location: Location::Vertex((1, 1)),
            time_step: 2,
        };
        assert!(constraints.insert(constraint));
        assert!(!constraints.insert(constraint));
        assert_eq!(constraints.len(), 1);
    }

    #[test]
    fn test_violation_is_agent_and_time_scoped() {
        let mut constraints = ConstraintSet::new();
        constraints.insert(Constraint {
            agent: 0,
            location: Location::Vertex((1, 1)),
            time_step: 2,
        });
        constraints.insert(Constraint {
            agent: 1,
            location: Location::Edge((0, 0), (0, 1)),
            time_step: 1,
        });

        assert!(constraints.is_violated(0, (1, 0), (1, 1), 2));
        assert!(constraints.is_violated(0, (1, 1), (1, 1), 2));
        assert!(!constraints.is_violated(0, (1, 0), (1, 1), 3));
        assert!(!constraints.is_violated(1, (1, 0), (1, 1), 2));

        assert!(constraints.is_violated(1, (0, 0), (0, 1), 1));
        assert!(!constraints.is_violated(1, (0, 1), (0, 0), 1));
        assert!(!constraints.is_violated(0, (0, 0), (0, 1), 1));
    }

    #[test]
    fn test_horizon_and_goal_block() {
        let mut constraints = ConstraintSet::new();
        assert_eq!(constraints.horizon(0), None);
        constraints.insert(Constraint {
            agent: 0,
            location: Location::Vertex((2, 2)),
            time_step: 5,
        });
        constraints.insert(Constraint {
            agent: 0,
            location: Location::Edge((1, 1), (2, 2)),
            time_step: 7,
        });
        assert_eq!(constraints.horizon(0), Some(7));
        assert_eq!(constraints.last_vertex_block(0, (2, 2)), Some(5));
        assert_eq!(constraints.last_vertex_block(0, (1, 1)), None);
        assert_eq!(constraints.horizon(1), None);
    }
}
