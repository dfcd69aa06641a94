use crate::common::{euclidean_distance, Cell, ConstraintSet};
use crate::error::{MapfError, MapfResult};

// Eight-connected, no self loop.
const DIRECTIONS: [(isize, isize); 8] = [
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-1, -1),
    (-1, 1),
    (1, -1),
    (1, 1),
];

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub to: Cell,
    /// 1.0 orthogonal, sqrt(2) diagonal.
    pub distance: f64,
}

#[derive(Debug, Clone)]
pub struct Tile {
    passable: bool,
    pub edges: Vec<Edge>, // Stores edges to accessible neighbors
}

impl Tile {
    pub fn is_passable(&self) -> bool {
        self.passable
    }
}

/// Graph of free grid cells. Topology only: desirability weights live in the
/// ACO planner's own pheromone field so concurrent searches never share them.
#[derive(Debug, Clone)]
pub struct Map {
    pub height: usize,
    pub width: usize,
    pub grid: Vec<Vec<Tile>>,
}

impl Map {
    /// Builds the graph from an occupancy grid where `true` marks a free cell.
    pub fn construct_graph(occupancy: &[Vec<bool>]) -> MapfResult<Self> {
        let height = occupancy.len();
        let width = occupancy.first().map_or(0, Vec::len);
        if height == 0 || width == 0 {
            return Err(MapfError::MapFormat("occupancy grid is empty".to_string()));
        }
        if let Some(row) = occupancy.iter().position(|row| row.len() != width) {
            return Err(MapfError::MapFormat(format!(
                "row {row} has {} cells, expected {width}",
                occupancy[row].len()
            )));
        }

        let grid = occupancy
            .iter()
            .map(|row| {
                row.iter()
                    .map(|&passable| Tile {
                        passable,
                        edges: Vec::new(),
                    })
                    .collect()
            })
            .collect();

        let mut map = Map {
            height,
            width,
            grid,
        };
        map.initialize_edges();
        Ok(map)
    }

    fn initialize_edges(&mut self) {
        for x in 0..self.height {
            for y in 0..self.width {
                if self.grid[x][y].passable {
                    self.grid[x][y].edges = self.compute_edges((x, y));
                }
            }
        }
    }

    fn compute_edges(&self, cell: Cell) -> Vec<Edge> {
        let mut edges = Vec::new();
        for &(dx, dy) in &DIRECTIONS {
            let (Some(new_x), Some(new_y)) = (
                cell.0.checked_add_signed(dx),
                cell.1.checked_add_signed(dy),
            ) else {
                continue;
            };
            if self.is_passable((new_x, new_y)) {
                edges.push(Edge {
                    to: (new_x, new_y),
                    distance: euclidean_distance(cell, (new_x, new_y)),
                });
            }
        }
        edges
    }

    pub fn in_bounds(&self, cell: Cell) -> bool {
        cell.0 < self.height && cell.1 < self.width
    }

    /// Out-of-bounds cells are never passable.
    pub fn is_passable(&self, cell: Cell) -> bool {
        self.in_bounds(cell) && self.grid[cell.0][cell.1].is_passable()
    }

    pub fn edges(&self, cell: Cell) -> &[Edge] {
        if self.in_bounds(cell) {
            &self.grid[cell.0][cell.1].edges
        } else {
            &[]
        }
    }

    pub fn num_cells(&self) -> usize {
        self.height * self.width
    }

    /// Row-major index of an in-bounds cell.
    pub fn index(&self, cell: Cell) -> usize {
        cell.0 * self.width + cell.1
    }

    /// Edges out of `cell` that `agent` may take when leaving at `time_step`,
    /// paired with their index in the tile's edge list.
    pub fn constrained_edges<'a>(
        &'a self,
        cell: Cell,
        time_step: usize,
        constraints: &'a ConstraintSet,
        agent: usize,
    ) -> impl Iterator<Item = (usize, &'a Edge)> + 'a {
        self.edges(cell)
            .iter()
            .enumerate()
            .filter(move |(_, edge)| {
                !constraints.is_violated(agent, cell, edge.to, time_step + 1)
            })
    }

    pub fn neighbors(
        &self,
        cell: Cell,
        time_step: usize,
        constraints: &ConstraintSet,
        agent: usize,
    ) -> Vec<Cell> {
        self.constrained_edges(cell, time_step, constraints, agent)
            .map(|(_, edge)| edge.to)
            .collect()
    }
}
