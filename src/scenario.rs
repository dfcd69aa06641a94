use rand::prelude::*;
use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use tracing::info;

use crate::common::{Agent, Cell};
use crate::error::{MapfError, MapfResult};

const FREE: char = 'E';
const OBSTACLE: char = 'O';
const START: char = 'S';
const GOAL: char = 'F';

/// Occupancy grid plus the agents placed on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    /// `true` marks a free cell.
    pub occupancy: Vec<Vec<bool>>,
    pub agents: Vec<Agent>,
}

/// Rows of single-character tokens. Rows may be whitespace separated
/// (`E O S`) or compact (`EOS`).
fn tokenize(text: &str) -> MapfResult<Vec<Vec<char>>> {
    let mut rows = Vec::new();
    for (line_number, line) in text.lines().enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let row: Vec<char> = match fields.as_slice() {
            [] => continue,
            [compact] => compact.chars().collect(),
            fields => {
                let mut row = Vec::with_capacity(fields.len());
                for field in fields {
                    let mut chars = field.chars();
                    match (chars.next(), chars.next()) {
                        (Some(token), None) => row.push(token),
                        _ => {
                            return Err(MapfError::MapFormat(format!(
                                "line {}: token {field:?} is not a single character",
                                line_number + 1
                            )))
                        }
                    }
                }
                row
            }
        };

        if let Some(token) = row
            .iter()
            .find(|token| ![FREE, OBSTACLE, START, GOAL].contains(token))
        {
            return Err(MapfError::MapFormat(format!(
                "line {}: unknown token {token:?}",
                line_number + 1
            )));
        }
        rows.push(row);
    }

    let width = rows.first().map_or(0, Vec::len);
    if width == 0 {
        return Err(MapfError::MapFormat("grid is empty".to_string()));
    }
    if rows.iter().any(|row| row.len() != width) {
        return Err(MapfError::MapFormat("grid is not rectangular".to_string()));
    }
    Ok(rows)
}

/// Occupancy of a grid text, ignoring where agents are placed.
pub fn parse_occupancy(text: &str) -> MapfResult<Vec<Vec<bool>>> {
    Ok(tokenize(text)?
        .iter()
        .map(|row| row.iter().map(|&token| token != OBSTACLE).collect())
        .collect())
}

impl Scenario {
    /// Agent `i` starts at the `i`-th `S` and ends at the `i`-th `F`, both in
    /// row-major scan order.
    pub fn from_grid_str(text: &str) -> MapfResult<Self> {
        let tokens = tokenize(text)?;

        let mut starts: Vec<Cell> = Vec::new();
        let mut goals: Vec<Cell> = Vec::new();
        for (x, row) in tokens.iter().enumerate() {
            for (y, &token) in row.iter().enumerate() {
                match token {
                    START => starts.push((x, y)),
                    GOAL => goals.push((x, y)),
                    _ => {}
                }
            }
        }

        if starts.len() != goals.len() {
            return Err(MapfError::MapFormat(format!(
                "{} start markers but {} goal markers",
                starts.len(),
                goals.len()
            )));
        }
        if starts.is_empty() {
            return Err(MapfError::MapFormat(
                "grid has no start/goal pair".to_string(),
            ));
        }

        let agents = starts
            .into_iter()
            .zip(goals)
            .enumerate()
            .map(|(id, (start, goal))| Agent { id, start, goal })
            .collect();
        let occupancy = tokens
            .iter()
            .map(|row| row.iter().map(|&token| token != OBSTACLE).collect())
            .collect();

        Ok(Scenario { occupancy, agents })
    }

    pub fn load_from_file(path: &str) -> MapfResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_grid_str(&text)
    }

    /// Random grid with `floor(rows * cols * obstacle_density)` obstacles and
    /// `num_agents` start/goal pairs on distinct free cells.
    pub fn generate<R: Rng + ?Sized>(
        rows: usize,
        cols: usize,
        num_agents: usize,
        obstacle_density: f64,
        rng: &mut R,
    ) -> MapfResult<Self> {
        if rows == 0 || cols == 0 || num_agents == 0 {
            return Err(MapfError::MapFormat(
                "generated grid needs rows, cols and agents".to_string(),
            ));
        }

        let total_cells = rows * cols;
        let num_obstacles = (total_cells as f64 * obstacle_density).floor() as usize;
        if total_cells < num_obstacles + 2 * num_agents {
            return Err(MapfError::MapFormat(format!(
                "{total_cells} cells cannot hold {num_obstacles} obstacles and {num_agents} agents"
            )));
        }

        let mut cells: Vec<Cell> = (0..rows)
            .flat_map(|x| (0..cols).map(move |y| (x, y)))
            .collect();
        cells.shuffle(rng);

        let mut tokens = vec![vec![FREE; cols]; rows];
        for &(x, y) in &cells[..num_obstacles] {
            tokens[x][y] = OBSTACLE;
        }
        let free = &cells[num_obstacles..];
        for &(x, y) in &free[..num_agents] {
            tokens[x][y] = START;
        }
        for &(x, y) in &free[num_agents..2 * num_agents] {
            tokens[x][y] = GOAL;
        }

        let text: String = tokens
            .iter()
            .map(|row| row.iter().collect::<String>() + "\n")
            .collect();
        let scenario = Self::from_grid_str(&text)?;
        info!("Generate scen: {:?}", scenario.agents);
        Ok(scenario)
    }

    /// Tab-separated token grid, readable by [`Scenario::from_grid_str`].
    ///
    /// Reading the grid back pairs markers by scan order, so every agent
    /// needs its own start and goal cells and the goals must follow the
    /// scan order of the starts. Ids are reassigned in that order on read.
    pub fn to_grid_string(&self) -> MapfResult<String> {
        let mut tokens: Vec<Vec<char>> = self
            .occupancy
            .iter()
            .map(|row| {
                row.iter()
                    .map(|&free| if free { FREE } else { OBSTACLE })
                    .collect()
            })
            .collect();
        for agent in &self.agents {
            for (cell, marker) in [(agent.start, START), (agent.goal, GOAL)] {
                match tokens.get_mut(cell.0).and_then(|row| row.get_mut(cell.1)) {
                    Some(token) if *token == FREE => *token = marker,
                    Some(token) if *token != OBSTACLE => {
                        return Err(MapfError::MapFormat(format!(
                            "agent {} reuses marked cell {cell:?}",
                            agent.id
                        )))
                    }
                    _ => {
                        return Err(MapfError::ObstacleStart {
                            agent: agent.id,
                            cell,
                        })
                    }
                }
            }
        }

        let mut pairs: Vec<(Cell, Cell)> = self
            .agents
            .iter()
            .map(|agent| (agent.start, agent.goal))
            .collect();
        pairs.sort_unstable();
        if pairs.windows(2).any(|pair| pair[0].1 > pair[1].1) {
            return Err(MapfError::MapFormat(
                "goals do not follow the scan order of the starts".to_string(),
            ));
        }

        let mut text = String::new();
        for row in tokens {
            let line: Vec<String> = row.iter().map(char::to_string).collect();
            text.push_str(&line.join("\t"));
            text.push('\n');
        }
        Ok(text)
    }

    pub fn write_to_file(&self, path: &str) -> MapfResult<()> {
        fs::write(path, self.to_grid_string()?)?;
        Ok(())
    }

    /// Agents are renumbered by list position; the solver indexes them by id.
    pub fn load_agents_from_yaml(path: &str) -> MapfResult<Vec<Agent>> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut agents: Vec<Agent> = serde_yaml::from_reader(reader)?;
        for (id, agent) in agents.iter_mut().enumerate() {
            agent.id = id;
        }
        Ok(agents)
    }

    pub fn write_agents_to_yaml(path: &str, agents: &[Agent]) -> MapfResult<()> {
        let file = File::create(path)?;
        let mut writer = io::BufWriter::new(file);
        let yaml_data = serde_yaml::to_string(&agents)?;
        writer.write_all(yaml_data.as_bytes())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_read_scenario() {
        let text = "S\tE\tO\nE\tF\tS\nF\tO\tE\n";
        let scenario = Scenario::from_grid_str(text).unwrap();
        assert_eq!(
            scenario.occupancy,
            vec![
                vec![true, true, false],
                vec![true, true, true],
                vec![true, false, true],
            ]
        );
        let answer = [
            Agent {
                id: 0,
                start: (0, 0),
                goal: (1, 1),
            },
            Agent {
                id: 1,
                start: (1, 2),
                goal: (2, 0),
            },
        ];
        assert_eq!(scenario.agents, answer);
    }

    #[test]
    fn test_compact_rows() {
        let scenario = Scenario::from_grid_str("SEO\nEEF\n").unwrap();
        assert_eq!(scenario.occupancy[0], vec![true, true, false]);
        assert_eq!(scenario.agents[0].goal, (1, 2));
    }

    #[test]
    fn test_malformed_grids() {
        for text in [
            "",
            "S E\nE F E\n",
            "S E X\nE E F\n",
            "S E\nE E\n",
            "E E\nE E\n",
            "S F\nS E\n",
            "S EE\nE F\n",
        ] {
            assert!(
                matches!(Scenario::from_grid_str(text), Err(MapfError::MapFormat(_))),
                "{text:?} should be rejected"
            );
        }
        assert!(parse_occupancy("E E\nE E\n").is_ok());
    }

    #[test]
    fn test_generate_scenario() {
        let mut rng = StdRng::seed_from_u64(0);
        let scenario = Scenario::generate(8, 8, 3, 0.18, &mut rng).unwrap();

        let obstacles = scenario.occupancy.iter().flatten().filter(|&&free| !free).count();
        assert_eq!(obstacles, 11);
        assert_eq!(scenario.agents.len(), 3);
        for agent in &scenario.agents {
            assert!(scenario.occupancy[agent.start.0][agent.start.1]);
            assert!(scenario.occupancy[agent.goal.0][agent.goal.1]);
        }

        let reread = Scenario::from_grid_str(&scenario.to_grid_string().unwrap()).unwrap();
        assert_eq!(reread, scenario);

        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(Scenario::generate(8, 8, 3, 0.18, &mut rng).unwrap(), scenario);

        assert!(Scenario::generate(2, 2, 2, 0.5, &mut rng).is_err());
    }

    #[test]
    fn test_write_rejects_unrepresentable_agents() {
        let scenario = |agents: Vec<(Cell, Cell)>| Scenario {
            occupancy: vec![vec![true, true, true, false]; 2],
            agents: agents
                .into_iter()
                .enumerate()
                .map(|(id, (start, goal))| Agent { id, start, goal })
                .collect(),
        };

        let outside = scenario(vec![((5, 5), (0, 0))]);
        assert!(matches!(
            outside.to_grid_string(),
            Err(MapfError::ObstacleStart { agent: 0, cell: (5, 5) })
        ));
        let path = std::env::temp_dir().join(format!("mapf_aco_map_{}.txt", std::process::id()));
        let path = path.to_str().unwrap();
        assert!(outside.write_to_file(path).is_err());
        assert!(!std::path::Path::new(path).exists());

        let blocked = scenario(vec![((0, 0), (1, 3))]);
        assert!(matches!(
            blocked.to_grid_string(),
            Err(MapfError::ObstacleStart { agent: 0, cell: (1, 3) })
        ));

        let shared = scenario(vec![((0, 0), (1, 1)), ((1, 1), (0, 2))]);
        assert!(matches!(shared.to_grid_string(), Err(MapfError::MapFormat(_))));

        let crossed = scenario(vec![((0, 0), (1, 2)), ((0, 1), (1, 0))]);
        assert!(matches!(crossed.to_grid_string(), Err(MapfError::MapFormat(_))));

        let ordered = scenario(vec![((0, 0), (1, 0)), ((0, 1), (1, 2))]);
        let text = ordered.to_grid_string().unwrap();
        assert_eq!(text, "S\tS\tE\tO\nF\tE\tF\tO\n");
        assert_eq!(Scenario::from_grid_str(&text).unwrap(), ordered);
    }

    #[test]
    fn test_agents_yaml_round_trip() {
        let agents = vec![
            Agent {
                id: 0,
                start: (0, 0),
                goal: (4, 4),
            },
            Agent {
                id: 1,
                start: (4, 0),
                goal: (0, 4),
            },
        ];
        let path = std::env::temp_dir().join(format!("mapf_aco_agents_{}.yaml", std::process::id()));
        let path = path.to_str().unwrap();
        Scenario::write_agents_to_yaml(path, &agents).unwrap();
        assert_eq!(Scenario::load_agents_from_yaml(path).unwrap(), agents);
        std::fs::remove_file(path).unwrap();
    }
}
