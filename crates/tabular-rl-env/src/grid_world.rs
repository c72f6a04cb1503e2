//! Grid world environment
//!
//! ```text
//! +---+---+---+---+
//! | S |   |   | G |
//! +---+---+---+---+
//! |   | X |   |   |
//! +---+---+---+---+
//! |   |   |   |   |
//! +---+---+---+---+
//! ```
//!
//! Cells are `(row, col)` with row 0 at the top. Moving into a wall or an
//! obstacle leaves the agent in place. Entering a goal pays 1 and ends the
//! episode; goals have no legal actions.

use std::collections::HashSet;
use std::fmt;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_distr::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};
use tracing::debug;

use tabular_rl_core::config::ensure_in_range;
use tabular_rl_core::{Environment, Mdp, Policy, RLError, Result, Step, ValueFunction};

/// Grid cell `(row, col)`
pub type Cell = (usize, usize);

/// Movement actions, listed in tie-break order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Row - 1
    Up,
    /// Row + 1
    Down,
    /// Column - 1
    Left,
    /// Column + 1
    Right,
}

impl Direction {
    /// All directions in action order
    pub const ALL: [Direction; 4] = [Self::Up, Self::Down, Self::Left, Self::Right];

    /// The two directions at right angles to this one
    #[must_use]
    pub fn perpendicular(self) -> [Direction; 2] {
        match self {
            Self::Up | Self::Down => [Self::Left, Self::Right],
            Self::Left | Self::Right => [Self::Up, Self::Down],
        }
    }

    /// Arrow glyph used by [`GridWorld::render_policy`]
    #[must_use]
    pub fn arrow(self) -> char {
        match self {
            Self::Up => '↑',
            Self::Down => '↓',
            Self::Left => '←',
            Self::Right => '→',
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        };
        f.write_str(name)
    }
}

/// Configuration for [`GridWorld`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridWorldConfig {
    /// Number of columns
    pub width: usize,
    /// Number of rows
    pub height: usize,
    /// Terminal cells paying reward 1 on entry; defaults to the top-right corner
    pub goals: Vec<Cell>,
    /// Blocked cells
    pub obstacles: Vec<Cell>,
    /// Fixed start cell; a random non-goal cell is used when absent
    pub start: Option<Cell>,
    /// Discount factor reported to solvers
    pub discount: f64,
    /// Probability of slipping to a perpendicular direction (split evenly)
    pub slip: f64,
    /// Random seed for starts and slips
    pub seed: Option<u64>,
}

impl Default for GridWorldConfig {
    fn default() -> Self {
        Self {
            width: 4,
            height: 4,
            goals: Vec::new(),
            obstacles: Vec::new(),
            start: None,
            discount: 0.9,
            slip: 0.0,
            seed: None,
        }
    }
}

impl GridWorldConfig {
    /// Check dimensions, cell placement and probabilities
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RLError::config(format!(
                "grid must be at least 1x1, got {}x{}",
                self.width, self.height
            )));
        }
        ensure_in_range("discount", self.discount, 0.0, 1.0)?;
        ensure_in_range("slip", self.slip, 0.0, 1.0)?;

        let goals = self.goal_cells();
        let in_bounds = |(row, col): Cell| row < self.height && col < self.width;
        for cell in self.obstacles.iter().chain(&goals).chain(&self.start) {
            if !in_bounds(*cell) {
                return Err(RLError::config(format!(
                    "cell {cell:?} is outside the {}x{} grid",
                    self.width, self.height
                )));
            }
        }
        for cell in goals.iter().chain(&self.start) {
            if self.obstacles.contains(cell) {
                return Err(RLError::config(format!("cell {cell:?} is an obstacle")));
            }
        }

        let free = (0..self.height)
            .flat_map(|row| (0..self.width).map(move |col| (row, col)))
            .filter(|cell| !goals.contains(cell) && !self.obstacles.contains(cell))
            .count();
        if free == 0 {
            return Err(RLError::config("grid has no non-goal cell to start from"));
        }
        Ok(())
    }

    fn goal_cells(&self) -> Vec<Cell> {
        if self.goals.is_empty() {
            vec![(0, self.width - 1)]
        } else {
            self.goals.clone()
        }
    }
}

/// Grid world MDP with optional slippery moves
#[derive(Debug, Clone)]
pub struct GridWorld {
    /// Configuration
    config: GridWorldConfig,
    /// Goal cells
    goals: HashSet<Cell>,
    /// Obstacle cells
    obstacles: HashSet<Cell>,
    /// Current cell
    current: Cell,
    /// Generator for starts and slips
    rng: StdRng,
}

impl GridWorld {
    /// Create a new grid world
    pub fn new(config: GridWorldConfig) -> Result<Self> {
        config.validate()?;

        let goals: HashSet<Cell> = config.goal_cells().into_iter().collect();
        let obstacles: HashSet<Cell> = config.obstacles.iter().copied().collect();

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let current = config.start.unwrap_or((0, 0));
        debug!(
            width = config.width,
            height = config.height,
            goals = goals.len(),
            obstacles = obstacles.len(),
            slip = config.slip,
            "grid world created"
        );

        Ok(Self {
            obstacles,
            goals,
            config,
            current,
            rng,
        })
    }

    /// Configuration the grid was built from
    #[must_use]
    pub fn config(&self) -> &GridWorldConfig {
        &self.config
    }

    /// Cell the agent currently occupies
    #[must_use]
    pub fn current_state(&self) -> Cell {
        self.current
    }

    /// Check if `cell` is a goal
    #[must_use]
    pub fn is_goal(&self, cell: &Cell) -> bool {
        self.goals.contains(cell)
    }

    /// Check if `cell` is blocked
    #[must_use]
    pub fn is_obstacle(&self, cell: &Cell) -> bool {
        self.obstacles.contains(cell)
    }

    /// Cell reached by moving `direction` from `cell` without slipping
    #[must_use]
    pub fn next_cell(&self, (row, col): Cell, direction: Direction) -> Cell {
        let target = match direction {
            Direction::Up => row.checked_sub(1).map(|r| (r, col)),
            Direction::Down => Some((row + 1, col)),
            Direction::Left => col.checked_sub(1).map(|c| (row, c)),
            Direction::Right => Some((row, col + 1)),
        };

        match target {
            Some((r, c)) if r < self.config.height && c < self.config.width => {
                if self.obstacles.contains(&(r, c)) {
                    (row, col)
                } else {
                    (r, c)
                }
            }
            _ => (row, col),
        }
    }

    /// Value grid, one row per line; obstacles `[X]`, goals `[G]`
    #[must_use]
    pub fn render_values(&self, values: &impl ValueFunction<Cell>) -> String {
        let mut out = String::new();
        for row in 0..self.config.height {
            for col in 0..self.config.width {
                let cell = (row, col);
                if self.is_obstacle(&cell) {
                    out.push_str("  [X]  ");
                } else if self.is_goal(&cell) {
                    out.push_str("  [G]  ");
                } else {
                    out.push_str(&format!("{:6.3} ", values.value(&cell)));
                }
            }
            out.push('\n');
        }
        out
    }

    /// Policy grid as arrows; unassigned cells show `·`
    #[must_use]
    pub fn render_policy(&self, policy: &impl Policy<Cell, Direction>) -> String {
        let mut out = String::new();
        for row in 0..self.config.height {
            for col in 0..self.config.width {
                let cell = (row, col);
                let glyph = if self.is_obstacle(&cell) {
                    'X'
                } else if self.is_goal(&cell) {
                    'G'
                } else {
                    policy.act(&cell).map_or('·', Direction::arrow)
                };
                out.push(' ');
                out.push(glyph);
                out.push(' ');
            }
            out.push('\n');
        }
        out
    }
}

impl Mdp for GridWorld {
    type State = Cell;
    type Action = Direction;

    fn states(&self) -> Vec<Cell> {
        (0..self.config.height)
            .flat_map(|row| (0..self.config.width).map(move |col| (row, col)))
            .filter(|cell| !self.obstacles.contains(cell))
            .collect()
    }

    fn actions(&self, state: &Cell) -> Vec<Direction> {
        if self.goals.contains(state) {
            Vec::new()
        } else {
            Direction::ALL.to_vec()
        }
    }

    fn transitions(&self, state: &Cell, action: &Direction) -> Vec<(Cell, f64)> {
        let intended = self.next_cell(*state, *action);
        if self.config.slip <= 0.0 {
            return vec![(intended, 1.0)];
        }

        let mut successors: Vec<(Cell, f64)> = vec![(intended, 1.0 - self.config.slip)];
        for side in action.perpendicular() {
            let cell = self.next_cell(*state, side);
            let p = self.config.slip / 2.0;
            match successors.iter_mut().find(|(c, _)| *c == cell) {
                Some((_, mass)) => *mass += p,
                None => successors.push((cell, p)),
            }
        }
        successors.retain(|(_, p)| *p > 0.0);
        successors
    }

    fn reward(&self, _state: &Cell, _action: &Direction, next_state: &Cell) -> f64 {
        if self.goals.contains(next_state) {
            1.0
        } else {
            0.0
        }
    }

    fn discount_factor(&self) -> f64 {
        self.config.discount
    }
}

impl Environment for GridWorld {
    fn reset(&mut self) -> Result<Cell> {
        self.current = match self.config.start {
            Some(start) => start,
            None => {
                let candidates: Vec<Cell> = self
                    .states()
                    .into_iter()
                    .filter(|cell| !self.goals.contains(cell))
                    .collect();
                *candidates
                    .choose(&mut self.rng)
                    .ok_or_else(|| RLError::Environment("no non-goal start cell".into()))?
            }
        };
        debug!(start = ?self.current, "episode reset");
        Ok(self.current)
    }

    fn step(&mut self, action: &Direction) -> Result<Step<Cell>> {
        let state = self.current;
        if self.goals.contains(&state) {
            return Err(RLError::InvalidAction(format!(
                "{action} taken in terminal cell {state:?}"
            )));
        }

        let successors = self.transitions(&state, action);
        let next_state = if successors.len() == 1 {
            successors[0].0
        } else {
            let dist = WeightedIndex::new(successors.iter().map(|(_, p)| *p))
                .map_err(|e| RLError::Environment(format!("bad transition weights: {e}")))?;
            successors[dist.sample(&mut self.rng)].0
        };

        let reward = self.reward(&state, action, &next_state);
        self.current = next_state;
        Ok(Step::new(next_state, reward, self.goals.contains(&next_state)))
    }
}
