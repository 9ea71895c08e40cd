use std::collections::VecDeque;
use anyhow::{bail, Result};
use log::warn;
use rand::prelude::*;
use rand::rngs::StdRng;
use serde::{Serialize, Deserialize};

pub const BLOCK_SIZE: i32 = 20;
pub const INITIAL_SPEED: u32 = 15;
pub const INITIAL_LENGTH: usize = 3;

// an episode is cut once it runs this many frames per snake segment
const STALL_FACTOR: usize = 100;

const FOOD_REWARD: f32 = 10.0;
const DEATH_REWARD: f32 = -10.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    // neighbouring cell `block` pixels away
    pub fn offset(self, direction: Direction, block: i32) -> Self {
        let (dx, dy) = direction.unit();
        Self::new(self.x + dx * block, self.y + dy * block)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Right,
    Down,
    Left,
    Up
}

impl Direction {
    pub const CLOCKWISE: [Direction; 4] = [Direction::Right, Direction::Down, Direction::Left, Direction::Up];

    fn clockwise_index(self) -> usize {
        match self {
            Direction::Right => 0,
            Direction::Down => 1,
            Direction::Left => 2,
            Direction::Up => 3
        }
    }

    pub fn clockwise(self) -> Self {
        Self::CLOCKWISE[(self.clockwise_index() + 1) % 4]
    }

    pub fn counter_clockwise(self) -> Self {
        Self::CLOCKWISE[(self.clockwise_index() + 3) % 4]
    }

    pub fn opposite(self) -> Self {
        Self::CLOCKWISE[(self.clockwise_index() + 2) % 4]
    }

    // screen space: y grows downwards
    pub fn unit(self) -> (i32, i32) {
        match self {
            Direction::Right => (1, 0),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Up => (0, -1)
        }
    }

    pub fn turn(self, action: Action) -> Self {
        match action {
            Action::Straight => self,
            Action::TurnRight => self.clockwise(),
            Action::TurnLeft => self.counter_clockwise()
        }
    }
}

/// Move relative to the current heading.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Straight,
    TurnRight,
    TurnLeft
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Straight, Action::TurnRight, Action::TurnLeft];
    pub const COUNT: usize = 3;

    pub fn index(self) -> usize {
        match self {
            Action::Straight => 0,
            Action::TurnRight => 1,
            Action::TurnLeft => 2
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn one_hot(self) -> [f32; 3] {
        let mut encoded = [0.0; 3];
        encoded[self.index()] = 1.0;
        encoded
    }
}

impl TryFrom<&[f32]> for Action {
    type Error = anyhow::Error;

    // only [1,0,0], [0,1,0] and [0,0,1] are actions
    fn try_from(encoded: &[f32]) -> Result<Self> {
        if let Some(action) = Action::ALL.into_iter().find(|a| a.one_hot().as_slice() == encoded) {
            return Ok(action);
        }
        bail!("not a one-hot action: {:?}", encoded)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    pub width: i32, // pixels
    pub height: i32, // pixels
    pub block_size: i32,
    pub initial_speed: u32 // frames per second when rendered
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            block_size: BLOCK_SIZE,
            initial_speed: INITIAL_SPEED
        }
    }
}

impl GameConfig {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    pub fn columns(&self) -> i32 {
        self.width / self.block_size
    }

    pub fn rows(&self) -> i32 {
        self.height / self.block_size
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepOutcome {
    pub reward: f32,
    pub done: bool,
    pub score: u32
}

pub struct Game {
    config: GameConfig,
    snake: VecDeque<Point>, // head first
    direction: Direction,
    food: Point,
    score: u32,
    speed: u32,
    frame_iteration: usize,
    alive: bool,
    rng: StdRng
}

impl Game {
    pub fn new(config: GameConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    pub fn with_seed(config: GameConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: GameConfig, rng: StdRng) -> Self {
        assert!(config.block_size > 0, "block size must be positive");
        assert!(
            config.columns() / 2 >= INITIAL_LENGTH as i32 - 1 && config.rows() >= 1,
            "board too small for the starting snake"
        );

        let mut instance = Self {
            snake: VecDeque::with_capacity(INITIAL_LENGTH),
            direction: Direction::Right,
            food: Point::new(0, 0),
            score: 0,
            speed: config.initial_speed,
            frame_iteration: 0,
            alive: true,
            rng,
            config
        };
        instance.reset();
        instance
    }

    /// Builds a game in an exact position. The food is taken as given, even if
    /// it overlaps the body.
    pub fn from_parts(config: GameConfig, snake: Vec<Point>, direction: Direction, food: Point, seed: u64) -> Self {
        assert!(!snake.is_empty(), "snake needs a head");
        let mut instance = Self::with_seed(config, seed);
        instance.snake = snake.into_iter().collect();
        instance.direction = direction;
        instance.food = food;
        instance
    }

    pub fn config(&self) -> &GameConfig {&self.config}
    pub fn snake(&self) -> &VecDeque<Point> {&self.snake}
    pub fn direction(&self) -> Direction {self.direction}
    pub fn food(&self) -> Point {self.food}
    pub fn score(&self) -> u32 {self.score}
    pub fn speed(&self) -> u32 {self.speed}
    pub fn frame_iteration(&self) -> usize {self.frame_iteration}
    pub fn alive(&self) -> bool {self.alive}

    pub fn head(&self) -> Point {
        self.snake[0]
    }

    /// Centres the snake heading right. The tail lands in column
    /// `columns / 2 - 2`, which the constructor keeps on the board.
    pub fn reset(&mut self) {
        let block = self.config.block_size;
        let head = Point::new(
            (self.config.width / 2) / block * block,
            (self.config.height / 2) / block * block
        );

        self.direction = Direction::Right;
        self.snake.clear();
        for i in 0..INITIAL_LENGTH as i32 {
            self.snake.push_back(Point::new(head.x - i * block, head.y));
        }
        self.score = 0;
        self.speed = self.config.initial_speed;
        self.alive = true;
        self.place_food();
        self.frame_iteration = 0;
    }

    // AI step: turn relative to the heading, then move one block.
    // Once an outcome reports `done`, call `reset` before stepping again.
    pub fn step(&mut self, action: Action) -> StepOutcome {
        let direction = self.direction.turn(action);
        self.advance(direction, true)
    }

    // human step: absolute heading, reversing onto the neck is ignored
    pub fn play_direction(&mut self, requested: Direction) -> StepOutcome {
        let direction = if self.snake.len() > 1 && requested == self.direction.opposite() {
            self.direction
        } else {
            requested
        };
        self.advance(direction, false)
    }

    fn advance(&mut self, direction: Direction, stall_guard: bool) -> StepOutcome {
        debug_assert!(self.alive, "game is over, reset before stepping again");
        self.frame_iteration += 1;
        self.direction = direction;

        let head = self.head().offset(direction, self.config.block_size);
        self.snake.push_front(head);

        let stalled = stall_guard && self.frame_iteration > STALL_FACTOR * self.snake.len();
        if self.is_collision(head) || stalled {
            self.alive = false;
            return StepOutcome { reward: DEATH_REWARD, done: true, score: self.score };
        }

        let reward = if head == self.food {
            self.score += 1;
            self.speed += 1;
            self.place_food();
            FOOD_REWARD
        } else {
            self.snake.pop_back();
            0.0
        };

        StepOutcome { reward, done: false, score: self.score }
    }

    /// Wall or body hit at `point`. The current head is not counted as body.
    pub fn is_collision(&self, point: Point) -> bool {
        self.hits_wall(point) || self.snake.iter().skip(1).any(|&segment| segment == point)
    }

    fn hits_wall(&self, point: Point) -> bool {
        let block = self.config.block_size;
        point.x > self.config.width - block || point.x < 0 ||
        point.y > self.config.height - block || point.y < 0
    }

    // rejection sampling, falls back to an explicit scan on a crowded board
    fn place_food(&mut self) {
        const ATTEMPTS: usize = 64;
        let block = self.config.block_size;
        let (columns, rows) = (self.config.columns(), self.config.rows());

        for _ in 0..ATTEMPTS {
            let candidate = Point::new(
                self.rng.random_range(0..columns) * block,
                self.rng.random_range(0..rows) * block
            );
            if !self.snake.contains(&candidate) {
                self.food = candidate;
                return;
            }
        }

        let free: Vec<Point> = (0..rows)
            .flat_map(|r| (0..columns).map(move |c| Point::new(c * block, r * block)))
            .filter(|cell| !self.snake.contains(cell))
            .collect();
        match free.choose(&mut self.rng) {
            Some(&cell) => self.food = cell,
            None => warn!("board is full, food stays at {:?}", self.food)
        }
    }
}
