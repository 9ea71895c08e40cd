pub mod replaybuffer;
pub mod qtrainer;

use replaybuffer::ReplayBuffer;
use qtrainer::QTrainer;
use crate::game::{Action, Game};
use crate::sequential::{
    tensor::{self, Tensor},
    optimizer::{Adam, Optimizer, SGD},
    self as sequential,
    Sequential
};
use crate::state::{self, State, STATE_SIZE};

use anyhow::{bail, Result};
use log::{debug, trace};
use rand::prelude::*;
use rand::rngs::StdRng;
use serde::{Serialize, Deserialize};
use std::path::{Path, PathBuf};

pub const MAX_MEMORY: usize = 100_000;
pub const BATCH_SIZE: usize = 1000;
pub const LEARNING_RATE: f32 = 0.001;
pub const CHECKPOINT_PATH: &str = "model/model.bin";

/// The function approximator as seen by the agent.
pub trait QNetwork {
    // [batch, STATE_SIZE] -> [batch, Action::COUNT]
    fn predict(&mut self, states: &Tensor) -> Tensor;
    // one optimizer step towards `targets`, returns the loss
    fn update(&mut self, states: &Tensor, targets: &Tensor) -> f32;
    // writes the weights together with the training progress
    fn save(&self, path: &Path, progress: &Progress) -> Result<()>;
}

impl QNetwork for Sequential {
    fn predict(&mut self, states: &Tensor) -> Tensor {
        Sequential::predict(self, states)
    }

    fn update(&mut self, states: &Tensor, targets: &Tensor) -> f32 {
        self.train_on_batch(states, targets)
    }

    fn save(&self, path: &Path, progress: &Progress) -> Result<()> {
        sequential::write_bincode(path, &(progress, self))
    }
}

/// Stored next to the weights so a resumed run keeps its best score and
/// exploration schedule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub n_games: usize,
    pub record: u32
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OptimizerKind {
    Adam,
    Sgd
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub max_memory: usize,
    pub batch_size: usize,
    pub learning_rate: f32,
    pub gamma: f32,
    pub hidden_size: usize,
    pub exploration_budget: i64, // games played with some randomness
    pub exploration_range: i64, // random when uniform(0..=range) < budget - games
    pub checkpoint_path: PathBuf,
    pub optimizer: OptimizerKind,
    pub seed: Option<u64>
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_memory: MAX_MEMORY,
            batch_size: BATCH_SIZE,
            learning_rate: LEARNING_RATE,
            gamma: 0.9,
            hidden_size: 256,
            exploration_budget: 80,
            exploration_range: 200,
            checkpoint_path: PathBuf::from(CHECKPOINT_PATH),
            optimizer: OptimizerKind::Adam,
            seed: None
        }
    }
}

impl AgentConfig {
    pub fn build_optimizer(&self) -> Box<dyn Optimizer> {
        match self.optimizer {
            OptimizerKind::Adam => Box::new(Adam::new(self.learning_rate)),
            OptimizerKind::Sgd => Box::new(SGD::new(self.learning_rate))
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub state: State,
    pub action: Action,
    pub reward: f32,
    pub next_state: State,
    pub done: bool
}

#[derive(Clone, Debug, PartialEq)]
pub struct EpisodeReport {
    pub game: usize,
    pub score: u32,
    pub record: u32,
    pub loss: Option<f32>,
    pub checkpointed: bool
}

pub struct Agent<M: QNetwork = Sequential> {
    model: M,
    trainer: QTrainer,
    memory: ReplayBuffer<Transition>,
    config: AgentConfig,
    n_games: usize,
    record: u32,
    rng: StdRng
}

impl Agent<Sequential> {
    pub fn new(config: AgentConfig) -> Self {
        let model = Sequential::linear_q(STATE_SIZE, config.hidden_size, Action::COUNT, config.build_optimizer());
        Self::with_model(model, config)
    }

    pub fn load(path: &Path, config: AgentConfig) -> Result<Self> {
        let (progress, model): (Progress, Sequential) = sequential::read_bincode(path)?;
        if model.output_size() != Some(Action::COUNT) {
            bail!("{} holds a model with {:?} outputs, expected {}", path.display(), model.output_size(), Action::COUNT);
        }
        let mut agent = Self::with_model(model, config);
        agent.n_games = progress.n_games;
        agent.record = progress.record;
        Ok(agent)
    }
}

impl<M: QNetwork> Agent<M> {
    pub fn with_model(model: M, config: AgentConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng()
        };
        Self {
            model,
            trainer: QTrainer::new(config.gamma),
            memory: ReplayBuffer::new(config.max_memory),
            config,
            n_games: 0,
            record: 0,
            rng
        }
    }

    pub fn model(&self) -> &M {&self.model}
    pub fn memory(&self) -> &ReplayBuffer<Transition> {&self.memory}
    pub fn config(&self) -> &AgentConfig {&self.config}
    pub fn n_games(&self) -> usize {self.n_games}
    pub fn record(&self) -> u32 {self.record}

    pub fn progress(&self) -> Progress {
        Progress { n_games: self.n_games, record: self.record }
    }

    // shrinks by one per finished game, no randomness once it reaches zero
    pub fn epsilon(&self) -> i64 {
        self.config.exploration_budget - self.n_games as i64
    }

    pub fn select_action(&mut self, state: &State) -> Action {
        if self.rng.random_range(0..=self.config.exploration_range) < self.epsilon() {
            let index = self.rng.random_range(0..Action::COUNT);
            Action::ALL[index]
        } else {
            self.greedy_action(state)
        }
    }

    pub fn greedy_action(&mut self, state: &State) -> Action {
        let q_values = self.model.predict(&state::to_tensor(state));
        Action::ALL[tensor::argmax(q_values.row(0))]
    }

    pub fn remember(&mut self, transition: Transition) {
        self.memory.add(transition);
    }

    pub fn train_short(&mut self, transition: &Transition) -> f32 {
        self.trainer.train_step(&mut self.model, &[transition])
    }

    pub fn train_long(&mut self) -> Option<f32> {
        if self.memory.is_empty() {
            return None;
        }
        let batch = self.memory.sample(self.config.batch_size, &mut self.rng);
        Some(self.trainer.train_step(&mut self.model, &batch))
    }

    pub fn save(&self) -> Result<()> {
        self.model.save(&self.config.checkpoint_path, &self.progress())?;
        debug!("saved model to {}", self.config.checkpoint_path.display());
        Ok(())
    }

    /// One pass of act, step, short update, remember. Returns a report when
    /// the move ended the game, after the reset, long update and checkpoint.
    pub fn play_step(&mut self, game: &mut Game) -> Result<Option<EpisodeReport>> {
        let state_old = state::encode(game);
        let action = self.select_action(&state_old);
        let outcome = game.step(action);
        let state_new = state::encode(game);

        let transition = Transition {
            state: state_old,
            action,
            reward: outcome.reward,
            next_state: state_new,
            done: outcome.done
        };
        let loss = self.train_short(&transition);
        trace!("short update, reward {}, loss {:.4}", transition.reward, loss);
        self.remember(transition);

        if !outcome.done {
            return Ok(None);
        }

        game.reset();
        self.n_games += 1;
        let loss = self.train_long();
        if let Some(loss) = loss {
            debug!("game {} long update over {} transitions, loss {:.4}", self.n_games, self.memory.len().min(self.config.batch_size), loss);
        }

        let checkpointed = outcome.score > self.record;
        if checkpointed {
            self.record = outcome.score;
            self.save()?;
        }

        Ok(Some(EpisodeReport {
            game: self.n_games,
            score: outcome.score,
            record: self.record,
            loss,
            checkpointed
        }))
    }

    // runs whole games until `games` more have finished
    pub fn train<F>(&mut self, game: &mut Game, games: usize, mut on_episode: F) -> Result<()>
    where F: FnMut(&EpisodeReport) {
        let target = self.n_games + games;
        while self.n_games < target {
            if let Some(report) = self.play_step(game)? {
                on_episode(&report);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Direction, GameConfig, Point};
    use crate::sequential::layer::Dense;

    fn test_config(name: &str) -> AgentConfig {
        AgentConfig {
            max_memory: 50,
            batch_size: 8,
            hidden_size: 16,
            checkpoint_path: std::env::temp_dir()
                .join(format!("snakeql-agent-{}-{}", name, std::process::id()))
                .join("model.bin"),
            seed: Some(11),
            ..Default::default()
        }
    }

    fn cleanup(config: &AgentConfig) {
        if let Some(dir) = config.checkpoint_path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_default_hyperparameters() {
        let config = AgentConfig::default();
        assert_eq!(config.max_memory, 100_000);
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.gamma, 0.9);
        assert_eq!(config.checkpoint_path, PathBuf::from("model/model.bin"));
    }

    // zero the network, then bias the output towards a left turn
    fn bias_towards_left_turn(agent: &mut Agent) {
        for layer in agent.model.layers.iter_mut() {
            if let Some(dense) = layer.as_any_mut().downcast_mut::<Dense>() {
                dense.weights = Tensor::zeros(dense.weights.shape.clone());
                dense.biases = Tensor::zeros(dense.biases.shape.clone());
            }
        }
        let last = agent.model.layers[2].as_any_mut().downcast_mut::<Dense>().unwrap();
        last.biases = Tensor::from_vec(vec![0.0, 0.5, 1.0], vec![1, 3]);
    }

    #[test]
    fn test_greedy_action_is_argmax() {
        let mut agent = Agent::new(test_config("greedy"));
        bias_towards_left_turn(&mut agent);

        assert_eq!(agent.greedy_action(&[0.0; STATE_SIZE]), Action::TurnLeft);

        // exploration exhausted, so selection is greedy too
        agent.n_games = 1000;
        assert_eq!(agent.select_action(&[1.0; STATE_SIZE]), Action::TurnLeft);
    }

    #[test]
    fn test_early_games_explore_every_action() {
        let mut agent = Agent::new(test_config("explore"));
        bias_towards_left_turn(&mut agent);
        let state = [0.0; STATE_SIZE];

        let mut counts = [0usize; Action::COUNT];
        for _ in 0..600 {
            counts[agent.select_action(&state).index()] += 1;
        }
        // roughly 40% random moves at epsilon 80 out of 201
        assert!(counts.iter().all(|&count| count > 0), "{:?}", counts);

        agent.n_games = 80;
        assert_eq!(agent.epsilon(), 0);
        for _ in 0..600 {
            assert_eq!(agent.select_action(&state), Action::TurnLeft);
        }
    }

    #[test]
    fn test_epsilon_decreases_per_game() {
        let mut agent = Agent::new(test_config("epsilon"));
        assert_eq!(agent.epsilon(), 80);
        agent.n_games = 30;
        assert_eq!(agent.epsilon(), 50);
        agent.n_games = 120;
        assert!(agent.epsilon() < 0);
    }

    #[test]
    fn test_memory_is_bounded() {
        let config = test_config("memory");
        let mut agent = Agent::new(config.clone());
        let mut game = Game::with_seed(GameConfig::default(), 5);

        for _ in 0..200 {
            agent.play_step(&mut game).unwrap();
        }

        assert_eq!(agent.memory().len(), config.max_memory);
        cleanup(&config);
    }

    #[test]
    fn test_episode_end_checkpoints_new_record() {
        let config = test_config("record");
        let mut agent = Agent::new(config.clone());
        agent.n_games = 1000; // greedy

        // food straight ahead, wall right behind it: any move scores or dies quickly
        let mut game = Game::from_parts(
            GameConfig::default(),
            vec![Point::new(580, 0), Point::new(560, 0), Point::new(540, 0)],
            Direction::Right,
            Point::new(600, 0),
            9
        );
        // force the eat, then run out the game
        let outcome = game.step(Action::Straight);
        assert_eq!(outcome.score, 1);

        let report = loop {
            if let Some(report) = agent.play_step(&mut game).unwrap() {
                break report;
            }
        };

        assert_eq!(report.game, 1001);
        assert!(report.loss.is_some());
        if report.score > 0 {
            assert!(report.checkpointed);
            assert!(config.checkpoint_path.exists());
            let loaded = Agent::load(&config.checkpoint_path, config.clone()).unwrap();
            assert_eq!(loaded.n_games(), 1001);
            assert_eq!(loaded.record(), report.score);
        }
        assert_eq!(game.score(), 0);
        assert_eq!(game.snake().len(), 3);
        cleanup(&config);
    }

    #[test]
    fn test_train_runs_whole_games() {
        let config = test_config("train");
        let mut agent = Agent::new(config.clone());
        let mut game = Game::with_seed(GameConfig::new(200, 200), 2);
        let mut reports = Vec::new();

        agent.train(&mut game, 3, |report| reports.push(report.clone())).unwrap();

        assert_eq!(agent.n_games(), 3);
        assert_eq!(reports.iter().map(|r| r.game).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(reports.windows(2).all(|w| w[0].record <= w[1].record));
        cleanup(&config);
    }

    #[test]
    fn test_load_rejects_wrong_output_size() {
        let config = test_config("shape");
        let model = Sequential::linear_q(STATE_SIZE, 4, 5, config.build_optimizer());
        QNetwork::save(&model, &config.checkpoint_path, &Progress::default()).unwrap();

        assert!(Agent::load(&config.checkpoint_path, config.clone()).is_err());
        cleanup(&config);
    }

    #[test]
    fn test_resume_restores_progress() {
        let config = test_config("resume");
        let mut agent = Agent::new(config.clone());
        agent.n_games = 250;
        agent.record = 17;
        agent.save().unwrap();

        let resumed = Agent::load(&config.checkpoint_path, config.clone()).unwrap();

        assert_eq!(resumed.n_games(), 250);
        assert_eq!(resumed.record(), 17);
        assert!(resumed.epsilon() <= 0);
        assert_eq!(resumed.progress(), agent.progress());
        cleanup(&config);
    }

    #[test]
    fn test_resumed_agent_only_checkpoints_a_better_score() {
        let config = test_config("resume-record");
        let mut agent = Agent::new(config.clone());
        agent.record = 5;
        agent.save().unwrap();

        let mut resumed = Agent::load(&config.checkpoint_path, config.clone()).unwrap();
        let mut game = Game::with_seed(GameConfig::new(200, 200), 4);
        let mut reports = Vec::new();
        resumed.train(&mut game, 2, |report| reports.push(report.clone())).unwrap();

        // the restored record is the bar to beat
        assert!(reports.iter().filter(|report| report.score <= 5).all(|report| !report.checkpointed));
        assert!(resumed.record() >= 5);
        cleanup(&config);
    }
}
