pub mod sequential;

pub use sequential::tensor::Tensor;
pub use sequential::layer::{
    Layer,
    Dense,
    ReLU,
};
pub use sequential::loss::{
    Loss,
    MeanSquaredError
};
pub use sequential::optimizer::{
    Optimizer,
    SGD,
    Adam,
};
pub use sequential::Sequential;

pub mod game;
pub mod state;
pub mod agent;
pub mod plot;
pub mod render;

pub use game::{Action, Direction, Game, GameConfig, Point, StepOutcome};
pub use agent::{Agent, AgentConfig, EpisodeReport, QNetwork, Transition};
pub use agent::replaybuffer::ReplayBuffer;
pub use plot::ScorePlot;
