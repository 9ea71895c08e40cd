use anyhow::Result;
use clap::Parser;
use log::{error, info, warn};
use macroquad::prelude::*;
use snakeql::agent::{self, Agent, AgentConfig, EpisodeReport, OptimizerKind};
use snakeql::game::{Game, GameConfig};
use snakeql::plot::ScorePlot;
use snakeql::render::{self, Renderer};
use std::path::PathBuf;

// steps per frame when the window is not paced to game speed
const FAST_STEPS_PER_FRAME: usize = 200;

#[derive(Parser, Clone)]
#[command(name = "train")]
#[command(version, about = "Train a deep Q-network to play snake")]
struct Cli {
    /// Stop after this many games (runs until the window closes when omitted)
    #[arg(long)]
    games: Option<usize>,

    /// Train without opening a window (requires --games)
    #[arg(long, requires = "games")]
    headless: bool,

    /// Step as fast as possible instead of at game speed
    #[arg(long)]
    fast: bool,

    /// Continue from the checkpoint if one exists
    #[arg(long)]
    resume: bool,

    /// Where the best model is written
    #[arg(long, default_value = agent::CHECKPOINT_PATH)]
    checkpoint: PathBuf,

    /// Write per-game scores and the running mean to this CSV file on exit
    #[arg(long)]
    scores_csv: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OptimizerKind::Adam)]
    optimizer: OptimizerKind,

    #[arg(long, default_value_t = agent::LEARNING_RATE)]
    learning_rate: f32,

    /// Seed for food placement and exploration
    #[arg(long)]
    seed: Option<u64>,

    /// Board width in pixels
    #[arg(long, default_value_t = 640)]
    width: i32,

    /// Board height in pixels
    #[arg(long, default_value_t = 480)]
    height: i32,

    /// TTF font for the score text
    #[arg(long)]
    font: Option<PathBuf>,
}

struct Session {
    agent: Agent,
    game: Game,
    plot: ScorePlot,
    games: Option<usize>,
    scores_csv: Option<PathBuf>
}

impl Session {
    fn new(cli: &Cli) -> Result<Self> {
        let game_config = GameConfig::new(cli.width, cli.height);
        let agent_config = AgentConfig {
            checkpoint_path: cli.checkpoint.clone(),
            optimizer: cli.optimizer,
            learning_rate: cli.learning_rate,
            seed: cli.seed,
            ..Default::default()
        };

        let agent = if cli.resume && cli.checkpoint.exists() {
            info!("resuming from {}", cli.checkpoint.display());
            Agent::load(&cli.checkpoint, agent_config)?
        } else {
            if cli.resume {
                warn!("no checkpoint at {}, starting fresh", cli.checkpoint.display());
            }
            Agent::new(agent_config)
        };

        let game = match cli.seed {
            Some(seed) => Game::with_seed(game_config, seed),
            None => Game::new(game_config)
        };

        Ok(Self {
            agent,
            game,
            plot: ScorePlot::new(),
            games: cli.games,
            scores_csv: cli.scores_csv.clone()
        })
    }

    fn finished(&self) -> bool {
        self.games.is_some_and(|games| self.plot.len() >= games)
    }

    fn step(&mut self) -> Result<()> {
        if let Some(report) = self.agent.play_step(&mut self.game)? {
            self.record(&report);
        }
        Ok(())
    }

    fn record(&mut self, report: &EpisodeReport) {
        let mean = self.plot.record(report.score);
        info!("Game {} Score {} Record {} Mean {:.2}", report.game, report.score, report.record, mean);
        if report.checkpointed {
            info!("new record, model written to {}", self.agent.config().checkpoint_path.display());
        }
    }

    fn close(&self) -> Result<()> {
        if let Some(path) = &self.scores_csv {
            self.plot.write_csv(path)?;
            info!("wrote {} scores to {}", self.plot.len(), path.display());
        }
        Ok(())
    }
}

fn run_headless(mut session: Session) -> Result<()> {
    while !session.finished() {
        session.step()?;
    }
    session.close()
}

async fn run_window(mut session: Session, cli: Cli) -> Result<()> {
    let renderer = Renderer::new(session.game.config(), true, cli.font.as_deref()).await?;
    let mut time_accumulator: f32 = 0.0; // seconds

    while !session.finished() && !is_key_pressed(KeyCode::Escape) {
        if cli.fast {
            for _ in 0..FAST_STEPS_PER_FRAME {
                session.step()?;
                if session.finished() {
                    break;
                }
            }
        } else {
            time_accumulator += get_frame_time();
            let mut interval = render::tick_interval(session.game.speed());
            while time_accumulator >= interval && !session.finished() {
                time_accumulator -= interval;
                session.step()?;
                interval = render::tick_interval(session.game.speed());
            }
        }

        renderer.draw_game(&session.game);
        renderer.draw_chart(&session.plot);
        next_frame().await
    }

    session.close()
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let session = Session::new(&cli)?;
    info!(
        "training on a {}x{} board, checkpoints at {}",
        cli.width,
        cli.height,
        cli.checkpoint.display()
    );

    if cli.headless {
        return run_headless(session);
    }

    let conf = render::window_conf("snake: training", session.game.config(), true);
    macroquad::Window::from_config(conf, async move {
        if let Err(e) = run_window(session, cli).await {
            error!("{:#}", e);
            std::process::exit(1);
        }
    });
    Ok(())
}
