use anyhow::Result;
use clap::Parser;
use log::{error, info};
use macroquad::prelude::*;
use snakeql::agent::{Agent, AgentConfig};
use snakeql::game::{Direction, Game, GameConfig};
use snakeql::render::{self, Renderer};
use snakeql::state;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "play")]
#[command(version, about = "Play snake with the keyboard, or watch a trained agent")]
struct Cli {
    /// Checkpoint to watch instead of playing yourself
    #[arg(long)]
    agent: Option<PathBuf>,

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

enum Player {
    Human { pending: Direction },
    Agent(Agent)
}

impl Player {
    fn step(&mut self, game: &mut Game) -> bool {
        match self {
            Player::Human { pending } => game.play_direction(*pending).done,
            Player::Agent(agent) => {
                let action = agent.greedy_action(&state::encode(game));
                game.step(action).done
            }
        }
    }

    fn reset(&mut self, game: &mut Game) {
        game.reset();
        if let Player::Human { pending } = self {
            *pending = game.direction();
        }
    }
}

async fn run(cli: Cli, mut player: Player) -> Result<()> {
    let mut game = Game::new(GameConfig::new(cli.width, cli.height));
    let renderer = Renderer::new(game.config(), false, cli.font.as_deref()).await?;
    let mut time_accumulator: f32 = 0.0; // seconds
    let mut over = false;

    loop {
        if is_key_pressed(KeyCode::Escape) {
            break;
        }

        if over {
            if is_key_pressed(KeyCode::Space) || is_key_pressed(KeyCode::Enter) {
                player.reset(&mut game);
                over = false;
                time_accumulator = 0.0;
            }
        } else {
            if let (Player::Human { pending }, Some(direction)) = (&mut player, render::read_direction()) {
                *pending = direction;
            }

            time_accumulator += get_frame_time();
            let interval = render::tick_interval(game.speed());
            if time_accumulator >= interval {
                time_accumulator -= interval;
                if player.step(&mut game) {
                    info!("Final Score {}", game.score());
                    over = true;
                }
            }
        }

        renderer.draw_game(&game);
        if over {
            let text = "Game over - space to restart, esc to quit";
            let dims = measure_text(text, None, 24, 1.0);
            draw_text(text, (screen_width() - dims.width) / 2.0, screen_height() / 2.0, 24.0, WHITE);
        }
        next_frame().await
    }

    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let player = match &cli.agent {
        Some(path) => {
            info!("watching agent from {}", path.display());
            Player::Agent(Agent::load(path, AgentConfig::default())?)
        }
        None => Player::Human { pending: Direction::Right }
    };

    let title = if cli.agent.is_some() { "snake: agent" } else { "snake" };
    let conf = render::window_conf(title, &GameConfig::new(cli.width, cli.height), false);
    macroquad::Window::from_config(conf, async move {
        if let Err(e) = run(cli, player).await {
            error!("{:#}", e);
            std::process::exit(1);
        }
    });
    Ok(())
}
