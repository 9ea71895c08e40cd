use crate::game::{Direction, Game, GameConfig};
use crate::plot::ScorePlot;

use anyhow::{anyhow, Result};
use macroquad::prelude::*;
use std::path::Path;

const CHART_HEIGHT: f32 = 180.0;
const BLOCK_EDGE: f32 = 4.0;
const SCORE_TEXT_SIZE: u16 = 25;

const SNAKE_OUTER: Color = Color::new(0.0, 0.0, 1.0, 1.0);
const SNAKE_INNER: Color = Color::new(0.0, 0.39, 1.0, 1.0);
const FOOD: Color = Color::new(0.78, 0.0, 0.0, 1.0);
const CHART_BACKGROUND: Color = Color::new(0.1, 0.1, 0.2, 1.0);
const MEAN_LINE: Color = Color::new(1.0, 0.6, 0.0, 1.0);

pub fn window_conf(title: &str, config: &GameConfig, with_chart: bool) -> Conf {
    let chart = if with_chart { CHART_HEIGHT as i32 } else { 0 };
    Conf {
        window_title: title.to_owned(),
        window_width: config.width,
        window_height: config.height + chart,
        window_resizable: false,
        ..Default::default()
    }
}

/// Drawing state for one window session. Create it inside the macroquad
/// context and drop it when the loop ends.
pub struct Renderer {
    board_width: f32,
    board_height: f32,
    block: f32,
    with_chart: bool,
    font: Option<Font>
}

impl Renderer {
    pub async fn new(config: &GameConfig, with_chart: bool, font_path: Option<&Path>) -> Result<Self> {
        let font = match font_path {
            Some(path) => {
                let path_str = path.to_str().ok_or_else(|| anyhow!("font path {} is not utf-8", path.display()))?;
                let font = load_ttf_font(path_str).await.map_err(|e| anyhow!("failed to load font {}: {:?}", path.display(), e))?;
                Some(font)
            }
            None => None
        };

        Ok(Self {
            board_width: config.width as f32,
            board_height: config.height as f32,
            block: config.block_size as f32,
            with_chart,
            font
        })
    }

    fn text(&self, text: &str, x: f32, y: f32, size: u16, color: Color) {
        draw_text_ex(text, x, y, TextParams {
            font: self.font.as_ref(),
            font_size: size,
            color,
            ..Default::default()
        });
    }

    pub fn draw_game(&self, game: &Game) {
        clear_background(BLACK);

        for segment in game.snake() {
            let (x, y) = (segment.x as f32, segment.y as f32);
            draw_rectangle(x, y, self.block, self.block, SNAKE_OUTER);
            draw_rectangle(
                x + BLOCK_EDGE,
                y + BLOCK_EDGE,
                self.block - 2.0 * BLOCK_EDGE,
                self.block - 2.0 * BLOCK_EDGE,
                SNAKE_INNER
            );
        }

        let food = game.food();
        draw_rectangle(food.x as f32, food.y as f32, self.block, self.block, FOOD);

        self.text(&format!("Score: {}", game.score()), 4.0, SCORE_TEXT_SIZE as f32, SCORE_TEXT_SIZE, WHITE);
    }

    // score and running mean under the board
    pub fn draw_chart(&self, plot: &ScorePlot) {
        if !self.with_chart {
            return;
        }

        let area = Rect::new(0.0, self.board_height, self.board_width, CHART_HEIGHT);
        draw_rectangle(area.x, area.y, area.w, area.h, CHART_BACKGROUND);
        draw_line(area.x, area.y, area.x + area.w, area.y, 2.0, GRAY);

        let Some(&last_mean) = plot.mean_scores().last() else {
            self.text("Training...", area.x + 8.0, area.y + 24.0, 20, WHITE);
            return;
        };

        let padding = 24.0;
        let plot_area = Rect::new(area.x + padding, area.y + padding, area.w - 2.0 * padding, area.h - 2.0 * padding);
        let y_max = (plot.best() as f32).max(1.0);
        let x_step = if plot.len() > 1 { plot_area.w / (plot.len() - 1) as f32 } else { 0.0 };
        let to_screen = |i: usize, value: f32| {
            (plot_area.x + i as f32 * x_step, plot_area.y + plot_area.h * (1.0 - value / y_max))
        };

        let scores: Vec<f32> = plot.scores().iter().map(|&s| s as f32).collect();
        for (values, color) in [(scores.as_slice(), SKYBLUE), (plot.mean_scores(), MEAN_LINE)] {
            for (i, pair) in values.windows(2).enumerate() {
                let (x1, y1) = to_screen(i, pair[0]);
                let (x2, y2) = to_screen(i + 1, pair[1]);
                draw_line(x1, y1, x2, y2, 1.5, color);
            }
        }

        let caption = format!(
            "games {}  last {}  mean {:.2}  best {}",
            plot.len(),
            plot.scores().last().copied().unwrap_or(0),
            last_mean,
            plot.best()
        );
        self.text(&caption, area.x + 8.0, area.y + 18.0, 18, WHITE);
    }
}

// arrow keys or WASD
pub fn read_direction() -> Option<Direction> {
    if is_key_pressed(KeyCode::Up) || is_key_pressed(KeyCode::W) {
        Some(Direction::Up)
    } else if is_key_pressed(KeyCode::Down) || is_key_pressed(KeyCode::S) {
        Some(Direction::Down)
    } else if is_key_pressed(KeyCode::Right) || is_key_pressed(KeyCode::D) {
        Some(Direction::Right)
    } else if is_key_pressed(KeyCode::Left) || is_key_pressed(KeyCode::A) {
        Some(Direction::Left)
    } else {
        None
    }
}

// seconds per game tick at `speed` ticks per second
pub fn tick_interval(speed: u32) -> f32 {
    1.0 / speed.max(1) as f32
}
