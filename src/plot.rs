use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Per-game scores and the running mean, as fed to the live chart.
#[derive(Default, Clone, Debug)]
pub struct ScorePlot {
    scores: Vec<u32>,
    mean_scores: Vec<f32>,
    total_score: u64
}

#[derive(Serialize)]
struct Row {
    game: usize,
    score: u32,
    mean_score: f32
}

impl ScorePlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, score: u32) -> f32 {
        self.scores.push(score);
        self.total_score += score as u64;
        let mean = self.total_score as f32 / self.scores.len() as f32;
        self.mean_scores.push(mean);
        mean
    }

    pub fn scores(&self) -> &[u32] {&self.scores}
    pub fn mean_scores(&self) -> &[f32] {&self.mean_scores}

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn best(&self) -> u32 {
        self.scores.iter().copied().max().unwrap_or(0)
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let mut writer = csv::Writer::from_path(path).with_context(|| format!("failed to create {}", path.display()))?;
        for (i, (&score, &mean_score)) in self.scores.iter().zip(&self.mean_scores).enumerate() {
            writer.serialize(Row { game: i + 1, score, mean_score })?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_mean() {
        let mut plot = ScorePlot::new();
        assert_eq!(plot.record(2), 2.0);
        assert_eq!(plot.record(0), 1.0);
        assert_eq!(plot.record(7), 3.0);

        assert_eq!(plot.scores(), &[2, 0, 7]);
        assert_eq!(plot.mean_scores(), &[2.0, 1.0, 3.0]);
        assert_eq!(plot.best(), 7);
    }

    #[test]
    fn test_write_csv() {
        let path = std::env::temp_dir().join(format!("snakeql-plot-{}", std::process::id())).join("scores.csv");
        let mut plot = ScorePlot::new();
        plot.record(1);
        plot.record(3);

        plot.write_csv(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "game,score,mean_score\n1,1,1.0\n2,3,2.0\n");
        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }
}
