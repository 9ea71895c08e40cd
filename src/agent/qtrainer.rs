use super::{QNetwork, Transition};
use crate::sequential::tensor::Tensor;

pub struct QTrainer {
    gamma: f32
}

impl QTrainer {
    pub fn new(gamma: f32) -> Self {
        Self { gamma }
    }

    pub fn gamma(&self) -> f32 {
        self.gamma
    }

    /// Bellman targets: the model's own predictions, except at each sample's
    /// taken action, which becomes `reward` (terminal) or
    /// `reward + gamma * max Q(next_state)`.
    pub fn targets(&self, predictions: &Tensor, next_max_q: &[f32], batch: &[&Transition]) -> Tensor {
        assert_eq!(predictions.rows(), batch.len(), "one prediction row per transition");
        assert_eq!(next_max_q.len(), batch.len(), "one next-state value per transition");

        let mut targets = predictions.clone();
        let cols = targets.cols();
        let data = targets.write();
        for (i, transition) in batch.iter().enumerate() {
            let q_new = if transition.done {
                transition.reward
            } else {
                transition.reward + self.gamma * next_max_q[i]
            };
            data[i * cols + transition.action.index()] = q_new;
        }
        targets
    }

    // one optimizer step over `batch`, returns the loss
    pub fn train_step<M: QNetwork + ?Sized>(&self, model: &mut M, batch: &[&Transition]) -> f32 {
        if batch.is_empty() {
            return 0.0;
        }

        let states = Tensor::from_rows(&batch.iter().map(|t| t.state).collect::<Vec<_>>());
        let next_states = Tensor::from_rows(&batch.iter().map(|t| t.next_state).collect::<Vec<_>>());

        let predictions = model.predict(&states);
        let next_max_q = model.predict(&next_states).max_rows();
        let targets = self.targets(&predictions, next_max_q.read(), batch);

        model.update(&states, &targets)
    }
}
