use super::tensor::Tensor;
use serde::{Serialize, Deserialize};

#[typetag::serde(tag = "type")]
pub trait Loss {
    fn calculate(&self, y_pred: &Tensor, y_true: &Tensor) -> f32;
    fn gradient(&self, y_pred: &Tensor, y_true: &Tensor) -> Tensor;
    fn clone_box(&self) -> Box<dyn Loss>;
}


// mean squared error, averaged over every element of the batch

#[derive(Serialize, Deserialize, Clone)]
pub struct MeanSquaredError;

#[typetag::serde]
impl Loss for MeanSquaredError {
    fn calculate(&self, y_pred: &Tensor, y_true: &Tensor) -> f32 {
        let count = y_pred.read().len();
        if count == 0 {
            return 0.0;
        }
        let squared_errors = y_pred.map2(y_true, |pred_x, true_x| (pred_x - true_x).powi(2));
        squared_errors.read().iter().sum::<f32>() / count as f32
    }

    fn gradient(&self, y_pred: &Tensor, y_true: &Tensor) -> Tensor {
        let count = y_pred.read().len().max(1) as f32;
        y_pred.map2(y_true, move |pred_x, true_x| 2.0 * (pred_x - true_x) / count)
    }

    fn clone_box(&self) -> Box<dyn Loss> {
        Box::new(self.clone())
    }
}
