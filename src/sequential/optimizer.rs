use super::layer::{Layer, Dense};
use super::tensor::Tensor;
use serde::{Serialize, Deserialize};

#[typetag::serde(tag = "type")]
pub trait Optimizer {
    fn step(&mut self, layers: &mut [Box<dyn Layer>]);
    fn clone_box(&self) -> Box<dyn Optimizer>;
}


// SGD

#[derive(Serialize, Deserialize, Clone)]
pub struct SGD {
    learning_rate: f32
}

impl SGD {
    pub fn new(learning_rate: f32) -> Self {
        Self {
            learning_rate
        }
    }
}

#[typetag::serde]
impl Optimizer for SGD {
    fn step(&mut self, layers: &mut [Box<dyn Layer>]) {
        for layer in layers {
            let Some(dense_layer) = layer.as_any_mut().downcast_mut::<Dense>() else {
                continue;
            };
            if let (Some(d_weights), Some(d_biases)) = (&dense_layer.d_weights, &dense_layer.d_biases) {
                let lr = self.learning_rate;
                dense_layer.weights = dense_layer.weights.map2(d_weights, |w, dw| w - lr * dw);
                dense_layer.biases = dense_layer.biases.map2(d_biases, |b, db| b - lr * db);
            }
        }
    }

    fn clone_box(&self) -> Box<dyn Optimizer> {
        Box::new(self.clone())
    }
}


// Adam

#[derive(Serialize, Deserialize, Clone)]
struct Moments {
    m_weights: Tensor,
    v_weights: Tensor,
    m_biases: Tensor,
    v_biases: Tensor
}

impl Moments {
    fn for_layer(layer: &Dense) -> Self {
        Self {
            m_weights: Tensor::zeros(layer.weights.shape.clone()),
            v_weights: Tensor::zeros(layer.weights.shape.clone()),
            m_biases: Tensor::zeros(layer.biases.shape.clone()),
            v_biases: Tensor::zeros(layer.biases.shape.clone())
        }
    }
}

#[derive(Serialize, Deserialize, Clone)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    timestep: i32,
    moments: Vec<Option<Moments>> // indexed like the layers slice
}

impl Adam {
    pub fn new(learning_rate: f32) -> Self {
        Self::with_betas(learning_rate, 0.9, 0.999, 1e-8)
    }

    pub fn with_betas(learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            timestep: 0,
            moments: Vec::new()
        }
    }

    pub fn timestep(&self) -> i32 {
        self.timestep
    }

    fn update(&self, param: &mut Tensor, grad: &Tensor, m: &mut Tensor, v: &mut Tensor) {
        let (b1, b2, eps) = (self.beta1, self.beta2, self.epsilon);
        let bias1 = 1.0 - b1.powi(self.timestep);
        let bias2 = 1.0 - b2.powi(self.timestep);

        *m = m.map2(grad, |m, g| b1 * m + (1.0 - b1) * g);
        *v = v.map2(grad, |v, g| b2 * v + (1.0 - b2) * g * g);

        let lr = self.learning_rate;
        let m_data = m.read();
        let v_data = v.read();
        for ((p, m), v) in param.write().iter_mut().zip(m_data).zip(v_data) {
            let m_hat = m / bias1;
            let v_hat = v / bias2;
            *p -= lr * m_hat / (v_hat.sqrt() + eps);
        }
    }
}

#[typetag::serde]
impl Optimizer for Adam {
    fn step(&mut self, layers: &mut [Box<dyn Layer>]) {
        if self.moments.len() < layers.len() {
            self.moments.resize(layers.len(), None);
        }
        self.timestep += 1;

        for (index, layer) in layers.iter_mut().enumerate() {
            let Some(dense_layer) = layer.as_any_mut().downcast_mut::<Dense>() else {
                continue;
            };
            let (Some(d_weights), Some(d_biases)) = (dense_layer.d_weights.clone(), dense_layer.d_biases.clone()) else {
                continue;
            };

            let mut moments = self.moments[index].take().unwrap_or_else(|| Moments::for_layer(dense_layer));
            self.update(&mut dense_layer.weights, &d_weights, &mut moments.m_weights, &mut moments.v_weights);
            self.update(&mut dense_layer.biases, &d_biases, &mut moments.m_biases, &mut moments.v_biases);
            self.moments[index] = Some(moments);
        }
    }

    fn clone_box(&self) -> Box<dyn Optimizer> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_vec_approx_eq(a: &[f32], b: &[f32]) {
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-5, "{} vs {}", x, y);
        }
    }

    fn layer_with_gradients() -> Vec<Box<dyn Layer>> {
        let mut dense_layer = Dense::new(2, 2);
        dense_layer.weights = Tensor::from_vec(vec![10.0, 20.0, 30.0, 40.0], vec![2, 2]);
        dense_layer.biases = Tensor::from_vec(vec![5.0, 6.0], vec![1, 2]);
        dense_layer.d_weights = Some(Tensor::from_vec(vec![2.0, 3.0, -4.0, 0.0], vec![2, 2]));
        dense_layer.d_biases = Some(Tensor::from_vec(vec![0.5, -1.5], vec![1, 2]));
        vec![Box::new(dense_layer)]
    }

    fn dense(layers: &[Box<dyn Layer>]) -> &Dense {
        layers[0].as_any().downcast_ref::<Dense>().unwrap()
    }

    #[test]
    fn test_sgd_optimizer_step() {
        let mut layers = layer_with_gradients();
        SGD::new(0.1).step(&mut layers);

        // new_w = old_w - lr * d_w
        assert_vec_approx_eq(dense(&layers).weights.read(), &[9.8, 19.7, 30.4, 40.0]);
        assert_vec_approx_eq(dense(&layers).biases.read(), &[4.95, 6.15]);
    }

    #[test]
    fn test_adam_first_step_moves_by_learning_rate() {
        // with bias correction the first step is lr * sign(g) for every non-zero gradient
        let mut layers = layer_with_gradients();
        let mut adam = Adam::new(0.01);
        adam.step(&mut layers);

        assert_eq!(adam.timestep(), 1);
        assert_vec_approx_eq(dense(&layers).weights.read(), &[9.99, 19.99, 30.01, 40.0]);
        assert_vec_approx_eq(dense(&layers).biases.read(), &[4.99, 6.01]);
    }

    #[test]
    fn test_adam_skips_layers_without_gradients() {
        let mut layers: Vec<Box<dyn Layer>> = vec![Box::new(Dense::new(2, 2))];
        let before = dense(&layers).weights.clone();

        Adam::new(0.01).step(&mut layers);

        assert_eq!(dense(&layers).weights, before);
    }
}
