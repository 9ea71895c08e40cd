use super::tensor::Tensor;
use std::any::Any;
use rayon::prelude::*;
use serde::{Serialize, Deserialize};

#[typetag::serde(tag = "type")]
pub trait Layer {
    fn forward(&mut self, input: &Tensor) -> Tensor;
    fn backward(&mut self, d_output: &Tensor) -> Tensor;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn as_any(&self) -> &dyn Any;
    fn clone_box(&self) -> Box<dyn Layer>;
}


// dense layer

#[derive(Serialize, Deserialize, Clone)]
pub struct Dense {
    pub weights: Tensor,
    pub biases: Tensor,
    #[serde(skip)]
    cached_input: Option<Tensor>, // for back propagation
    #[serde(skip)]
    pub d_weights: Option<Tensor>,
    #[serde(skip)]
    pub d_biases: Option<Tensor>
}

impl Dense {
    pub fn new(input_size: usize, output_size: usize) -> Self {
        let bound = 1.0 / (input_size.max(1) as f32).sqrt();
        Self {
            weights: Tensor::uniform(vec![input_size, output_size], bound),
            biases: Tensor::uniform(vec![1, output_size], bound),
            cached_input: None,
            d_weights: None,
            d_biases: None
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.shape[0]
    }

    pub fn output_size(&self) -> usize {
        self.weights.shape[1]
    }
}

#[typetag::serde]
impl Layer for Dense {
    fn forward(&mut self, input: &Tensor) -> Tensor {
        self.cached_input = Some(input.clone());

        let mut output = input.matmul(&self.weights);
        let output_size = output.shape[1];

        if output_size > 0 {
            let biases_data = self.biases.read();
            output.write().par_chunks_mut(output_size).for_each(|row_chunk| {
                for (value, bias) in row_chunk.iter_mut().zip(biases_data) {
                    *value += bias;
                }
            });
        }

        output
    }

    fn backward(&mut self, d_output: &Tensor) -> Tensor {
        let Some(cached_input) = &self.cached_input else {
            panic!("complete forward pass first.");
        };

        // dL/dW = input.T @ dL/dY
        self.d_weights = Some(cached_input.transpose().matmul(d_output));

        // dL/db = dL/dY.sum(axis=0)
        self.d_biases = Some(d_output.sum(0));

        // dL/dX = dL/dY @ weights.T
        d_output.matmul(&self.weights.transpose())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_box(&self) -> Box<dyn Layer> {
        Box::new(self.clone())
    }
}


// relu layer

#[derive(Serialize, Deserialize, Clone, Default)]
pub struct ReLU {
    #[serde(skip)]
    cached_input: Option<Tensor>
}

impl ReLU {
    pub fn new() -> Self {
        Self::default()
    }
}

#[typetag::serde]
impl Layer for ReLU {
    fn forward(&mut self, input: &Tensor) -> Tensor {
        self.cached_input = Some(input.clone());
        input.map(|x| x.max(0.0))
    }

    fn backward(&mut self, d_output: &Tensor) -> Tensor {
        let Some(cached_input) = &self.cached_input else {
            panic!("complete forward pass first.");
        };

        cached_input.map2(d_output, |input_val, output_val| {
            if input_val > 0.0 { output_val } else { 0.0 }
        })
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_box(&self) -> Box<dyn Layer> {
        Box::new(self.clone())
    }
}
