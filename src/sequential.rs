pub mod tensor;
pub mod layer;
pub mod loss;
pub mod optimizer;

use tensor::Tensor;
use layer::{Layer, Dense, ReLU};
use loss::{Loss, MeanSquaredError};
use optimizer::Optimizer;

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize, Deserialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

#[derive(Serialize, Deserialize)]
pub struct Sequential {
    pub layers: Vec<Box<dyn Layer>>,
    pub loss: Box<dyn Loss>,
    pub optimizer: Box<dyn Optimizer>
}

impl Sequential {
    pub fn new(layers: Vec<Box<dyn Layer>>, loss: Box<dyn Loss>, optimizer: Box<dyn Optimizer>) -> Self {
        Self {
            layers,
            loss,
            optimizer
        }
    }

    // input -> hidden -> relu -> output, trained on mean squared error
    pub fn linear_q(input_size: usize, hidden_size: usize, output_size: usize, optimizer: Box<dyn Optimizer>) -> Self {
        let layers: Vec<Box<dyn Layer>> = vec![
            Box::new(Dense::new(input_size, hidden_size)),
            Box::new(ReLU::new()),
            Box::new(Dense::new(hidden_size, output_size))
        ];
        Self::new(layers, Box::new(MeanSquaredError), optimizer)
    }

    pub fn predict(&mut self, input: &Tensor) -> Tensor {
        let mut output = input.clone();
        for layer in &mut self.layers {
            output = layer.forward(&output);
        }
        output
    }

    // one forward/backward/optimizer pass, returns the loss before the step
    pub fn train_on_batch(&mut self, x_batch: &Tensor, y_batch: &Tensor) -> f32 {
        let y_pred = self.predict(x_batch);
        let loss = self.loss.calculate(&y_pred, y_batch);
        let mut d_output = self.loss.gradient(&y_pred, y_batch);
        for layer in self.layers.iter_mut().rev() {
            d_output = layer.backward(&d_output);
        }
        self.optimizer.step(&mut self.layers);
        loss
    }

    pub fn output_size(&self) -> Option<usize> {
        self.layers.iter().rev().find_map(|layer| layer.as_any().downcast_ref::<Dense>()).map(Dense::output_size)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_bincode(path, self)
    }

    pub fn load(path: &Path) -> Result<Self> {
        read_bincode(path)
    }
}

pub(crate) fn write_bincode<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    bincode::serialize_into(BufWriter::new(file), value).with_context(|| format!("failed to write model to {}", path.display()))?;
    Ok(())
}

pub(crate) fn read_bincode<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let value = bincode::deserialize_from(BufReader::new(file)).with_context(|| format!("failed to read model from {}", path.display()))?;
    Ok(value)
}

impl Clone for Sequential {
    fn clone(&self) -> Self {
        Self {
            layers: self.layers.iter().map(|layer| layer.clone_box()).collect(),
            loss: self.loss.clone_box(),
            optimizer: self.optimizer.clone_box()
        }
    }
}
