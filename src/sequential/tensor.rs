use rand_distr::{Distribution, Uniform};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Dense row-major 2D buffer of `f32`.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>
}

impl Tensor {
    pub fn zeros(shape: Vec<usize>) -> Self {
        Self {
            data: vec![0.0; shape.iter().product()],
            shape
        }
    }

    // samples from U(-bound, bound), the usual fan-in init for linear layers
    pub fn uniform(shape: Vec<usize>, bound: f32) -> Self {
        if bound <= 0.0 {
            return Tensor::zeros(shape);
        }
        let dist = Uniform::new_inclusive(-bound, bound).unwrap();
        let mut rng = rand::rng();
        let data: Vec<f32> = (0..shape.iter().product()).map(|_| dist.sample(&mut rng)).collect();
        Self { data, shape }
    }

    pub fn from_vec(data: Vec<f32>, shape: Vec<usize>) -> Self {
        assert_eq!(data.len(), shape.iter().product::<usize>(), "data length must match shape");
        Self { data, shape }
    }

    // stacks [1, n] tensors (or plain rows) into a [rows, n] batch
    pub fn from_rows<R: AsRef<[f32]>>(rows: &[R]) -> Self {
        let cols = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            assert_eq!(row.as_ref().len(), cols, "all rows must have the same width");
            data.extend_from_slice(row.as_ref());
        }
        Self { data, shape: vec![rows.len(), cols] }
    }

    pub fn read(&self) -> &[f32] {
        &self.data
    }

    pub fn write(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn rows(&self) -> usize {
        self.shape[0]
    }

    pub fn cols(&self) -> usize {
        self.shape[1]
    }

    pub fn row(&self, index: usize) -> &[f32] {
        let cols = self.cols();
        &self.data[index * cols..(index + 1) * cols]
    }

    pub fn transpose(&self) -> Self {
        assert_eq!(self.shape.len(), 2, "transpose only works for 2D tensors");
        let (m, n) = (self.shape[0], self.shape[1]);
        let mut data = vec![0.0; m * n];
        for i in 0..m {
            for j in 0..n {
                data[j * m + i] = self.data[i * n + j];
            }
        }
        Self { data, shape: vec![n, m] }
    }

    pub fn matmul(&self, other: &Tensor) -> Tensor {
        assert_eq!(self.shape.len(), 2, "self must be a 2D tensor.");
        assert_eq!(other.shape.len(), 2, "other must be a 2D tensor.");
        assert_eq!(self.shape[1], other.shape[0], "self columns must equal other rows");

        let m = self.shape[0];
        let k = self.shape[1];
        let n = other.shape[1];

        let mut c = Tensor::zeros(vec![m, n]);
        if n == 0 {
            return c;
        }

        let a_data = &self.data;
        let b_data = &other.data;

        c.data.par_chunks_mut(n).enumerate().for_each(|(m_idx, c_row)| {
            for k_idx in 0..k {
                let a_val = a_data[m_idx * k + k_idx];
                let b_row = &b_data[k_idx * n..(k_idx + 1) * n];
                for (c_val, b_val) in c_row.iter_mut().zip(b_row) {
                    *c_val += a_val * b_val;
                }
            }
        });

        c
    }

    pub fn sum(&self, axis: usize) -> Tensor {
        assert_eq!(self.shape.len(), 2, "sum only works for 2D tensors");

        let m = self.shape[0];
        let n = self.shape[1];

        match axis {
            0 => {
                let column_sums = self.data.par_chunks(n.max(1)).map(|row| row.to_vec()).reduce(
                    || vec![0.0; n],
                    |mut acc, row| {
                        for (a, r) in acc.iter_mut().zip(row) {
                            *a += r;
                        }
                        acc
                    }
                );
                Tensor::from_vec(column_sums, vec![1, n])
            }
            1 => {
                let row_sums: Vec<f32> = self.data.par_chunks(n.max(1)).map(|row| row.iter().sum()).collect();
                Tensor::from_vec(row_sums, vec![m, 1])
            }
            _ => panic!("axis must be 0 or 1")
        }
    }

    pub fn map<F>(&self, f: F) -> Tensor
    where F: Fn(f32) -> f32 + Sync + Send {
        let data: Vec<f32> = self.data.par_iter().map(|&x| f(x)).collect();
        Tensor::from_vec(data, self.shape.clone())
    }

    // map through self allowing access to second tensor
    pub fn map2<F>(&self, other: &Tensor, f: F) -> Tensor
    where F: Fn(f32, f32) -> f32 + Sync + Send {
        assert_eq!(self.shape, other.shape, "tensors must have the same shape");

        let data: Vec<f32> = self.data.par_iter().zip(other.data.par_iter()).map(|(&x1, &x2)| f(x1, x2)).collect();
        Tensor::from_vec(data, self.shape.clone())
    }

    // largest value of every row, shape [rows, 1]
    pub fn max_rows(&self) -> Tensor {
        assert_eq!(self.shape.len(), 2, "max_rows only works for 2D tensors");
        let maxes: Vec<f32> = (0..self.rows())
            .map(|i| self.row(i).iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b)))
            .collect();
        Tensor::from_vec(maxes, vec![self.rows(), 1])
    }
}

/// Index of the largest value; the first one wins on ties.
pub fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}
