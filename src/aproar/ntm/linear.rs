// src/aproar/ntm/linear.rs ~=#######D]======A===r===c====M===o===o===n=====<Lord[NTM]Xyn>=====S===t===u===d===i===o===s======[R|$>

use super::*;
use ndarray_rand::rand_distr::{Normal, Uniform};
use ndarray_rand::RandomExt;

/// Affine map `y = x W^T + b` applied row-wise to a batch.
#[derive(Debug, Clone)]
pub struct Linear {
    weight: Array2<f32>,
    bias: Array1<f32>,
}

impl Linear {
    /// Xavier-uniform weights scaled by `gain`, bias drawn from N(0, `bias_std`).
    pub fn xavier<R: Rng + ?Sized>(
        in_features: usize,
        out_features: usize,
        gain: f32,
        bias_std: f32,
        rng: &mut R,
    ) -> Result<Self> {
        let bound = gain * (6.0 / (in_features + out_features) as f32).sqrt();
        let bias_dist = Normal::new(0.0, bias_std)
            .map_err(|e| NTMError::InvalidArgument(format!("bias distribution: {}", e)))?;
        Ok(Linear {
            weight: Array2::random_using((out_features, in_features), Uniform::new_inclusive(-bound, bound), rng),
            bias: Array1::random_using(out_features, bias_dist, rng),
        })
    }

    pub fn from_parts(weight: Array2<f32>, bias: Array1<f32>) -> Result<Self> {
        if weight.nrows() != bias.len() {
            return Err(NTMError::shape(&[weight.nrows()], &[bias.len()]));
        }
        Ok(Linear { weight, bias })
    }

    pub fn in_features(&self) -> usize {
        self.weight.ncols()
    }

    pub fn out_features(&self) -> usize {
        self.weight.nrows()
    }

    pub fn forward(&self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.in_features() {
            return Err(NTMError::shape(&[x.nrows(), self.in_features()], x.shape()));
        }
        Ok(x.dot(&self.weight.t()) + &self.bias)
    }
}

impl Parameterized for Linear {
    fn parameters(&self) -> Vec<NamedParameter<'_>> {
        vec![
            ("weight".to_string(), self.weight.view().into_dyn()),
            ("bias".to_string(), self.bias.view().into_dyn()),
        ]
    }

    fn parameters_mut(&mut self) -> Vec<NamedParameterMut<'_>> {
        vec![
            ("weight".to_string(), self.weight.view_mut().into_dyn()),
            ("bias".to_string(), self.bias.view_mut().into_dyn()),
        ]
    }
}
