// src/aproar/ntm/addressing.rs ~=#######D]======A===r===c====M===o===o===n=====<Lord[NTM]Xyn>=====S===t===u===d===i===o===s======[R|$>
use super::*;
use crate::constants::SHARPEN_EPSILON;
use ndarray_stats::QuantileExt;
use tracing::trace;

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// `ln(1 + e^x)` without overflow for large `x`.
pub fn softplus(x: f32) -> f32 {
    x.max(0.0) + (-x.abs()).exp().ln_1p()
}

/// Row-wise max-subtracted softmax.
pub fn softmax_rows(x: ArrayView2<f32>) -> Result<Array2<f32>> {
    let mut out = x.to_owned();
    for mut row in out.outer_iter_mut() {
        let max = *row.max()?;
        row.mapv_inplace(|a| (a - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|a| a / sum);
    }
    Ok(out)
}

/// Activated control parameters of one head for one step, batched.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadParams {
    /// `batch x M`
    pub key: Array2<f32>,
    /// key strength, `>= 0`
    pub beta: Array1<f32>,
    /// interpolation gate in `[0, 1]`
    pub gate: Array1<f32>,
    /// `batch x (2r + 1)`, rows sum to 1; column `j` weighs offset `j - r`
    pub shift: Array2<f32>,
    /// sharpening exponent, `>= 1`
    pub gamma: Array1<f32>,
}

impl HeadParams {
    /// Column layout of the raw block: `[key(M), beta, g, shift(2r+1), gamma]`.
    pub fn raw_width(memory_vector_size: usize, shift_width: usize) -> usize {
        memory_vector_size + shift_width + 3
    }

    pub fn activate(raw: ArrayView2<f32>, memory_vector_size: usize, shift_width: usize) -> Result<Self> {
        let width = Self::raw_width(memory_vector_size, shift_width);
        if raw.ncols() != width {
            return Err(NTMError::shape(&[raw.nrows(), width], raw.shape()));
        }
        let m = memory_vector_size;
        let shift_start = m + 2;
        let shift_end = shift_start + shift_width;

        Ok(HeadParams {
            key: raw.slice(s![.., ..m]).to_owned(),
            beta: raw.column(m).mapv(softplus),
            gate: raw.column(m + 1).mapv(sigmoid),
            shift: softmax_rows(raw.slice(s![.., shift_start..shift_end]))?,
            gamma: raw.column(shift_end).mapv(|x| 1.0 + softplus(x)),
        })
    }

    pub fn batch_size(&self) -> usize {
        self.key.nrows()
    }
}

/// Content + location addressing shared by read and write heads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressingMechanism {
    memory_size: usize,
    key_size: usize,
    shift_radius: usize,
}

impl AddressingMechanism {
    pub fn new(memory_size: usize, key_size: usize, shift_radius: usize) -> Result<Self> {
        if memory_size == 0 || key_size == 0 {
            return Err(NTMError::InvalidConfig(format!(
                "addressing needs positive memory shape, got N={} M={}",
                memory_size, key_size
            )));
        }
        if 2 * shift_radius + 1 > memory_size {
            return Err(NTMError::InvalidConfig(format!(
                "shift radius {} is too wide for {} memory rows",
                shift_radius, memory_size
            )));
        }
        Ok(AddressingMechanism { memory_size, key_size, shift_radius })
    }

    pub fn memory_size(&self) -> usize {
        self.memory_size
    }

    pub fn shift_width(&self) -> usize {
        2 * self.shift_radius + 1
    }

    /// Full pipeline: content, interpolate, shift, sharpen. Each stage feeds the next.
    pub fn address(&self, params: &HeadParams, w_prev: ArrayView2<f32>, memory: &MemoryBank) -> Result<Array2<f32>> {
        let w_c = self.content_addressing(params.key.view(), params.beta.view(), memory)?;
        let w_g = self.interpolate(w_prev, w_c.view(), params.gate.view())?;
        let w_s = self.shift(w_g.view(), params.shift.view())?;
        self.sharpen(w_s.view(), params.gamma.view())
    }

    pub fn content_addressing(&self, key: ArrayView2<f32>, beta: ArrayView1<f32>, memory: &MemoryBank) -> Result<Array2<f32>> {
        if key.ncols() != self.key_size {
            return Err(NTMError::shape(&[key.nrows(), self.key_size], key.shape()));
        }
        if beta.len() != key.nrows() {
            return Err(NTMError::shape(&[key.nrows()], &[beta.len()]));
        }
        let mut scaled = memory.content_similarity(key)?;
        for (mut row, &b) in scaled.outer_iter_mut().zip(beta.iter()) {
            row *= b;
        }
        softmax_rows(scaled.view())
    }

    pub fn interpolate(&self, w_prev: ArrayView2<f32>, w_c: ArrayView2<f32>, gate: ArrayView1<f32>) -> Result<Array2<f32>> {
        if w_prev.dim() != w_c.dim() || w_c.ncols() != self.memory_size {
            return Err(NTMError::ShapeMismatch {
                expected: vec![w_c.nrows(), self.memory_size],
                actual: w_prev.shape().to_vec(),
            });
        }
        if gate.len() != w_c.nrows() {
            return Err(NTMError::shape(&[w_c.nrows()], &[gate.len()]));
        }
        let g = gate.insert_axis(Axis(1));
        Ok(&w_c * &g + &w_prev * &g.mapv(|x| 1.0 - x))
    }

    /// Circular convolution: `w_s[i] = sum_j w[(i - (j - r)) mod N] * s[j]`,
    /// so weight on offset `+1` moves focus from row `i` to row `i + 1`.
    pub fn shift(&self, w: ArrayView2<f32>, s: ArrayView2<f32>) -> Result<Array2<f32>> {
        if w.ncols() != self.memory_size || s.ncols() != self.shift_width() || s.nrows() != w.nrows() {
            return Err(NTMError::ShapeMismatch {
                expected: vec![w.nrows(), self.memory_size, w.nrows(), self.shift_width()],
                actual: vec![w.nrows(), w.ncols(), s.nrows(), s.ncols()],
            });
        }
        let n = self.memory_size as isize;
        let r = self.shift_radius as isize;
        let mut w_shifted = Array2::zeros(w.raw_dim());
        for ((mut out, w_row), s_row) in w_shifted.outer_iter_mut().zip(w.outer_iter()).zip(s.outer_iter()) {
            for i in 0..n {
                let mut acc = 0.0;
                for (j, &weight) in s_row.iter().enumerate() {
                    let offset = j as isize - r;
                    acc += w_row[(i - offset).rem_euclid(n) as usize] * weight;
                }
                out[i as usize] = acc;
            }
        }
        Ok(w_shifted)
    }

    pub fn sharpen(&self, w: ArrayView2<f32>, gamma: ArrayView1<f32>) -> Result<Array2<f32>> {
        if gamma.len() != w.nrows() {
            return Err(NTMError::shape(&[w.nrows()], &[gamma.len()]));
        }
        let mut out = w.to_owned();
        for (mut row, &g) in out.outer_iter_mut().zip(gamma.iter()) {
            // Peak-normalised before the power; the largest entry stays 1.
            let peak = row.iter().cloned().fold(0.0f32, f32::max);
            if peak > 0.0 {
                row.mapv_inplace(|x| (x / peak).powf(g));
            } else {
                row.mapv_inplace(|x| x.powf(g));
            }
            let sum = row.sum();
            if sum < SHARPEN_EPSILON {
                trace!(sum, "degenerate attention row before sharpening");
            }
            row.mapv_inplace(|x| x / (sum + SHARPEN_EPSILON));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn unit(n: usize) -> AddressingMechanism {
        AddressingMechanism::new(n, 2, 1).unwrap()
    }

    #[test]
    fn test_softplus_is_stable() {
        assert_abs_diff_eq!(softplus(0.0), 2.0f32.ln(), epsilon = 1e-6);
        assert_abs_diff_eq!(softplus(100.0), 100.0, epsilon = 1e-3);
        assert!(softplus(-100.0) >= 0.0);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let p = softmax_rows(array![[1.0, 2.0, 3.0], [1000.0, 1000.0, 1000.0]].view()).unwrap();
        for row in p.outer_iter() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-6);
        }
        assert_abs_diff_eq!(p.row(1), array![1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0].view(), epsilon = 1e-6);
    }

    #[test]
    fn test_softmax_rejects_nan() {
        let err = softmax_rows(array![[1.0, f32::NAN]].view()).unwrap_err();
        assert!(matches!(err, NTMError::ComputationError(_)));
    }

    #[test]
    fn test_activation_ranges() {
        let raw = array![[0.3, -0.2, -5.0, 5.0, 0.0, 1.0, -1.0, -3.0]];
        let params = HeadParams::activate(raw.view(), 2, 3).unwrap();
        assert_eq!(params.key, array![[0.3, -0.2]]);
        assert!(params.beta[0] >= 0.0);
        assert!(params.gate[0] > 0.99 && params.gate[0] <= 1.0);
        assert_abs_diff_eq!(params.shift.row(0).sum(), 1.0, epsilon = 1e-6);
        assert!(params.gamma[0] >= 1.0);
    }

    #[test]
    fn test_activate_rejects_wrong_width() {
        assert!(HeadParams::activate(Array2::zeros((1, 7)).view(), 2, 3).is_err());
    }

    #[test]
    fn test_interpolation_blends() {
        let w_prev = array![[1.0, 0.0, 0.0]];
        let w_c = array![[0.0, 0.0, 1.0]];
        let w_g = unit(3).interpolate(w_prev.view(), w_c.view(), array![0.25].view()).unwrap();
        assert_abs_diff_eq!(w_g, array![[0.75, 0.0, 0.25]], epsilon = 1e-6);
    }

    #[test]
    fn test_shift_right_wraps_around() {
        let unit = unit(4);
        let s = array![[0.0, 0.0, 1.0]];
        let w = array![[0.0, 0.0, 0.0, 1.0]];
        assert_eq!(unit.shift(w.view(), s.view()).unwrap(), array![[1.0, 0.0, 0.0, 0.0]]);
        let s_left = array![[1.0, 0.0, 0.0]];
        let w = array![[1.0, 0.0, 0.0, 0.0]];
        assert_eq!(unit.shift(w.view(), s_left.view()).unwrap(), array![[0.0, 0.0, 0.0, 1.0]]);
    }

    #[test]
    fn test_shift_preserves_mass() {
        let w = array![[0.1, 0.2, 0.3, 0.4]];
        let s = array![[0.2, 0.5, 0.3]];
        let out = unit(4).shift(w.view(), s.view()).unwrap();
        assert_abs_diff_eq!(out.sum(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_sharpen_degenerate_row_is_guarded() {
        let out = unit(3).sharpen(array![[0.0, 0.0, 0.0]].view(), array![2.0].view()).unwrap();
        assert!(out.iter().all(|x| x.is_finite() && *x == 0.0));
    }

    #[test]
    fn test_gamma_one_is_identity_on_distribution() {
        let w = array![[0.2, 0.3, 0.5]];
        let out = unit(3).sharpen(w.view(), array![1.0].view()).unwrap();
        assert_abs_diff_eq!(out, w, epsilon = 1e-6);
    }

    #[test]
    fn test_rejects_oversized_shift_window() {
        assert!(AddressingMechanism::new(2, 2, 1).is_err());
        assert!(AddressingMechanism::new(5, 2, 2).is_ok());
    }
}
