// src/aproar/ntm/controller.rs ~=#######D]======A===r===c====M===o===o===n=====<Lord[NTM]Xyn>=====S===t===u===d===i===o===s======[R|$>
// src/aproar/ntm/controller.rs
use super::*;
use crate::constants::{LSTM_STATE_BIAS_STD, LSTM_WEIGHT_SCALE};
use ndarray::stack;
use ndarray_rand::rand_distr::{Normal, Uniform};
use ndarray_rand::RandomExt;

/// Recurrent unit driving the heads: maps an input batch and its own state to
/// an output batch and a new state.
pub trait Controller: Parameterized {
    type State: Clone + std::fmt::Debug + PartialEq;

    /// `(input width, output width)`
    fn size(&self) -> (usize, usize);

    fn create_new_state(&self, batch_size: usize) -> Self::State;

    /// Rejects a state that `forward` could not consume for `batch_size` rows.
    fn check_state(&self, state: &Self::State, batch_size: usize) -> Result<()>;

    fn forward(&self, input: ArrayView2<f32>, prev_state: &Self::State) -> Result<(Array2<f32>, Self::State)>;
}

/// Hidden and cell state of every layer, each `layers x batch x hidden`.
#[derive(Debug, Clone, PartialEq)]
pub struct LSTMState {
    pub h: Array3<f32>,
    pub c: Array3<f32>,
}

/// One LSTM layer, gate order `[input, forget, cell, output]`.
#[derive(Debug, Clone)]
struct LSTM {
    weight_ih: Array2<f32>,
    weight_hh: Array2<f32>,
    bias_ih: Array1<f32>,
    bias_hh: Array1<f32>,
    hidden_size: usize,
}

impl LSTM {
    fn new<R: Rng + ?Sized>(input_size: usize, hidden_size: usize, stdev: f32, rng: &mut R) -> Self {
        let dist = Uniform::new_inclusive(-stdev, stdev);
        LSTM {
            weight_ih: Array2::random_using((4 * hidden_size, input_size), dist, rng),
            weight_hh: Array2::random_using((4 * hidden_size, hidden_size), dist, rng),
            bias_ih: Array1::zeros(4 * hidden_size),
            bias_hh: Array1::zeros(4 * hidden_size),
            hidden_size,
        }
    }

    fn forward(&self, input: ArrayView2<f32>, h: ArrayView2<f32>, c: ArrayView2<f32>) -> (Array2<f32>, Array2<f32>) {
        let gates = input.dot(&self.weight_ih.t()) + &self.bias_ih + h.dot(&self.weight_hh.t()) + &self.bias_hh;
        let hs = self.hidden_size;

        let i = gates.slice(s![.., ..hs]).mapv(sigmoid);
        let f = gates.slice(s![.., hs..2 * hs]).mapv(sigmoid);
        let g = gates.slice(s![.., 2 * hs..3 * hs]).mapv(f32::tanh);
        let o = gates.slice(s![.., 3 * hs..]).mapv(sigmoid);

        let c_next = &f * &c + &i * &g;
        let h_next = &o * &c_next.mapv(f32::tanh);

        (h_next, c_next)
    }
}

/// Stacked LSTM with learned initial hidden and cell state.
#[derive(Debug, Clone)]
pub struct LSTMController {
    layers: Vec<LSTM>,
    h_bias: Array2<f32>,
    c_bias: Array2<f32>,
    num_inputs: usize,
    num_outputs: usize,
}

impl LSTMController {
    pub fn new<R: Rng + ?Sized>(num_inputs: usize, num_outputs: usize, num_layers: usize, rng: &mut R) -> Result<Self> {
        if num_inputs == 0 || num_outputs == 0 || num_layers == 0 {
            return Err(NTMError::InvalidConfig(format!(
                "controller needs positive sizes, got inputs={} outputs={} layers={}",
                num_inputs, num_outputs, num_layers
            )));
        }
        let stdev = LSTM_WEIGHT_SCALE / ((num_inputs + num_outputs) as f32).sqrt();
        let layers = (0..num_layers)
            .map(|l| {
                let input_size = if l == 0 { num_inputs } else { num_outputs };
                LSTM::new(input_size, num_outputs, stdev, rng)
            })
            .collect();

        let state_dist = Normal::new(0.0, LSTM_STATE_BIAS_STD)
            .map_err(|e| NTMError::InvalidArgument(format!("state bias distribution: {}", e)))?;
        Ok(LSTMController {
            layers,
            h_bias: Array2::random_using((num_layers, num_outputs), state_dist, rng),
            c_bias: Array2::random_using((num_layers, num_outputs), state_dist, rng),
            num_inputs,
            num_outputs,
        })
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }
}

impl Controller for LSTMController {
    type State = LSTMState;

    fn size(&self) -> (usize, usize) {
        (self.num_inputs, self.num_outputs)
    }

    fn create_new_state(&self, batch_size: usize) -> LSTMState {
        let shape = (self.num_layers(), batch_size, self.num_outputs);
        let repeat = |bias: &Array2<f32>| {
            Array3::from_shape_fn(shape, |(l, _, j)| bias[[l, j]])
        };
        LSTMState { h: repeat(&self.h_bias), c: repeat(&self.c_bias) }
    }

    fn check_state(&self, state: &LSTMState, batch_size: usize) -> Result<()> {
        let expected = [self.num_layers(), batch_size, self.num_outputs];
        if state.h.shape() != &expected[..] {
            return Err(NTMError::shape(&expected, state.h.shape()));
        }
        if state.c.shape() != &expected[..] {
            return Err(NTMError::shape(&expected, state.c.shape()));
        }
        Ok(())
    }

    fn forward(&self, input: ArrayView2<f32>, prev_state: &LSTMState) -> Result<(Array2<f32>, LSTMState)> {
        if input.ncols() != self.num_inputs {
            return Err(NTMError::shape(&[input.nrows(), self.num_inputs], input.shape()));
        }
        self.check_state(prev_state, input.nrows())?;

        let mut hs = Vec::with_capacity(self.num_layers());
        let mut cs = Vec::with_capacity(self.num_layers());
        let mut x = input.to_owned();
        for (l, layer) in self.layers.iter().enumerate() {
            let (h, c) = layer.forward(
                x.view(),
                prev_state.h.index_axis(Axis(0), l),
                prev_state.c.index_axis(Axis(0), l),
            );
            x = h.clone();
            hs.push(h);
            cs.push(c);
        }

        let stack_layers = |layers: &[Array2<f32>]| {
            let views: Vec<_> = layers.iter().map(|a| a.view()).collect();
            stack(Axis(0), &views).map_err(|e| NTMError::ComputationError(format!("stacking LSTM state: {}", e)))
        };
        let state = LSTMState { h: stack_layers(&hs)?, c: stack_layers(&cs)? };
        Ok((x, state))
    }
}

impl Parameterized for LSTMController {
    fn parameters(&self) -> Vec<NamedParameter<'_>> {
        let mut params = Vec::new();
        for (l, layer) in self.layers.iter().enumerate() {
            params.push((format!("lstm.weight_ih_l{}", l), layer.weight_ih.view().into_dyn()));
            params.push((format!("lstm.weight_hh_l{}", l), layer.weight_hh.view().into_dyn()));
            params.push((format!("lstm.bias_ih_l{}", l), layer.bias_ih.view().into_dyn()));
            params.push((format!("lstm.bias_hh_l{}", l), layer.bias_hh.view().into_dyn()));
        }
        params.push(("lstm_h_bias".to_string(), self.h_bias.view().into_dyn()));
        params.push(("lstm_c_bias".to_string(), self.c_bias.view().into_dyn()));
        params
    }

    fn parameters_mut(&mut self) -> Vec<NamedParameterMut<'_>> {
        let mut params = Vec::new();
        for (l, layer) in self.layers.iter_mut().enumerate() {
            params.push((format!("lstm.weight_ih_l{}", l), layer.weight_ih.view_mut().into_dyn()));
            params.push((format!("lstm.weight_hh_l{}", l), layer.weight_hh.view_mut().into_dyn()));
            params.push((format!("lstm.bias_ih_l{}", l), layer.bias_ih.view_mut().into_dyn()));
            params.push((format!("lstm.bias_hh_l{}", l), layer.bias_hh.view_mut().into_dyn()));
        }
        params.push(("lstm_h_bias".to_string(), self.h_bias.view_mut().into_dyn()));
        params.push(("lstm_c_bias".to_string(), self.c_bias.view_mut().into_dyn()));
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray_rand::rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_lstm_controller_shapes() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(11);
        let controller = LSTMController::new(10, 20, 2, &mut rng)?;
        let state = controller.create_new_state(3);
        assert_eq!(state.h.dim(), (2, 3, 20));

        let input = Array2::random_using((3, 10), Uniform::new(0., 1.), &mut rng);
        let (output, next) = controller.forward(input.view(), &state)?;

        assert_eq!(output.dim(), (3, 20));
        assert!(output.iter().all(|&x| (-1.0..=1.0).contains(&x)));
        assert_eq!(next.h.index_axis(Axis(0), 1), output.view());
        assert_ne!(next, state);
        Ok(())
    }

    #[test]
    fn test_initial_state_broadcasts_bias() {
        let mut rng = StdRng::seed_from_u64(11);
        let controller = LSTMController::new(4, 5, 1, &mut rng).unwrap();
        let state = controller.create_new_state(2);
        assert_eq!(state.h.index_axis(Axis(1), 0), state.h.index_axis(Axis(1), 1));
        assert_eq!(state.c.index_axis(Axis(1), 0), controller.c_bias.view());
    }

    #[test]
    fn test_parameter_count_matches_layout() {
        let mut rng = StdRng::seed_from_u64(11);
        let controller = LSTMController::new(7, 6, 2, &mut rng).unwrap();
        let layer0 = 4 * 6 * 7 + 4 * 6 * 6 + 2 * 4 * 6;
        let layer1 = 4 * 6 * 6 + 4 * 6 * 6 + 2 * 4 * 6;
        assert_eq!(controller.num_parameters(), layer0 + layer1 + 2 * 2 * 6);
    }

    #[test]
    fn test_rejects_wrong_input_width() {
        let mut rng = StdRng::seed_from_u64(11);
        let controller = LSTMController::new(4, 5, 1, &mut rng).unwrap();
        let state = controller.create_new_state(1);
        assert!(controller.forward(Array2::zeros((1, 3)).view(), &state).is_err());
    }

    #[test]
    fn test_check_state_rejects_wrong_batch() {
        let mut rng = StdRng::seed_from_u64(11);
        let controller = LSTMController::new(4, 5, 2, &mut rng).unwrap();
        let state = controller.create_new_state(3);
        assert!(controller.check_state(&state, 3).is_ok());
        assert!(matches!(controller.check_state(&state, 2), Err(NTMError::ShapeMismatch { .. })));
    }
}
