// src/aproar/ntm/encapsulated.rs ~=#######D]======A===r===c====M===o===o===n=====<Lord[NTM]Xyn>=====S===t===u===d===i===o===s======[R|$>

use super::*;
use ndarray::ArrayView3;
use ndarray_rand::rand::{rngs::StdRng, SeedableRng};
use tracing::{debug, info, warn};

/// Memory, LSTM controller and `num_heads` read/write pairs behind the
/// `init_sequence` / `step` lifecycle.
pub struct EncapsulatedNTM {
    config: NTMConfig,
    memory: NTMMemory,
    ntm: NTM<LSTMController>,
    state: Option<NTMState<LSTMState>>,
}

impl EncapsulatedNTM {
    pub fn new(config: NTMConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let m = config.memory_vector_size;

        let memory = NTMMemory::new(config.memory_size, m, config.device, &mut rng)?;
        let controller = LSTMController::new(
            config.num_inputs + m * config.num_heads,
            config.controller_size,
            config.controller_layers,
            &mut rng,
        )?;

        let mut heads = Vec::with_capacity(2 * config.num_heads);
        for _ in 0..config.num_heads {
            heads.push(Head::Read(ReadHead::new(&memory, config.controller_size, config.shift_radius, &mut rng)?));
            heads.push(Head::Write(WriteHead::new(&memory, config.controller_size, config.shift_radius, &mut rng)?));
        }

        let ntm = NTM::new(
            config.num_inputs,
            config.num_outputs,
            controller,
            &memory,
            heads,
            config.output_activation,
            config.write_visibility,
            &mut rng,
        )?;

        let encapsulated = EncapsulatedNTM { config, memory, ntm, state: None };
        info!(
            num_inputs = encapsulated.config.num_inputs,
            num_outputs = encapsulated.config.num_outputs,
            controller_size = encapsulated.config.controller_size,
            controller_layers = encapsulated.config.controller_layers,
            num_heads = encapsulated.config.num_heads,
            n = encapsulated.config.memory_size,
            m = encapsulated.config.memory_vector_size,
            device = ?encapsulated.config.device,
            parameters = encapsulated.parameter_count(),
            "created EncapsulatedNTM"
        );
        Ok(encapsulated)
    }

    pub fn config(&self) -> &NTMConfig {
        &self.config
    }

    pub fn memory(&self) -> &NTMMemory {
        &self.memory
    }

    pub fn ntm(&self) -> &NTM<LSTMController> {
        &self.ntm
    }

    pub fn state(&self) -> Option<&NTMState<LSTMState>> {
        self.state.as_ref()
    }

    pub fn batch_size(&self) -> Option<usize> {
        self.state.as_ref().map(|s| s.memory.batch_size())
    }

    /// Resets memory and every piece of recurrent state. Required before the
    /// first step of each sequence.
    pub fn init_sequence(&mut self, batch_size: usize) -> Result<()> {
        let state = self.ntm.create_new_state(&self.memory, batch_size)?;
        self.state = Some(state);
        info!(batch_size, "sequence initialised");
        Ok(())
    }

    /// Advances one step. `None` feeds a zero input of the configured width.
    ///
    /// Shape errors leave the current state in place. A numerical failure
    /// inside the step ends the sequence; `init_sequence` starts a new one.
    pub fn step(&mut self, input: Option<ArrayView2<f32>>) -> Result<(Array2<f32>, &NTMState<LSTMState>)> {
        let prev = self
            .state
            .as_ref()
            .ok_or_else(|| NTMError::NotInitialized("call init_sequence before step".to_string()))?;

        let zeros;
        let x = match input {
            Some(x) => x.reborrow(),
            None => {
                zeros = Array2::zeros((prev.memory.batch_size(), self.config.num_inputs));
                zeros.view()
            }
        };
        self.ntm.check_step(x, prev)?;

        let prev = self
            .state
            .take()
            .ok_or_else(|| NTMError::NotInitialized("call init_sequence before step".to_string()))?;
        match self.ntm.step(x, prev) {
            Ok((output, next)) => {
                debug!(batch_size = next.memory.batch_size(), "step");
                let state = self.state.insert(next);
                Ok((output, &*state))
            }
            Err(e) => {
                warn!(error = %e, "step failed, sequence must be re-initialised");
                Err(e)
            }
        }
    }

    /// Runs `inputs` (`time x batch x num_inputs`) through consecutive steps of
    /// the current sequence and stacks the outputs.
    pub fn run_sequence(&mut self, inputs: ArrayView3<f32>) -> Result<Array3<f32>> {
        let batch_size = self
            .batch_size()
            .ok_or_else(|| NTMError::NotInitialized("call init_sequence before run_sequence".to_string()))?;
        let (steps, batch, width) = inputs.dim();
        if batch != batch_size || width != self.config.num_inputs {
            return Err(NTMError::shape(&[steps, batch_size, self.config.num_inputs], inputs.shape()));
        }

        let mut outputs = Array3::zeros((steps, batch_size, self.config.num_outputs));
        for (t, x) in inputs.outer_iter().enumerate() {
            let (output, _) = self.step(Some(x))?;
            outputs.index_axis_mut(Axis(0), t).assign(&output);
        }
        Ok(outputs)
    }

    pub fn parameter_count(&self) -> usize {
        self.num_parameters()
    }
}

impl Parameterized for EncapsulatedNTM {
    fn parameters(&self) -> Vec<NamedParameter<'_>> {
        let mut params = prefixed("memory", self.memory.parameters());
        params.extend(prefixed("ntm", self.ntm.parameters()));
        params
    }

    fn parameters_mut(&mut self) -> Vec<NamedParameterMut<'_>> {
        let mut params = prefixed("memory", self.memory.parameters_mut());
        params.extend(prefixed("ntm", self.ntm.parameters_mut()));
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> NTMConfig {
        NTMConfig { seed: 5, ..NTMConfig::new(3, 2, 12, 1, 1, 8, 4) }
    }

    #[test]
    fn test_step_before_init_fails() {
        let mut ntm = EncapsulatedNTM::new(small_config()).unwrap();
        assert!(matches!(ntm.step(None), Err(NTMError::NotInitialized(_))));
    }

    #[test]
    fn test_zero_input_substitution() {
        let mut a = EncapsulatedNTM::new(small_config()).unwrap();
        let mut b = EncapsulatedNTM::new(small_config()).unwrap();
        a.init_sequence(2).unwrap();
        b.init_sequence(2).unwrap();
        let (out_a, _) = a.step(None).unwrap();
        let zeros = Array2::zeros((2, 3));
        let (out_b, _) = b.step(Some(zeros.view())).unwrap();
        assert_eq!(out_a, out_b);
    }

    #[test]
    fn test_failed_step_keeps_state() {
        let mut ntm = EncapsulatedNTM::new(small_config()).unwrap();
        ntm.init_sequence(1).unwrap();
        let before = ntm.state().cloned();
        let wrong = Array2::zeros((1, 5));
        assert!(matches!(ntm.step(Some(wrong.view())), Err(NTMError::ShapeMismatch { .. })));
        assert_eq!(ntm.state().cloned(), before);
    }

    #[test]
    fn test_parameter_names_are_unique() {
        let ntm = EncapsulatedNTM::new(small_config()).unwrap();
        let mut names: Vec<_> = ntm.parameters().into_iter().map(|(name, _)| name).collect();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
        assert!(names.iter().any(|n| n == "memory.bias"));
        assert!(names.iter().any(|n| n == "ntm.heads.1.fc_write.weight"));
    }
}
