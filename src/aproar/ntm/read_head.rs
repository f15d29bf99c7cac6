// src/aproar/ntm/read_head.rs ~=#######D]======A===r===c====M===o===o===n=====<Lord[NTM]Xyn>=====S===t===u===d===i===o===s======[R|$>

use super::*;
use crate::constants::{HEAD_XAVIER_GAIN, LINEAR_BIAS_STD};

pub struct ReadHead {
    addressing: AddressingMechanism,
    projection: Linear,
    key_size: usize,
}

impl ReadHead {
    pub fn new<R: Rng + ?Sized>(
        memory: &NTMMemory,
        controller_size: usize,
        shift_radius: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let (memory_size, key_size) = memory.size();
        let addressing = AddressingMechanism::new(memory_size, key_size, shift_radius)?;
        let width = HeadParams::raw_width(key_size, addressing.shift_width());
        Ok(ReadHead {
            addressing,
            projection: Linear::xavier(controller_size, width, HEAD_XAVIER_GAIN, LINEAR_BIAS_STD, rng)?,
            key_size,
        })
    }

    /// Columns of the controller-output projection this head consumes.
    pub fn param_width(&self) -> usize {
        self.projection.out_features()
    }

    pub fn controller_size(&self) -> usize {
        self.projection.in_features()
    }

    pub fn create_new_state(&self, batch_size: usize) -> Array2<f32> {
        Array2::zeros((batch_size, self.addressing.memory_size()))
    }

    pub fn get_params(&self, controller_output: ArrayView2<f32>) -> Result<HeadParams> {
        let raw = self.projection.forward(controller_output)?;
        HeadParams::activate(raw.view(), self.key_size, self.addressing.shift_width())
    }

    pub fn get_weights(&self, controller_output: ArrayView2<f32>, prev_weights: ArrayView2<f32>, memory: &MemoryBank) -> Result<Array2<f32>> {
        let params = self.get_params(controller_output)?;
        self.addressing.address(&params, prev_weights, memory)
    }

    /// Returns the read vector and the new attention.
    pub fn forward(&self, controller_output: ArrayView2<f32>, prev_weights: ArrayView2<f32>, memory: &MemoryBank) -> Result<(Array2<f32>, Array2<f32>)> {
        let weights = self.get_weights(controller_output, prev_weights, memory)?;
        let read = memory.read(weights.view())?;
        Ok((read, weights))
    }
}

impl Parameterized for ReadHead {
    fn parameters(&self) -> Vec<NamedParameter<'_>> {
        prefixed("fc_read", self.projection.parameters())
    }

    fn parameters_mut(&mut self) -> Vec<NamedParameterMut<'_>> {
        prefixed("fc_read", self.projection.parameters_mut())
    }
}
