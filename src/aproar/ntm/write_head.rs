// src/aproar/ntm/write_head.rs ~=#######D]======A===r===c====M===o===o===n=====<Lord[NTM]Xyn>=====S===t===u===d===i===o===s======[R|$>
use super::*;
use crate::constants::{HEAD_XAVIER_GAIN, LINEAR_BIAS_STD};

/// Addressing parameters plus the erase (`sigmoid`) and add (raw) vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteParams {
    pub addressing: HeadParams,
    pub erase: Array2<f32>,
    pub add: Array2<f32>,
}

pub struct WriteHead {
    addressing: AddressingMechanism,
    projection: Linear,
    key_size: usize,
    memory_vector_size: usize,
}

impl WriteHead {
    pub fn new<R: Rng + ?Sized>(
        memory: &NTMMemory,
        controller_size: usize,
        shift_radius: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let (memory_size, memory_vector_size) = memory.size();
        let addressing = AddressingMechanism::new(memory_size, memory_vector_size, shift_radius)?;
        let width = HeadParams::raw_width(memory_vector_size, addressing.shift_width()) + 2 * memory_vector_size;
        Ok(WriteHead {
            addressing,
            projection: Linear::xavier(controller_size, width, HEAD_XAVIER_GAIN, LINEAR_BIAS_STD, rng)?,
            key_size: memory_vector_size,
            memory_vector_size,
        })
    }

    pub fn param_width(&self) -> usize {
        self.projection.out_features()
    }

    pub fn controller_size(&self) -> usize {
        self.projection.in_features()
    }

    pub fn create_new_state(&self, batch_size: usize) -> Array2<f32> {
        Array2::zeros((batch_size, self.addressing.memory_size()))
    }

    /// Raw layout: `[key(M), beta, g, shift(2r+1), gamma, erase(M), add(M)]`.
    pub fn get_params(&self, controller_output: ArrayView2<f32>) -> Result<WriteParams> {
        let raw = self.projection.forward(controller_output)?;
        let start = HeadParams::raw_width(self.key_size, self.addressing.shift_width());
        let end = start + self.memory_vector_size;
        if raw.ncols() != end + self.memory_vector_size {
            return Err(NTMError::shape(&[raw.nrows(), end + self.memory_vector_size], raw.shape()));
        }
        Ok(WriteParams {
            addressing: HeadParams::activate(raw.slice(s![.., ..start]), self.key_size, self.addressing.shift_width())?,
            erase: raw.slice(s![.., start..end]).mapv(sigmoid),
            add: raw.slice(s![.., end..]).to_owned(),
        })
    }

    /// Attention plus erase/add vectors, addressed against `memory` without writing.
    pub fn address(&self, controller_output: ArrayView2<f32>, prev_weights: ArrayView2<f32>, memory: &MemoryBank) -> Result<(Array2<f32>, WriteParams)> {
        let params = self.get_params(controller_output)?;
        let weights = self.addressing.address(&params.addressing, prev_weights, memory)?;
        Ok((weights, params))
    }

    /// Addresses and writes the same bank. Returns the new attention.
    pub fn forward(&self, controller_output: ArrayView2<f32>, prev_weights: ArrayView2<f32>, memory: &mut MemoryBank) -> Result<Array2<f32>> {
        let (weights, params) = self.address(controller_output, prev_weights, memory)?;
        memory.write(weights.view(), params.erase.view(), params.add.view())?;
        Ok(weights)
    }
}

impl Parameterized for WriteHead {
    fn parameters(&self) -> Vec<NamedParameter<'_>> {
        prefixed("fc_write", self.projection.parameters())
    }

    fn parameters_mut(&mut self) -> Vec<NamedParameterMut<'_>> {
        prefixed("fc_write", self.projection.parameters_mut())
    }
}
