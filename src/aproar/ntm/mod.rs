// src/aproar/ntm/mod.rs ~=#######D]======A===r===c====M===o===o===n=====<Lord[NTM]Xyn>=====S===t===u===d===i===o===s======[R|$>
pub mod addressing;
pub mod config;
pub mod controller;
pub mod encapsulated;
pub mod linear;
pub mod memory;
pub mod read_head;
pub mod write_head;

pub use addressing::{sigmoid, softmax_rows, softplus, AddressingMechanism, HeadParams};
pub use config::{Device, NTMConfig, OutputActivation, WriteVisibility};
pub use controller::{Controller, LSTMController, LSTMState};
pub use encapsulated::EncapsulatedNTM;
pub use linear::Linear;
pub use memory::{MemoryBank, NTMMemory};
pub use read_head::ReadHead;
pub use write_head::{WriteHead, WriteParams};

use ndarray::{concatenate, s, Array1, Array2, Array3, ArrayView1, ArrayView2, ArrayViewD, ArrayViewMutD, Axis, Zip};
use ndarray_rand::rand::Rng;
use ndarray_rand::rand_distr::Normal;
use ndarray_rand::RandomExt;
use crate::constants::{INIT_READ_BIAS_STD, LINEAR_BIAS_STD, OUTPUT_XAVIER_GAIN};
use crate::omnixtracker::omnixerror::{NTMError, Result};
use tracing::debug;

pub type NamedParameter<'a> = (String, ArrayViewD<'a, f32>);
pub type NamedParameterMut<'a> = (String, ArrayViewMutD<'a, f32>);

/// Learnable tensors of a component. Gradients are the training harness's
/// business; this is only how it reaches the numbers.
pub trait Parameterized {
    fn parameters(&self) -> Vec<NamedParameter<'_>>;

    fn parameters_mut(&mut self) -> Vec<NamedParameterMut<'_>>;

    fn num_parameters(&self) -> usize {
        self.parameters().iter().map(|(_, p)| p.len()).sum()
    }
}

pub(crate) fn prefixed<T>(prefix: &str, params: Vec<(String, T)>) -> Vec<(String, T)> {
    params
        .into_iter()
        .map(|(name, p)| (format!("{}.{}", prefix, name), p))
        .collect()
}

pub enum Head {
    Read(ReadHead),
    Write(WriteHead),
}

impl Head {
    pub fn is_read_head(&self) -> bool {
        matches!(self, Head::Read(_))
    }

    pub fn param_width(&self) -> usize {
        match self {
            Head::Read(head) => head.param_width(),
            Head::Write(head) => head.param_width(),
        }
    }

    pub fn controller_size(&self) -> usize {
        match self {
            Head::Read(head) => head.controller_size(),
            Head::Write(head) => head.controller_size(),
        }
    }

    pub fn create_new_state(&self, batch_size: usize) -> Array2<f32> {
        match self {
            Head::Read(head) => head.create_new_state(batch_size),
            Head::Write(head) => head.create_new_state(batch_size),
        }
    }
}

impl Parameterized for Head {
    fn parameters(&self) -> Vec<NamedParameter<'_>> {
        match self {
            Head::Read(head) => head.parameters(),
            Head::Write(head) => head.parameters(),
        }
    }

    fn parameters_mut(&mut self) -> Vec<NamedParameterMut<'_>> {
        match self {
            Head::Read(head) => head.parameters_mut(),
            Head::Write(head) => head.parameters_mut(),
        }
    }
}

/// Everything one step hands to the next.
#[derive(Debug, Clone, PartialEq)]
pub struct NTMState<S> {
    pub memory: MemoryBank,
    /// One `batch x M` read vector per read head, in head order.
    pub reads: Vec<Array2<f32>>,
    pub controller: S,
    /// One `batch x N` attention per head, in head order.
    pub heads: Vec<Array2<f32>>,
}

pub struct NTM<C: Controller> {
    num_inputs: usize,
    num_outputs: usize,
    controller: C,
    heads: Vec<Head>,
    init_r: Vec<Array1<f32>>,
    fc: Linear,
    memory_size: usize,
    memory_vector_size: usize,
    output_activation: OutputActivation,
    write_visibility: WriteVisibility,
}

impl<C: Controller> NTM<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new<R: Rng + ?Sized>(
        num_inputs: usize,
        num_outputs: usize,
        controller: C,
        memory: &NTMMemory,
        heads: Vec<Head>,
        output_activation: OutputActivation,
        write_visibility: WriteVisibility,
        rng: &mut R,
    ) -> Result<Self> {
        if heads.is_empty() {
            return Err(NTMError::InvalidConfig("an NTM needs at least one head".to_string()));
        }
        let (memory_size, memory_vector_size) = memory.size();
        let (controller_inputs, controller_size) = controller.size();
        let num_read_heads = heads.iter().filter(|h| h.is_read_head()).count();
        if let Some(head) = heads.iter().find(|h| h.controller_size() != controller_size) {
            return Err(NTMError::InvalidConfig(format!(
                "head projects from {} controller outputs, controller emits {}",
                head.controller_size(),
                controller_size
            )));
        }

        let expected_inputs = num_inputs + num_read_heads * memory_vector_size;
        if controller_inputs != expected_inputs {
            return Err(NTMError::InvalidConfig(format!(
                "controller takes {} inputs but the NTM feeds it {}",
                controller_inputs, expected_inputs
            )));
        }

        let read_dist = Normal::new(0.0, INIT_READ_BIAS_STD)
            .map_err(|e| NTMError::InvalidArgument(format!("read bias distribution: {}", e)))?;
        let init_r = (0..num_read_heads)
            .map(|_| Array1::random_using(memory_vector_size, read_dist, rng))
            .collect();
        let fc = Linear::xavier(
            controller_size + num_read_heads * memory_vector_size,
            num_outputs,
            OUTPUT_XAVIER_GAIN,
            LINEAR_BIAS_STD,
            rng,
        )?;

        Ok(NTM {
            num_inputs,
            num_outputs,
            controller,
            heads,
            init_r,
            fc,
            memory_size,
            memory_vector_size,
            output_activation,
            write_visibility,
        })
    }

    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    pub fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    pub fn heads(&self) -> &[Head] {
        &self.heads
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn num_read_heads(&self) -> usize {
        self.init_r.len()
    }

    pub fn create_new_state(&self, memory: &NTMMemory, batch_size: usize) -> Result<NTMState<C::State>> {
        if memory.size() != (self.memory_size, self.memory_vector_size) {
            let (n, m) = memory.size();
            return Err(NTMError::shape(&[self.memory_size, self.memory_vector_size], &[n, m]));
        }
        let memory = memory.reset(batch_size)?;
        let reads = self
            .init_r
            .iter()
            .map(|r| {
                r.broadcast((batch_size, self.memory_vector_size))
                    .map(|v| v.to_owned())
                    .ok_or_else(|| NTMError::MemoryError("initial read cannot be broadcast".to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(NTMState {
            memory,
            reads,
            controller: self.controller.create_new_state(batch_size),
            heads: self.heads.iter().map(|h| h.create_new_state(batch_size)).collect(),
        })
    }

    /// Shape checks of `x` against `prev`. A state that passes is consumed by
    /// [`NTM::step`] without tripping on its shapes.
    pub fn check_step(&self, x: ArrayView2<f32>, prev: &NTMState<C::State>) -> Result<()> {
        let batch_size = prev.memory.batch_size();
        if x.dim() != (batch_size, self.num_inputs) {
            return Err(NTMError::shape(&[batch_size, self.num_inputs], x.shape()));
        }
        if prev.memory.size() != (self.memory_size, self.memory_vector_size) {
            let (n, m) = prev.memory.size();
            return Err(NTMError::shape(
                &[batch_size, self.memory_size, self.memory_vector_size],
                &[batch_size, n, m],
            ));
        }
        if prev.reads.len() != self.num_read_heads() || prev.heads.len() != self.heads.len() {
            return Err(NTMError::MemoryError(format!(
                "state carries {} reads and {} attentions, expected {} and {}",
                prev.reads.len(),
                prev.heads.len(),
                self.num_read_heads(),
                self.heads.len()
            )));
        }
        if let Some(read) = prev.reads.iter().find(|r| r.dim() != (batch_size, self.memory_vector_size)) {
            return Err(NTMError::shape(&[batch_size, self.memory_vector_size], read.shape()));
        }
        if let Some(weights) = prev.heads.iter().find(|w| w.dim() != (batch_size, self.memory_size)) {
            return Err(NTMError::shape(&[batch_size, self.memory_size], weights.shape()));
        }
        self.controller.check_state(&prev.controller, batch_size)
    }

    /// One time step from a borrowed state. `prev` is left untouched, so the
    /// returned state owns a fresh copy of the memory.
    pub fn forward(&self, x: ArrayView2<f32>, prev: &NTMState<C::State>) -> Result<(Array2<f32>, NTMState<C::State>)> {
        self.check_step(x, prev)?;
        let snapshot = match self.write_visibility {
            WriteVisibility::Immediate => None,
            WriteVisibility::StepSnapshot => Some(&prev.memory),
        };
        self.transition(x, &prev.reads, &prev.controller, &prev.heads, prev.memory.clone(), snapshot)
    }

    /// One time step that consumes `prev` and writes its memory in place. The
    /// bank is copied only for [`WriteVisibility::StepSnapshot`].
    pub fn step(&self, x: ArrayView2<f32>, prev: NTMState<C::State>) -> Result<(Array2<f32>, NTMState<C::State>)> {
        self.check_step(x, &prev)?;
        let NTMState { memory, reads, controller, heads } = prev;
        let snapshot = match self.write_visibility {
            WriteVisibility::Immediate => None,
            WriteVisibility::StepSnapshot => Some(memory.clone()),
        };
        self.transition(x, &reads, &controller, &heads, memory, snapshot.as_ref())
    }

    /// Heads address `snapshot` when given, otherwise the live `memory`.
    fn transition(
        &self,
        x: ArrayView2<f32>,
        prev_reads: &[Array2<f32>],
        prev_controller: &C::State,
        prev_heads: &[Array2<f32>],
        mut memory: MemoryBank,
        snapshot: Option<&MemoryBank>,
    ) -> Result<(Array2<f32>, NTMState<C::State>)> {
        let batch_size = memory.batch_size();
        let mut inputs = vec![x.view()];
        inputs.extend(prev_reads.iter().map(|r| r.view()));
        let controller_input = concatenate(Axis(1), &inputs)
            .map_err(|e| NTMError::ComputationError(format!("joining input and reads: {}", e)))?;
        let (controller_output, controller_state) = self.controller.forward(controller_input.view(), prev_controller)?;

        let mut reads = Vec::with_capacity(self.num_read_heads());
        let mut heads_states = Vec::with_capacity(self.heads.len());

        for (head, w_prev) in self.heads.iter().zip(prev_heads) {
            match head {
                Head::Read(read_head) => {
                    let source = snapshot.unwrap_or(&memory);
                    let (read, weights) = read_head.forward(controller_output.view(), w_prev.view(), source)?;
                    reads.push(read);
                    heads_states.push(weights);
                }
                Head::Write(write_head) => {
                    let weights = match snapshot {
                        None => write_head.forward(controller_output.view(), w_prev.view(), &mut memory)?,
                        Some(before) => {
                            let (weights, params) = write_head.address(controller_output.view(), w_prev.view(), before)?;
                            memory.write(weights.view(), params.erase.view(), params.add.view())?;
                            weights
                        }
                    };
                    heads_states.push(weights);
                }
            }
        }

        let mut outputs = vec![controller_output.view()];
        outputs.extend(reads.iter().map(|r| r.view()));
        let fc_input = concatenate(Axis(1), &outputs)
            .map_err(|e| NTMError::ComputationError(format!("joining controller output and reads: {}", e)))?;
        let mut output = self.fc.forward(fc_input.view())?;
        if self.output_activation == OutputActivation::Sigmoid {
            output.mapv_inplace(sigmoid);
        }

        debug!(batch_size, heads = self.heads.len(), "ntm step complete");
        Ok((
            output,
            NTMState {
                memory,
                reads,
                controller: controller_state,
                heads: heads_states,
            },
        ))
    }
}

impl<C: Controller> Parameterized for NTM<C> {
    fn parameters(&self) -> Vec<NamedParameter<'_>> {
        let mut params = prefixed("controller", self.controller.parameters());
        for (i, head) in self.heads.iter().enumerate() {
            params.extend(prefixed(&format!("heads.{}", i), head.parameters()));
        }
        for (i, r) in self.init_r.iter().enumerate() {
            params.push((format!("init_r{}", i), r.view().into_dyn()));
        }
        params.extend(prefixed("fc", self.fc.parameters()));
        params
    }

    fn parameters_mut(&mut self) -> Vec<NamedParameterMut<'_>> {
        let mut params = prefixed("controller", self.controller.parameters_mut());
        for (i, head) in self.heads.iter_mut().enumerate() {
            params.extend(prefixed(&format!("heads.{}", i), head.parameters_mut()));
        }
        for (i, r) in self.init_r.iter_mut().enumerate() {
            params.push((format!("init_r{}", i), r.view_mut().into_dyn()));
        }
        params.extend(prefixed("fc", self.fc.parameters_mut()));
        params
    }
}
