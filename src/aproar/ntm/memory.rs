// src/aproar/ntm/memory.rs ~=#######D]======A===r===c====M===o===o===n=====<Lord[NTM]Xyn>=====S===t===u===d===i===o===s======[R|$>
use super::*;
use crate::constants::COSINE_EPSILON;
use ndarray::{ArrayViewMut1, ArrayViewMut2};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use tracing::debug;

/// Learnable description of the memory: its shape, the initial content every
/// sequence starts from, and where batched work runs.
#[derive(Debug, Clone)]
pub struct NTMMemory {
    memory_size: usize,
    memory_vector_size: usize,
    bias: Array2<f32>,
    device: Device,
}

impl NTMMemory {
    pub fn new<R: Rng + ?Sized>(
        memory_size: usize,
        memory_vector_size: usize,
        device: Device,
        rng: &mut R,
    ) -> Result<Self> {
        if memory_size == 0 || memory_vector_size == 0 {
            return Err(NTMError::InvalidConfig(format!(
                "memory must have positive shape, got N={} M={}",
                memory_size, memory_vector_size
            )));
        }
        let stdev = 1.0 / ((memory_size + memory_vector_size) as f32).sqrt();
        let bias = Array2::random_using(
            (memory_size, memory_vector_size),
            Uniform::new_inclusive(-stdev, stdev),
            rng,
        );
        Ok(NTMMemory { memory_size, memory_vector_size, bias, device })
    }

    pub fn with_bias(bias: Array2<f32>, device: Device) -> Result<Self> {
        let (memory_size, memory_vector_size) = bias.dim();
        if memory_size == 0 || memory_vector_size == 0 {
            return Err(NTMError::InvalidConfig("memory bias must be non-empty".to_string()));
        }
        Ok(NTMMemory { memory_size, memory_vector_size, bias, device })
    }

    pub fn size(&self) -> (usize, usize) {
        (self.memory_size, self.memory_vector_size)
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn bias(&self) -> &Array2<f32> {
        &self.bias
    }

    /// Fresh content for a new sequence: the bias broadcast over the batch.
    pub fn reset(&self, batch_size: usize) -> Result<MemoryBank> {
        if batch_size == 0 {
            return Err(NTMError::InvalidConfig("batch size must be positive".to_string()));
        }
        debug!(batch_size, n = self.memory_size, m = self.memory_vector_size, "memory reset");
        let content = self
            .bias
            .broadcast((batch_size, self.memory_size, self.memory_vector_size))
            .ok_or_else(|| NTMError::MemoryError("memory bias cannot be broadcast".to_string()))?
            .to_owned();
        Ok(MemoryBank { content, device: self.device })
    }
}

impl Parameterized for NTMMemory {
    fn parameters(&self) -> Vec<NamedParameter<'_>> {
        vec![("bias".to_string(), self.bias.view().into_dyn())]
    }

    fn parameters_mut(&mut self) -> Vec<NamedParameterMut<'_>> {
        vec![("bias".to_string(), self.bias.view_mut().into_dyn())]
    }
}

/// Per-sequence memory content, `batch x N x M`.
#[derive(Debug, Clone)]
pub struct MemoryBank {
    content: Array3<f32>,
    device: Device,
}

/// Banks are equal when their content is; the device only decides where the
/// arithmetic runs.
impl PartialEq for MemoryBank {
    fn eq(&self, other: &Self) -> bool {
        self.content == other.content
    }
}

impl MemoryBank {
    pub fn from_content(content: Array3<f32>, device: Device) -> Result<Self> {
        if content.is_empty() {
            return Err(NTMError::InvalidConfig("memory content must be non-empty".to_string()));
        }
        Ok(MemoryBank { content, device })
    }

    pub fn size(&self) -> (usize, usize) {
        let (_, n, m) = self.content.dim();
        (n, m)
    }

    pub fn batch_size(&self) -> usize {
        self.content.len_of(Axis(0))
    }

    pub fn content(&self) -> &Array3<f32> {
        &self.content
    }

    pub fn device(&self) -> Device {
        self.device
    }

    fn check_rows(&self, weights: &ArrayView2<f32>) -> Result<()> {
        let (n, _) = self.size();
        if weights.dim() != (self.batch_size(), n) {
            return Err(NTMError::shape(&[self.batch_size(), n], weights.shape()));
        }
        Ok(())
    }

    fn check_features(&self, vectors: &ArrayView2<f32>) -> Result<()> {
        let (_, m) = self.size();
        if vectors.dim() != (self.batch_size(), m) {
            return Err(NTMError::shape(&[self.batch_size(), m], vectors.shape()));
        }
        Ok(())
    }

    /// `r[b] = sum_i w[b, i] * mem[b, i, :]`. The weights are used as given.
    pub fn read(&self, weights: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_rows(&weights)?;
        let (_, m) = self.size();
        let mut read = Array2::zeros((self.batch_size(), m));

        let kernel = |mut r: ArrayViewMut1<f32>, w: ArrayView1<f32>, mem: ArrayView2<f32>| {
            r.assign(&w.dot(&mem));
        };
        let zip = Zip::from(read.outer_iter_mut())
            .and(weights.outer_iter())
            .and(self.content.outer_iter());
        match self.device {
            Device::Cpu => zip.for_each(kernel),
            Device::Parallel => zip.par_for_each(kernel),
        }
        Ok(read)
    }

    /// Erase then add: `mem = mem * (1 - w e^T) + w a^T`, every element
    /// computed from its pre-write value.
    pub fn write(&mut self, weights: ArrayView2<f32>, erase: ArrayView2<f32>, add: ArrayView2<f32>) -> Result<()> {
        self.check_rows(&weights)?;
        self.check_features(&erase)?;
        self.check_features(&add)?;

        let kernel = |mut mem: ArrayViewMut2<f32>, w: ArrayView1<f32>, e: ArrayView1<f32>, a: ArrayView1<f32>| {
            for (mut row, &wi) in mem.outer_iter_mut().zip(w.iter()) {
                Zip::from(&mut row).and(&e).and(&a).for_each(|x, &ej, &aj| {
                    *x = *x * (1.0 - wi * ej) + wi * aj;
                });
            }
        };
        let zip = Zip::from(self.content.outer_iter_mut())
            .and(weights.outer_iter())
            .and(erase.outer_iter())
            .and(add.outer_iter());
        match self.device {
            Device::Cpu => zip.for_each(kernel),
            Device::Parallel => zip.par_for_each(kernel),
        }
        Ok(())
    }

    /// Cosine similarity between each batch item's key and every row, `batch x N`.
    pub fn content_similarity(&self, key: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_features(&key)?;
        let (n, _) = self.size();
        let mut similarity = Array2::zeros((self.batch_size(), n));

        let kernel = |mut out: ArrayViewMut1<f32>, k: ArrayView1<f32>, mem: ArrayView2<f32>| {
            let key_norm = k.dot(&k).sqrt();
            for (sim, row) in out.iter_mut().zip(mem.outer_iter()) {
                let row_norm = row.dot(&row).sqrt();
                *sim = row.dot(&k) / (key_norm * row_norm).max(COSINE_EPSILON);
            }
        };
        let zip = Zip::from(similarity.outer_iter_mut())
            .and(key.outer_iter())
            .and(self.content.outer_iter());
        match self.device {
            Device::Cpu => zip.for_each(kernel),
            Device::Parallel => zip.par_for_each(kernel),
        }
        Ok(similarity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array};
    use ndarray_rand::rand::{rngs::StdRng, SeedableRng};

    fn bank(device: Device) -> MemoryBank {
        let content = Array::from_shape_fn((2, 4, 3), |(b, i, j)| (b * 12 + i * 3 + j) as f32 * 0.1 + 0.05);
        MemoryBank::from_content(content, device).unwrap()
    }

    #[test]
    fn test_reset_broadcasts_bias() {
        let mut rng = StdRng::seed_from_u64(1);
        let memory = NTMMemory::new(5, 3, Device::Cpu, &mut rng).unwrap();
        let bank = memory.reset(4).unwrap();
        assert_eq!(bank.batch_size(), 4);
        assert_eq!(bank.size(), (5, 3));
        for item in bank.content().outer_iter() {
            assert_eq!(item, memory.bias().view());
        }
        let bound = 1.0 / 8.0f32.sqrt();
        assert!(memory.bias().iter().all(|x| x.abs() <= bound));
    }

    #[test]
    fn test_reset_rejects_zero_batch() {
        let mut rng = StdRng::seed_from_u64(1);
        let memory = NTMMemory::new(5, 3, Device::Cpu, &mut rng).unwrap();
        assert!(matches!(memory.reset(0), Err(NTMError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_empty_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(NTMMemory::new(0, 3, Device::Cpu, &mut rng).is_err());
        assert!(NTMMemory::new(3, 0, Device::Cpu, &mut rng).is_err());
    }

    #[test]
    fn test_read_is_weighted_row_sum() {
        let bank = bank(Device::Cpu);
        let w = array![[0.5, 0.5, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0]];
        let r = bank.read(w.view()).unwrap();
        let c = bank.content();
        let expected0 = (&c.slice(s![0, 0, ..]) + &c.slice(s![0, 1, ..])) * 0.5;
        assert_abs_diff_eq!(r.row(0), expected0.view(), epsilon = 1e-6);
        assert_eq!(r.row(1), c.slice(s![1, 3, ..]));
    }

    #[test]
    fn test_write_uses_pre_update_content() {
        let mut bank = bank(Device::Cpu);
        let before = bank.content().clone();
        let w = array![[0.25, 0.75, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0]];
        let e = array![[0.5, 0.5, 0.5], [1.0, 0.0, 1.0]];
        let a = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        bank.write(w.view(), e.view(), a.view()).unwrap();
        for b in 0..2 {
            for i in 0..4 {
                for j in 0..3 {
                    let expected = before[[b, i, j]] * (1.0 - w[[b, i]] * e[[b, j]]) + w[[b, i]] * a[[b, j]];
                    assert_abs_diff_eq!(bank.content()[[b, i, j]], expected, epsilon = 1e-6);
                }
            }
        }
    }

    #[test]
    fn test_similarity_of_zero_row_is_zero() {
        let mut content = Array3::ones((1, 3, 2));
        content.slice_mut(s![0, 1, ..]).fill(0.0);
        let bank = MemoryBank::from_content(content, Device::Cpu).unwrap();
        let sim = bank.content_similarity(array![[1.0, 1.0]].view()).unwrap();
        assert_abs_diff_eq!(sim, array![[1.0, 0.0, 1.0]], epsilon = 1e-6);
    }

    #[test]
    fn test_shape_checks() {
        let mut bank = bank(Device::Cpu);
        assert!(bank.read(Array2::zeros((2, 3)).view()).is_err());
        assert!(bank.content_similarity(Array2::zeros((1, 3)).view()).is_err());
        let w = Array2::zeros((2, 4));
        assert!(bank.write(w.view(), Array2::zeros((2, 2)).view(), Array2::zeros((2, 3)).view()).is_err());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut seq = bank(Device::Cpu);
        let mut par = bank(Device::Parallel);
        let w = array![[0.1, 0.2, 0.3, 0.4], [0.4, 0.3, 0.2, 0.1]];
        let e = array![[0.3, 0.6, 0.9], [0.2, 0.4, 0.8]];
        let a = array![[-1.0, 0.5, 2.0], [0.1, 0.1, 0.1]];
        seq.write(w.view(), e.view(), a.view()).unwrap();
        par.write(w.view(), e.view(), a.view()).unwrap();
        assert_eq!(seq.content(), par.content());
        assert_eq!(seq.read(w.view()).unwrap(), par.read(w.view()).unwrap());
        assert_eq!(
            seq.content_similarity(a.view()).unwrap(),
            par.content_similarity(a.view()).unwrap()
        );
    }

    #[test]
    fn test_equality_ignores_device() {
        let cpu = bank(Device::Cpu);
        let parallel = bank(Device::Parallel);
        assert_eq!(cpu, parallel);

        let mut written = bank(Device::Parallel);
        let w = array![[1.0, 0.0, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0]];
        written.write(w.view(), Array2::ones((2, 3)).view(), Array2::zeros((2, 3)).view()).unwrap();
        assert_ne!(cpu, written);
    }
}
