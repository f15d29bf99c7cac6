// src/aproar/ntm/config.rs ~=#######D]======A===r===c====M===o===o===n=====<Lord[NTM]Xyn>=====S===t===u===d===i===o===s======[R|$>

use crate::constants::*;
use crate::omnixtracker::omnixerror::{NTMError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Where batched memory work runs. Both devices produce bitwise-identical results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// Batch items processed one after the other on the calling thread.
    #[default]
    Cpu,
    /// Batch items processed on the rayon pool.
    Parallel,
}

impl FromStr for Device {
    type Err = NTMError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(Device::Cpu),
            "parallel" | "rayon" => Ok(Device::Parallel),
            other => Err(NTMError::InvalidConfig(format!("unknown device '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputActivation {
    #[default]
    Sigmoid,
    Identity,
}

/// What the heads later in a step see of the writes made earlier in that step.
///
/// Heads always run in construction order `[Read0, Write0, Read1, Write1, ...]`
/// and writes always land on the live bank in that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteVisibility {
    /// Each head addresses the bank as it stands when the head runs.
    #[default]
    Immediate,
    /// Every head addresses and reads the pre-step content.
    StepSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NTMConfig {
    pub num_inputs: usize,
    pub num_outputs: usize,
    pub controller_size: usize,
    pub controller_layers: usize,
    /// Number of read/write head pairs.
    pub num_heads: usize,
    /// N
    pub memory_size: usize,
    /// M
    pub memory_vector_size: usize,
    pub shift_radius: usize,
    pub seed: u64,
    pub device: Device,
    pub output_activation: OutputActivation,
    pub write_visibility: WriteVisibility,
}

impl Default for NTMConfig {
    fn default() -> Self {
        Self {
            num_inputs: DEFAULT_NUM_INPUTS,
            num_outputs: DEFAULT_NUM_OUTPUTS,
            controller_size: DEFAULT_CONTROLLER_SIZE,
            controller_layers: DEFAULT_CONTROLLER_LAYERS,
            num_heads: DEFAULT_NUM_HEADS,
            memory_size: DEFAULT_MEMORY_SIZE,
            memory_vector_size: DEFAULT_MEMORY_VECTOR_SIZE,
            shift_radius: DEFAULT_SHIFT_RADIUS,
            seed: *NTM_SEED,
            device: Device::Cpu,
            output_activation: OutputActivation::Sigmoid,
            write_visibility: WriteVisibility::Immediate,
        }
    }
}

impl NTMConfig {
    pub fn new(
        num_inputs: usize,
        num_outputs: usize,
        controller_size: usize,
        controller_layers: usize,
        num_heads: usize,
        memory_size: usize,
        memory_vector_size: usize,
    ) -> Self {
        Self {
            num_inputs,
            num_outputs,
            controller_size,
            controller_layers,
            num_heads,
            memory_size,
            memory_vector_size,
            ..Self::default()
        }
    }

    /// Defaults overridden by any `NTM_*` variable present in the environment.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.num_inputs = env_usize("NTM_NUM_INPUTS", config.num_inputs)?;
        config.num_outputs = env_usize("NTM_NUM_OUTPUTS", config.num_outputs)?;
        config.controller_size = env_usize("NTM_CONTROLLER_SIZE", config.controller_size)?;
        config.controller_layers = env_usize("NTM_CONTROLLER_LAYERS", config.controller_layers)?;
        config.num_heads = env_usize("NTM_NUM_HEADS", config.num_heads)?;
        config.memory_size = env_usize("NTM_MEMORY_SIZE", config.memory_size)?;
        config.memory_vector_size = env_usize("NTM_MEMORY_VECTOR_SIZE", config.memory_vector_size)?;
        config.shift_radius = env_usize("NTM_SHIFT_RADIUS", config.shift_radius)?;
        config.device = NTM_DEVICE.parse()?;
        config.validate()?;
        Ok(config)
    }

    pub fn shift_width(&self) -> usize {
        2 * self.shift_radius + 1
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("num_inputs", self.num_inputs),
            ("num_outputs", self.num_outputs),
            ("controller_size", self.controller_size),
            ("controller_layers", self.controller_layers),
            ("num_heads", self.num_heads),
            ("memory_size", self.memory_size),
            ("memory_vector_size", self.memory_vector_size),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(NTMError::InvalidConfig(format!("{} must be positive", name)));
            }
        }
        if self.shift_width() > self.memory_size {
            return Err(NTMError::InvalidConfig(format!(
                "shift window of {} offsets does not fit {} memory rows",
                self.shift_width(),
                self.memory_size
            )));
        }
        Ok(())
    }
}

fn env_usize(key: &str, default: usize) -> Result<usize> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| NTMError::InvalidConfig(format!("{}='{}' is not a non-negative integer", key, raw))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(NTMConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_heads_rejected() {
        let config = NTMConfig { num_heads: 0, ..NTMConfig::default() };
        assert!(matches!(config.validate(), Err(NTMError::InvalidConfig(_))));
    }

    #[test]
    fn test_shift_window_must_fit_memory() {
        let config = NTMConfig::new(4, 4, 10, 1, 1, 2, 4);
        assert!(matches!(config.validate(), Err(NTMError::InvalidConfig(_))));
        let config = NTMConfig::new(4, 4, 10, 1, 1, 3, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_device_parsing() {
        assert_eq!("CPU".parse::<Device>().unwrap(), Device::Cpu);
        assert_eq!("parallel".parse::<Device>().unwrap(), Device::Parallel);
        assert!("cuda:0".parse::<Device>().is_err());
    }
}
