// src/constants/mod.rs ~=#######D]======A===r===c====M===o===o===n=====<Lord[CONSTANTS]Xyn>=====S===t===u===d===i===o===s======[R|$>

use once_cell::sync::Lazy;
use std::env;
use tracing::Level;

// OmniXMetry - log-related constants
pub static INITIAL_LOG_LEVEL: Lazy<Level> = Lazy::new(|| env::var("INITIAL_LOG_LEVEL").map(|v| v.parse().unwrap_or(Level::INFO)).unwrap_or(Level::INFO));
pub static LOG_FILE_PATH: Lazy<String> = Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "xynntm.log".to_string()));

// APROAR - NTM architecture defaults
pub const DEFAULT_NUM_INPUTS: usize = 8;
pub const DEFAULT_NUM_OUTPUTS: usize = 8;
pub const DEFAULT_CONTROLLER_SIZE: usize = 100;
pub const DEFAULT_CONTROLLER_LAYERS: usize = 1;
pub const DEFAULT_NUM_HEADS: usize = 1;
pub const DEFAULT_MEMORY_SIZE: usize = 128; // N, number of memory rows
pub const DEFAULT_MEMORY_VECTOR_SIZE: usize = 20; // M, width of each row
pub const DEFAULT_SHIFT_RADIUS: usize = 1; // offsets -1, 0, +1

// NTM numerical guards
pub const SHARPEN_EPSILON: f32 = 1e-16;
pub const COSINE_EPSILON: f32 = 1e-8;

// NTM parameter initialisation
pub const HEAD_XAVIER_GAIN: f32 = 1.4;
pub const OUTPUT_XAVIER_GAIN: f32 = 1.0;
pub const LINEAR_BIAS_STD: f32 = 0.01;
pub const INIT_READ_BIAS_STD: f32 = 0.01;
pub const LSTM_STATE_BIAS_STD: f32 = 0.05;
pub const LSTM_WEIGHT_SCALE: f32 = 5.0; // uniform(-s, s) with s = scale / sqrt(in + out)

// NTM runtime overrides
pub static NTM_SEED: Lazy<u64> = Lazy::new(|| env::var("NTM_SEED").ok().and_then(|v| v.parse().ok()).unwrap_or(42));
pub static NTM_DEVICE: Lazy<String> = Lazy::new(|| env::var("NTM_DEVICE").unwrap_or_else(|_| "cpu".to_string()));
pub static NTM_DEMO_STEPS: Lazy<usize> = Lazy::new(|| env::var("NTM_DEMO_STEPS").ok().and_then(|v| v.parse().ok()).unwrap_or(10));
pub static NTM_DEMO_BATCH_SIZE: Lazy<usize> = Lazy::new(|| env::var("NTM_DEMO_BATCH_SIZE").ok().and_then(|v| v.parse().ok()).unwrap_or(1));
