// src/omnixtracker/mod.rs ~=#######D]======A===r===c====M===o===o===n=====<Lord[OMNIXTRACKER]Xyn>=====S===t===u===d===i===o===s======[R|$>

pub mod omnixerror;
pub mod omnixmetry;

pub use omnixerror::{NTMError, Result};
pub use omnixmetry::{OmniXMetry, setup_global_subscriber};
