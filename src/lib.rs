// src/lib.rs ~=#######D]======A===r===c====M===o===o===n=====<Lord[LIB]Xyn>=====S===t===u===d===i===o===s======[R|$>
// src/lib.rs

// Core modules
pub mod aproar;
pub mod constants;
pub mod omnixtracker;

// Re-exports for convenient access
pub use aproar::{
    ntm::{
        AddressingMechanism,
        Controller,
        Device,
        EncapsulatedNTM,
        Head,
        HeadParams,
        LSTMController,
        LSTMState,
        Linear,
        MemoryBank,
        NTMConfig,
        NTMMemory,
        NTMState,
        OutputActivation,
        Parameterized,
        ReadHead,
        WriteHead,
        WriteParams,
        WriteVisibility,
        NTM,
    },
};

pub use omnixtracker::{
    NTMError,
    OmniXMetry,
    Result,
};
