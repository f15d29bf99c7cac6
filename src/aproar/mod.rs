// src/aproar/mod.rs ~=#######D]======A===r===c====M===o===o===n=====<Lord[APROAR]Xyn>=====S===t===u===d===i===o===s======[R|$>

pub mod ntm;

pub use ntm::{
    AddressingMechanism, Controller, Device, EncapsulatedNTM, Head, HeadParams, LSTMController, LSTMState,
    MemoryBank, NTMConfig, NTMMemory, NTMState, OutputActivation, Parameterized, ReadHead, WriteHead,
    WriteParams, WriteVisibility, NTM,
};
