// src/utils/mod.rs
//! Helper functions.

pub mod cancel;
pub mod crypto;
pub mod serialization;
