// src/wallet/mod.rs
//! Signing keys.

pub mod key_management;
