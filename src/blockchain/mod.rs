// src/blockchain/mod.rs
//! Ledger access.

pub mod chain_client;
