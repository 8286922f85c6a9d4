//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate freeze-period repository writes into use-case level APIs.
//! - Keep the guard cache coherent with every write.

pub mod freeze_service;
