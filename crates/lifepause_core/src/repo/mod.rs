//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented freeze-period data access contracts.
//! - Isolate SQLite query details from the service and guard layers.
//!
//! # Invariants
//! - Repository writes enforce `FreezePeriod::validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

pub mod freeze_repo;
