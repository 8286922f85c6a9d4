//! Freeze domain model.
//!
//! # Responsibility
//! - Define freeze periods, their lifecycle states and paused module tags.
//! - Keep module tags a closed set checked by the type system.
//!
//! # Invariants
//! - Every freeze period is identified by a stable `FreezePeriodId`.
//! - Module tags never travel as free-form strings past the parse boundary.

pub mod freeze;
pub mod module_tag;
