//! # Tokex Accounting
//!
//! The broker's memory: completed exchanges, token ownership and tags live
//! behind the [`Accounting`], [`Tagging`] and [`Finalizer`] traits. The
//! [`MemoryLedger`] keeps everything in process memory and upholds the one
//! hard invariant of finalization: a token changes hands only if it was
//! previously unknown or owned by the party giving it up.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{AccountingError, Result};
pub use memory::MemoryLedger;
pub use traits::{Accounting, Finalizer, Tagging};
