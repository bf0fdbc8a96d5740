//! Core constants, types, traits, and errors.

pub mod constants;
mod error;
mod traits;
mod types;

pub use error::*;
pub use traits::*;
pub use types::*;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a holder panicked.
///
/// Every critical section in this crate leaves its state consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
