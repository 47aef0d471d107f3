//! Memo Implementation
//!
//! A Memo is a cached derived value that recomputes when its inputs change
//! and notifies its own readers only when the output actually changed.
//!
//! # How Memos Work
//!
//! 1. A memo is a private signal plus an internal driver effect.
//!
//! 2. The driver runs `compute` eagerly at creation and again whenever one
//!    of `compute`'s inputs changes, writing the result into the signal.
//!
//! 3. The signal's equal-write dedup means readers of the memo re-run only
//!    when the computed value differs from the cached one.
//!
//! Readers therefore depend on the memo's output, one level removed from the
//! inputs of `compute`.

use std::fmt::Debug;

use super::runtime::Runtime;
use super::signal::Signal;

/// A cached derived value.
///
/// Requires `T: PartialEq` so unchanged recomputations are swallowed before
/// they reach readers.
///
/// # Example
///
/// ```rust,ignore
/// let rt = Runtime::new();
/// let count = rt.signal(3);
///
/// let count_input = count.clone();
/// let doubled = rt.memo(move || count_input.get() * 2);
/// assert_eq!(doubled.get(), 6);
///
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Memo<T: Clone + PartialEq + 'static> {
    value: Signal<Option<T>>,
}

impl<T: Clone + PartialEq + 'static> Memo<T> {
    pub(crate) fn new(runtime: &Runtime, compute: impl Fn() -> T + 'static) -> Self {
        let value = runtime.signal(None);
        let writer = value.clone();
        runtime.effect(move || {
            writer.set(Some(compute()));
        });
        Self { value }
    }

    /// Read the cached value, establishing a dependency if a computation is
    /// tracking.
    pub fn get(&self) -> T {
        self.value
            .get()
            .expect("memo driver runs before the memo is readable")
    }

    /// Read the cached value without establishing a dependency.
    pub fn get_untracked(&self) -> T {
        self.value
            .get_untracked()
            .expect("memo driver runs before the memo is readable")
    }
}

impl<T: Clone + PartialEq + 'static> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
        }
    }
}

impl<T: Clone + PartialEq + Debug + 'static> Debug for Memo<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("value", &self.value.get_untracked())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
