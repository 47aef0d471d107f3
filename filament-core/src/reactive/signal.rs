//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read while a computation is tracking, the signal
//!    registers that computation as a subscriber and the computation records
//!    the reverse edge for later pruning.
//!
//! 2. When a signal's value changes, all subscribers are enqueued and a
//!    flush is requested.
//!
//! 3. A write of a value equal to the current one is a no-op: no
//!    enqueueing, no flush. This is the engine's only deduplication.
//!
//! Subscribers are held weakly and in insertion order. A dropped or disposed
//! computation can never be re-run through a stale edge; the edge itself is
//! removed the next time its owner re-runs.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use super::computation::{Computation, ComputationId, Source};
use super::runtime::RuntimeInner;

/// Counter for generating unique signal IDs. Debug output only.
static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_signal_id() -> u64 {
    SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Shared state behind a `Signal<T>` handle.
pub(crate) struct SignalInner<T> {
    id: u64,

    value: RefCell<T>,

    /// Subscribers in insertion order. A computation appears here only if it
    /// read this signal during its most recent run.
    subscribers: RefCell<IndexMap<ComputationId, Weak<Computation>>>,
}

impl<T: 'static> Source for SignalInner<T> {
    fn unsubscribe(&self, id: ComputationId) {
        self.subscribers.borrow_mut().shift_remove(&id);
    }
}

/// A reactive container for mutable state.
///
/// Handles are `Clone` and share the same value and subscriber set. Reads
/// inside an effect or memo establish a dependency; reads outside any
/// tracking context are plain reads.
///
/// # Example
///
/// ```rust,ignore
/// let rt = Runtime::new();
/// let count = rt.signal(0);
///
/// let value = count.get();   // tracked when a computation is running
/// count.set(5);              // subscribers re-run before set returns
/// count.set(5);              // equal write, no-op
/// ```
pub struct Signal<T> {
    inner: Rc<SignalInner<T>>,
    runtime: Rc<RuntimeInner>,
}

impl<T: 'static> Signal<T> {
    pub(crate) fn new(runtime: Rc<RuntimeInner>, initial: T) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                id: next_signal_id(),
                value: RefCell::new(initial),
                subscribers: RefCell::new(IndexMap::new()),
            }),
            runtime,
        }
    }

    /// Read the value, establishing a dependency if a computation is
    /// tracking.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.track();
        self.inner.value.borrow().clone()
    }

    /// Read the value without establishing a dependency.
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.inner.value.borrow().clone()
    }

    /// Borrow the value for the duration of `f`, establishing a dependency
    /// if a computation is tracking.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&self.inner.value.borrow())
    }

    /// Borrow the value for the duration of `f` without establishing a
    /// dependency.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Write a new value and synchronously re-run subscribers.
    ///
    /// A write equal to the current value is a no-op.
    pub fn set(&self, next: T)
    where
        T: PartialEq,
    {
        let unchanged = *self.inner.value.borrow() == next;
        if unchanged {
            return;
        }
        *self.inner.value.borrow_mut() = next;
        self.notify();
    }

    /// Derive the next value from the current one and write it.
    pub fn update(&self, f: impl FnOnce(&T) -> T)
    where
        T: PartialEq,
    {
        let next = f(&self.inner.value.borrow());
        self.set(next);
    }

    /// The number of live subscriptions. Dead weak edges still count until
    /// their owners re-run or are pruned by a write.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    fn track(&self) {
        let Some(current) = self.runtime.current() else {
            return;
        };
        if current.is_root() {
            return;
        }
        self.inner
            .subscribers
            .borrow_mut()
            .insert(current.id(), Rc::downgrade(&current));
        let source: Rc<dyn Source> = Rc::clone(&self.inner) as Rc<dyn Source>;
        current.add_dependency(Rc::downgrade(&source));
    }

    /// Enqueue every live subscriber, prune dead edges, then flush.
    fn notify(&self) {
        let subscribers: Vec<Weak<Computation>> = {
            let mut map = self.inner.subscribers.borrow_mut();
            map.retain(|_, weak| weak.upgrade().is_some());
            map.values().cloned().collect()
        };
        for subscriber in subscribers {
            self.runtime.enqueue(subscriber);
        }
        self.runtime.flush();
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            runtime: Rc::clone(&self.runtime),
        }
    }
}

impl<T: Debug> Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .field("subscribers", &self.inner.subscribers.borrow().len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::reactive::Runtime;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn get_and_set_round_trip() {
        let rt = Runtime::new();
        let s = rt.signal(10);
        assert_eq!(s.get(), 10);

        s.set(20);
        assert_eq!(s.get(), 20);
    }

    #[test]
    fn clones_share_state() {
        let rt = Runtime::new();
        let a = rt.signal(String::from("hello"));
        let b = a.clone();

        a.set(String::from("world"));
        assert_eq!(b.get(), "world");
    }

    #[test]
    fn equal_write_is_a_no_op() {
        let rt = Runtime::new();
        let s = rt.signal(5);
        let runs = Rc::new(Cell::new(0));

        let s_reader = s.clone();
        let runs_effect = runs.clone();
        rt.effect(move || {
            s_reader.get();
            runs_effect.set(runs_effect.get() + 1);
        });
        assert_eq!(runs.get(), 1);

        s.set(5);
        assert_eq!(runs.get(), 1);

        s.set(6);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn update_derives_from_the_current_value() {
        let rt = Runtime::new();
        let s = rt.signal(3);
        s.update(|v| v * 2);
        assert_eq!(s.get(), 6);
    }

    #[test]
    fn untracked_reads_establish_no_dependency() {
        let rt = Runtime::new();
        let s = rt.signal(0);
        let runs = Rc::new(Cell::new(0));

        let s_reader = s.clone();
        let runs_effect = runs.clone();
        rt.effect(move || {
            s_reader.get_untracked();
            runs_effect.set(runs_effect.get() + 1);
        });
        assert_eq!(runs.get(), 1);

        s.set(99);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn with_borrows_without_cloning() {
        let rt = Runtime::new();
        let s = rt.signal(vec![1, 2, 3]);
        let len = s.with(|v| v.len());
        assert_eq!(len, 3);
    }

    #[test]
    fn conditional_reads_unsubscribe_when_untaken() {
        let rt = Runtime::new();
        let gate = rt.signal(true);
        let value = rt.signal(0);
        let runs = Rc::new(Cell::new(0));

        let gate_reader = gate.clone();
        let value_reader = value.clone();
        let runs_effect = runs.clone();
        rt.effect(move || {
            runs_effect.set(runs_effect.get() + 1);
            if gate_reader.get() {
                value_reader.get();
            }
        });
        assert_eq!(runs.get(), 1);

        gate.set(false);
        assert_eq!(runs.get(), 2);

        // The branch is untaken now; the edge to `value` is gone.
        value.set(7);
        assert_eq!(runs.get(), 2);
        assert_eq!(value.subscriber_count(), 0);
    }

    #[test]
    fn disposed_scope_prunes_the_edge_on_the_next_write() {
        let rt = Runtime::new();
        let s = rt.signal(0);
        let runs = Rc::new(Cell::new(0));

        let disposer = rt.create_root(|disposer| {
            let s_reader = s.clone();
            let runs_effect = runs.clone();
            rt.effect(move || {
                s_reader.get();
                runs_effect.set(runs_effect.get() + 1);
            });
            disposer
        });
        assert_eq!(s.subscriber_count(), 1);

        disposer.dispose();

        s.set(1);
        assert_eq!(runs.get(), 1);
        assert_eq!(s.subscriber_count(), 0);
    }
}
