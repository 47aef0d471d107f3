//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, memos, and
//! effects. One `Runtime` instance owns the whole scheduler state: the
//! currently-tracking computation, the pending set, and the batch depth.
//!
//! # How It Works
//!
//! 1. `effect` creates a computation and runs it immediately with itself
//!    installed as the current tracker; every signal read during that window
//!    records an edge.
//!
//! 2. A signal write marks every subscriber pending and requests a flush.
//!
//! 3. A flush snapshots the pending set, clears it, and re-runs each
//!    computation once, in insertion order. Writes performed by those re-runs
//!    land in a fresh pending set that a recursive flush picks up, so
//!    cascading updates settle before control returns to the writer.
//!
//! 4. `batch` defers the flush until the outermost batch scope exits,
//!    collapsing N writes to the same computation into at most one re-run.
//!
//! There is no topological ordering: a computation fed by two paths out of
//! the same signal may run once per path within a flush. That is an accepted
//! property of this scheduler.
//!
//! # Ownership
//!
//! Computations created while another computation is tracking are owned by
//! it and disposed when it re-runs or is disposed. Computations created with
//! no tracker live for the runtime's lifetime. `create_root` opens an
//! explicit disposal boundary and hands the caller the owning `Disposer`.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use thiserror::Error;

use super::computation::{Computation, ComputationId, Owned};
use super::memo::Memo;
use super::signal::Signal;

/// Error returned when `on_cleanup` is called with no computation tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("on_cleanup called outside of a reactive scope")]
pub struct ScopeError;

/// A fault captured from a panicking cleanup callback.
///
/// The remaining cleanups in the owning sequence still run; the fault is
/// handed to the runtime's fault hook, or logged when no hook is installed.
#[derive(Debug, Clone)]
pub struct CleanupFault {
    /// The panic payload, stringified when possible.
    pub message: String,
}

impl CleanupFault {
    fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { message }
    }
}

/// Shared state behind a `Runtime` handle.
pub(crate) struct RuntimeInner {
    /// The computation currently tracking reads, if any. At most one tracks
    /// at a time; nesting saves and restores.
    current: RefCell<Option<Rc<Computation>>>,

    /// Computations awaiting re-run, in insertion order. Re-enqueueing an
    /// already-pending computation keeps its original position.
    pending: RefCell<IndexMap<ComputationId, Weak<Computation>>>,

    /// Batch nesting depth; flushes are suppressed while non-zero.
    batch_depth: Cell<usize>,

    /// Effects created with no tracker; they live as long as the runtime.
    detached: RefCell<Vec<Rc<Computation>>>,

    /// Receiver for cleanup faults.
    fault_hook: RefCell<Option<Box<dyn Fn(&CleanupFault)>>>,
}

impl RuntimeInner {
    fn new() -> Self {
        Self {
            current: RefCell::new(None),
            pending: RefCell::new(IndexMap::new()),
            batch_depth: Cell::new(0),
            detached: RefCell::new(Vec::new()),
            fault_hook: RefCell::new(None),
        }
    }

    /// The computation currently tracking reads, if any.
    pub(crate) fn current(&self) -> Option<Rc<Computation>> {
        self.current.borrow().clone()
    }

    /// Mark a subscriber pending. Roots and disposed computations are never
    /// enqueued.
    pub(crate) fn enqueue(&self, subscriber: Weak<Computation>) {
        let Some(computation) = subscriber.upgrade() else {
            return;
        };
        if computation.is_disposed() || computation.is_root() {
            return;
        }
        self.pending
            .borrow_mut()
            .entry(computation.id())
            .or_insert(subscriber);
    }

    /// Re-run everything pending, unless inside a batch.
    ///
    /// Snapshots the pending set and clears it before running anything;
    /// writes made by the re-runs enqueue into a fresh set picked up by a
    /// recursive flush.
    pub(crate) fn flush(&self) {
        if self.batch_depth.get() > 0 {
            return;
        }
        let queue: Vec<Rc<Computation>> = {
            let mut pending = self.pending.borrow_mut();
            if pending.is_empty() {
                return;
            }
            std::mem::take(&mut *pending)
                .into_values()
                .filter_map(|weak| weak.upgrade())
                .collect()
        };
        tracing::trace!(count = queue.len(), "flushing pending computations");
        for computation in &queue {
            self.run(computation);
        }
        self.flush();
    }

    /// Execute one computation: drain the previous run's owned sequence,
    /// prune stale dependency edges, then run the body as current tracker.
    pub(crate) fn run(&self, computation: &Rc<Computation>) {
        if computation.is_disposed() || computation.is_root() {
            return;
        }
        self.drain_owned(computation);
        computation.clear_dependencies();

        let prev = self.current.borrow_mut().replace(Rc::clone(computation));
        let _tracker = TrackerGuard {
            runtime: self,
            prev,
        };
        computation.run_action();
    }

    /// Drain the owned sequence in registration order: cleanups run guarded,
    /// child computations dispose depth-first.
    fn drain_owned(&self, computation: &Computation) {
        for item in computation.take_owned() {
            match item {
                Owned::Cleanup(cleanup) => self.run_cleanup(cleanup),
                Owned::Child(child) => self.dispose(&child),
            }
        }
    }

    /// Tear down a computation: owned sequence first, then dependency edges,
    /// then any pending entry. Idempotent.
    pub(crate) fn dispose(&self, computation: &Rc<Computation>) {
        if computation.mark_disposed() {
            return;
        }
        self.drain_owned(computation);
        computation.clear_dependencies();
        self.pending.borrow_mut().shift_remove(&computation.id());
    }

    /// Run one cleanup, catching a panic so the rest of the sequence still
    /// executes.
    fn run_cleanup(&self, cleanup: Box<dyn FnOnce()>) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(move || cleanup())) {
            let fault = CleanupFault::from_payload(payload.as_ref());
            let hook = self.fault_hook.borrow();
            match hook.as_ref() {
                Some(hook) => hook(&fault),
                None => {
                    tracing::error!(message = %fault.message, "cleanup panicked during disposal");
                }
            }
        }
    }
}

/// Restores the previous tracker when dropped, including on unwind.
struct TrackerGuard<'a> {
    runtime: &'a RuntimeInner,
    prev: Option<Rc<Computation>>,
}

impl Drop for TrackerGuard<'_> {
    fn drop(&mut self) {
        *self.runtime.current.borrow_mut() = self.prev.take();
    }
}

/// Decrements the batch depth when dropped and flushes at the outermost
/// level, including on unwind.
struct BatchGuard<'a> {
    runtime: &'a RuntimeInner,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        let depth = self.runtime.batch_depth.get();
        self.runtime.batch_depth.set(depth - 1);
        self.runtime.flush();
    }
}

/// The owning handle for a root scope.
///
/// Consuming it with [`Disposer::dispose`] runs every cleanup registered on
/// the root in registration order, disposes child computations depth-first,
/// and clears the root's dependency edges. Dropping a `Disposer` without
/// calling `dispose` drops the scope tree without running its cleanups.
pub struct Disposer {
    computation: Rc<Computation>,
    runtime: Rc<RuntimeInner>,
}

impl Disposer {
    /// Tear down the scope this handle owns.
    pub fn dispose(self) {
        self.runtime.dispose(&self.computation);
    }
}

impl std::fmt::Debug for Disposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disposer")
            .field("computation", &self.computation)
            .finish()
    }
}

/// A handle to one reactive runtime.
///
/// Cheap to clone; all clones share the same scheduler state. Independent
/// runtimes never interact, so tests and multiple embedder roots can each
/// own one.
///
/// # Example
///
/// ```rust,ignore
/// let rt = Runtime::new();
/// let count = rt.signal(0);
///
/// let count_reader = count.clone();
/// rt.effect(move || {
///     println!("count is {}", count_reader.get());
/// });
///
/// count.set(5); // effect re-runs synchronously, prints "count is 5"
/// ```
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    /// Create a fresh runtime with empty scheduler state.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RuntimeInner::new()),
        }
    }

    /// Create a signal owned by this runtime.
    pub fn signal<T: 'static>(&self, initial: T) -> Signal<T> {
        Signal::new(Rc::clone(&self.inner), initial)
    }

    /// Create an effect and run it immediately, before `effect` returns.
    ///
    /// The effect is owned by the computation current at creation time; with
    /// no tracker it lives for the runtime's lifetime.
    pub fn effect(&self, action: impl Fn() + 'static) {
        let computation = Rc::new(Computation::new(Box::new(action)));
        {
            let current = self.inner.current.borrow();
            match current.as_ref() {
                Some(parent) => parent.adopt(Rc::clone(&computation)),
                None => self
                    .inner
                    .detached
                    .borrow_mut()
                    .push(Rc::clone(&computation)),
            }
        }
        self.inner.run(&computation);
    }

    /// Create a cached derived value.
    ///
    /// Backed by a private signal written by an internal driver effect, so
    /// readers depend on the memo's output value rather than on the inputs
    /// of `compute`.
    pub fn memo<T>(&self, compute: impl Fn() -> T + 'static) -> Memo<T>
    where
        T: Clone + PartialEq + 'static,
    {
        Memo::new(self, compute)
    }

    /// Run `f` with flushes deferred until the outermost batch exits.
    ///
    /// Writes inside the batch still mutate signal values immediately; only
    /// subscriber re-execution is deferred.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        self.inner.batch_depth.set(self.inner.batch_depth.get() + 1);
        let _guard = BatchGuard {
            runtime: &self.inner,
        };
        f()
    }

    /// Register a cleanup on the currently-tracking computation.
    ///
    /// The cleanup runs exactly once, in registration order: either before
    /// the owning computation's next run or when it is disposed. Returns
    /// [`ScopeError`] when nothing is tracking.
    pub fn on_cleanup(&self, cleanup: impl FnOnce() + 'static) -> Result<(), ScopeError> {
        let current = self.inner.current.borrow();
        match current.as_ref() {
            Some(computation) => {
                computation.push_cleanup(Box::new(cleanup));
                Ok(())
            }
            None => Err(ScopeError),
        }
    }

    /// Open a disposal boundary.
    ///
    /// Installs a fresh root as the current tracker, invokes `f` with the
    /// root's [`Disposer`], and returns `f`'s result. Everything created
    /// inside `f` is owned by the root and torn down by the disposer.
    pub fn create_root<R>(&self, f: impl FnOnce(Disposer) -> R) -> R {
        let root = Rc::new(Computation::root());
        let disposer = Disposer {
            computation: Rc::clone(&root),
            runtime: Rc::clone(&self.inner),
        };
        let prev = self.inner.current.borrow_mut().replace(root);
        let _tracker = TrackerGuard {
            runtime: &self.inner,
            prev,
        };
        f(disposer)
    }

    /// Install the receiver for cleanup faults, replacing any previous one.
    pub fn set_fault_hook(&self, hook: impl Fn(&CleanupFault) + 'static) {
        *self.inner.fault_hook.borrow_mut() = Some(Box::new(hook));
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("pending", &self.inner.pending.borrow().len())
            .field("batch_depth", &self.inner.batch_depth.get())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[test]
    fn effect_runs_once_on_creation() {
        let rt = Runtime::new();
        let runs = Rc::new(Cell::new(0));

        let runs_effect = runs.clone();
        rt.effect(move || {
            runs_effect.set(runs_effect.get() + 1);
        });

        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn batch_collapses_writes_into_one_rerun() {
        let rt = Runtime::new();
        let s = rt.signal(0);
        let runs = Rc::new(Cell::new(0));
        let observed = Rc::new(Cell::new(-1));

        let s_reader = s.clone();
        let runs_effect = runs.clone();
        let observed_effect = observed.clone();
        rt.effect(move || {
            runs_effect.set(runs_effect.get() + 1);
            observed_effect.set(s_reader.get());
        });
        assert_eq!(runs.get(), 1);

        rt.batch(|| {
            s.set(1);
            s.set(2);
            s.set(3);
            // Values mutate immediately; re-runs are deferred.
            assert_eq!(observed.get(), 0);
        });

        assert_eq!(runs.get(), 2);
        assert_eq!(observed.get(), 3);
    }

    #[test]
    fn nested_batches_flush_at_the_outermost_exit() {
        let rt = Runtime::new();
        let s = rt.signal(0);
        let runs = Rc::new(Cell::new(0));

        let s_reader = s.clone();
        let runs_effect = runs.clone();
        rt.effect(move || {
            runs_effect.set(runs_effect.get() + 1);
            s_reader.get();
        });

        rt.batch(|| {
            s.set(1);
            rt.batch(|| {
                s.set(2);
            });
            // Inner batch exit must not flush.
            assert_eq!(runs.get(), 1);
        });

        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn batch_returns_the_closure_result() {
        let rt = Runtime::new();
        assert_eq!(rt.batch(|| 7 * 6), 42);
    }

    #[test]
    fn flush_runs_subscribers_in_creation_order() {
        let rt = Runtime::new();
        let s = rt.signal(0);
        let order = Rc::new(RefCell::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let s_reader = s.clone();
            let order_effect = order.clone();
            rt.effect(move || {
                s_reader.get();
                order_effect.borrow_mut().push(label);
            });
        }
        order.borrow_mut().clear();

        s.set(1);

        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn on_cleanup_outside_a_scope_errors() {
        let rt = Runtime::new();
        assert_eq!(rt.on_cleanup(|| {}), Err(ScopeError));
    }

    #[test]
    fn previous_cleanups_fire_in_order_before_each_rerun() {
        let rt = Runtime::new();
        let s = rt.signal(0);
        let log = Rc::new(RefCell::new(Vec::new()));

        let s_reader = s.clone();
        let log_effect = log.clone();
        let rt_effect = rt.clone();
        rt.effect(move || {
            let v = s_reader.get();
            log_effect.borrow_mut().push(format!("run {v}"));
            let log_a = log_effect.clone();
            rt_effect
                .on_cleanup(move || log_a.borrow_mut().push(format!("cleanup a {v}")))
                .expect("effect body is a scope");
            let log_b = log_effect.clone();
            rt_effect
                .on_cleanup(move || log_b.borrow_mut().push(format!("cleanup b {v}")))
                .expect("effect body is a scope");
        });

        s.set(1);

        assert_eq!(
            *log.borrow(),
            vec!["run 0", "cleanup a 0", "cleanup b 0", "run 1"]
        );
    }

    #[test]
    fn root_disposal_runs_cleanups_once_in_order_and_stops_updates() {
        let rt = Runtime::new();
        let s = rt.signal(0);
        let runs = Rc::new(Cell::new(0));
        let log = Rc::new(RefCell::new(Vec::new()));

        let disposer = rt.create_root(|disposer| {
            let log_a = log.clone();
            rt.on_cleanup(move || log_a.borrow_mut().push("a"))
                .expect("inside root");

            let s_reader = s.clone();
            let runs_effect = runs.clone();
            rt.effect(move || {
                runs_effect.set(runs_effect.get() + 1);
                s_reader.get();
            });

            let log_b = log.clone();
            rt.on_cleanup(move || log_b.borrow_mut().push("b"))
                .expect("inside root");

            disposer
        });

        assert_eq!(runs.get(), 1);
        s.set(1);
        assert_eq!(runs.get(), 2);

        disposer.dispose();
        assert_eq!(*log.borrow(), vec!["a", "b"]);

        // No previously-owned computation re-runs after disposal.
        s.set(2);
        s.set(3);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn nested_effects_are_disposed_when_the_parent_reruns() {
        let rt = Runtime::new();
        let outer = rt.signal(0);
        let inner = rt.signal(0);
        let inner_runs = Rc::new(Cell::new(0));

        let rt_effect = rt.clone();
        let outer_reader = outer.clone();
        let inner_for_effect = inner.clone();
        let inner_runs_effect = inner_runs.clone();
        rt.effect(move || {
            outer_reader.get();
            let inner_reader = inner_for_effect.clone();
            let inner_runs_nested = inner_runs_effect.clone();
            rt_effect.effect(move || {
                inner_runs_nested.set(inner_runs_nested.get() + 1);
                inner_reader.get();
            });
        });
        assert_eq!(inner_runs.get(), 1);

        // One live nested effect at a time: the outer re-run disposes the
        // previous one before creating its replacement.
        outer.set(1);
        assert_eq!(inner_runs.get(), 2);
        inner.set(1);
        assert_eq!(inner_runs.get(), 3);
    }

    #[test]
    fn cleanup_panic_is_reported_and_later_cleanups_still_run() {
        let rt = Runtime::new();
        let faults = Rc::new(RefCell::new(Vec::new()));
        let survivor = Rc::new(Cell::new(false));

        let faults_hook = faults.clone();
        rt.set_fault_hook(move |fault| {
            faults_hook.borrow_mut().push(fault.message.clone());
        });

        let disposer = rt.create_root(|disposer| {
            rt.on_cleanup(|| panic!("boom")).expect("inside root");
            let survivor_cleanup = survivor.clone();
            rt.on_cleanup(move || survivor_cleanup.set(true))
                .expect("inside root");
            disposer
        });

        disposer.dispose();

        assert_eq!(*faults.borrow(), vec!["boom".to_string()]);
        assert!(survivor.get());
    }

    #[test]
    fn independent_runtimes_do_not_interfere() {
        let rt_a = Runtime::new();
        let rt_b = Runtime::new();

        let s_a = rt_a.signal(0);
        let runs_b = Rc::new(Cell::new(0));

        let s_b = rt_b.signal(0);
        let s_b_reader = s_b.clone();
        let runs_b_effect = runs_b.clone();
        rt_b.effect(move || {
            runs_b_effect.set(runs_b_effect.get() + 1);
            s_b_reader.get();
        });

        s_a.set(1);
        assert_eq!(runs_b.get(), 1);
    }
}
