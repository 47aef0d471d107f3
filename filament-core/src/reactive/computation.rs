//! Computation Internals
//!
//! A Computation is one unit of reactive work: the body of an effect, the
//! driver behind a memo, or the implicit body of a root scope. It records
//! which signals were read during its last run and owns everything created
//! during that run.
//!
//! # Ownership
//!
//! Each computation carries an ordered sequence of owned items: cleanup
//! callbacks and child computations, in registration order. Re-running a
//! computation drains that sequence first (the previous run's cleanups fire
//! before the new body executes), and disposal drains it once and for all.
//! Disposal of a child is a depth-first walk of the same structure.
//!
//! # Dependencies
//!
//! Dependencies are rebuilt from scratch on every run: before the body
//! executes, the computation removes itself from every signal it subscribed
//! to last time. A signal read inside the body re-establishes the edge. This
//! is what makes conditionally-read signals unsubscribe automatically.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

/// Unique identifier for a computation.
///
/// Uses an atomic counter so identifiers stay unique even across independent
/// runtimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ComputationId(u64);

impl ComputationId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Anything a computation can subscribe to.
///
/// Implemented by the inner cell of every `Signal<T>`; the computation only
/// needs the edge back for pruning, so the value type is erased.
pub(crate) trait Source {
    /// Drop the subscription edge for the given computation, if present.
    fn unsubscribe(&self, id: ComputationId);
}

/// One item in a computation's owned sequence.
pub(crate) enum Owned {
    /// A cleanup callback registered with `on_cleanup`.
    Cleanup(Box<dyn FnOnce()>),
    /// A nested computation created while this one was tracking.
    Child(Rc<Computation>),
}

/// A unit of reactive work with a dependency set and an owned sequence.
pub(crate) struct Computation {
    id: ComputationId,

    /// The body to execute on each run. Roots have no body and never re-run.
    action: Option<Box<dyn Fn()>>,

    /// Weak edges back to the signals read during the last run.
    /// Weak so a dropped signal never pins its readers.
    dependencies: RefCell<SmallVec<[Weak<dyn Source>; 4]>>,

    /// Cleanups and child computations, in registration order.
    owned: RefCell<Vec<Owned>>,

    disposed: Cell<bool>,
}

impl Computation {
    /// Create a computation with a body (an effect or a memo driver).
    pub(crate) fn new(action: Box<dyn Fn()>) -> Self {
        Self {
            id: ComputationId::next(),
            action: Some(action),
            dependencies: RefCell::new(SmallVec::new()),
            owned: RefCell::new(Vec::new()),
            disposed: Cell::new(false),
        }
    }

    /// Create a root scope: no body, never enqueued, disposed explicitly.
    pub(crate) fn root() -> Self {
        Self {
            id: ComputationId::next(),
            action: None,
            dependencies: RefCell::new(SmallVec::new()),
            owned: RefCell::new(Vec::new()),
            disposed: Cell::new(false),
        }
    }

    pub(crate) fn id(&self) -> ComputationId {
        self.id
    }

    pub(crate) fn is_root(&self) -> bool {
        self.action.is_none()
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    /// Mark disposed; returns the previous value so disposal is idempotent.
    pub(crate) fn mark_disposed(&self) -> bool {
        self.disposed.replace(true)
    }

    /// Record an edge to a signal read during the current run.
    pub(crate) fn add_dependency(&self, source: Weak<dyn Source>) {
        self.dependencies.borrow_mut().push(source);
    }

    /// Remove this computation from every signal it subscribed to.
    pub(crate) fn clear_dependencies(&self) {
        let dependencies = std::mem::take(&mut *self.dependencies.borrow_mut());
        for dependency in dependencies {
            if let Some(source) = dependency.upgrade() {
                source.unsubscribe(self.id);
            }
        }
    }

    /// Adopt a nested computation into the owned sequence.
    pub(crate) fn adopt(&self, child: Rc<Computation>) {
        self.owned.borrow_mut().push(Owned::Child(child));
    }

    /// Append a cleanup callback to the owned sequence.
    pub(crate) fn push_cleanup(&self, cleanup: Box<dyn FnOnce()>) {
        self.owned.borrow_mut().push(Owned::Cleanup(cleanup));
    }

    /// Take the whole owned sequence, leaving it empty.
    ///
    /// Items registered while the taken sequence is being drained land in the
    /// fresh one, which is exactly what a re-run needs.
    pub(crate) fn take_owned(&self) -> Vec<Owned> {
        std::mem::take(&mut *self.owned.borrow_mut())
    }

    /// Execute the body, if any.
    pub(crate) fn run_action(&self) {
        if let Some(action) = &self.action {
            action();
        }
    }
}

impl std::fmt::Debug for Computation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computation")
            .field("id", &self.id)
            .field("root", &self.is_root())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
