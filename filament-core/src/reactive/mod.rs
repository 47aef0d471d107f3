//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, memos, effects,
//! and the runtime that schedules them. These primitives form the foundation
//! of Filament's fine-grained reactivity.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! while a computation is tracking (inside a memo or effect body), the signal
//! automatically registers that computation as a subscriber. When the value
//! changes, subscribers re-run synchronously, before the write returns.
//!
//! ## Memos
//!
//! A Memo is a derived value that caches its result and notifies its own
//! readers only when the result actually changed. Memos decouple readers
//! from the raw inputs of a computation.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs once eagerly and again
//! whenever its dependencies change. Effects synchronize reactive state with
//! external systems, such as a rendered node tree.
//!
//! ## Ownership
//!
//! Every computation owns what it creates: cleanups and nested computations
//! registered during a run are drained, in order, before the next run and on
//! disposal. `Runtime::create_root` opens an explicit disposal boundary.
//!
//! # Implementation Notes
//!
//! Dependency detection is automatic: the runtime keeps at most one "current"
//! tracking computation, and every signal read consults it. Dependencies are
//! rebuilt from scratch on each run, so conditionally-read signals
//! unsubscribe without any bookkeeping by the caller. The whole system is
//! single-threaded; state lives in `Rc`/`RefCell` inside one `Runtime`.

mod computation;
mod memo;
mod runtime;
mod signal;

pub use memo::Memo;
pub use runtime::{CleanupFault, Disposer, Runtime, ScopeError};
pub use signal::Signal;
