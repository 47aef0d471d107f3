//! Filament Core
//!
//! This crate provides the core runtime for the Filament reactive UI
//! framework. It implements:
//!
//! - Reactive primitives (signals, memos, effects)
//! - A synchronous batching scheduler with automatic dependency tracking
//! - An ownership tree for scoped cleanup and disposal
//! - Structural reconciliation over an externally-owned node sequence
//!
//! There is no virtual-tree diff pass: signal writes re-run exactly the
//! computations that read them, and the reconcilers mutate the live output
//! structure in place through a narrow adapter trait.
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - `reactive`: signals, memos, effects, the runtime, and scope disposal
//! - `reconcile`: the adapter boundary plus the `show` and `each` primitives
//!
//! # Example
//!
//! ```rust,ignore
//! use filament_core::{Runtime, reconcile::{each, MemorySequence}};
//!
//! let rt = Runtime::new();
//! let seq = MemorySequence::new();
//! let items = rt.signal(vec![1, 2, 3]);
//!
//! let items_reader = items.clone();
//! each(
//!     &rt,
//!     &seq,
//!     &seq.anchor(),
//!     move || items_reader.get(),
//!     |item| *item,
//!     |seq, _item, _index| vec![seq.create_node()],
//! );
//!
//! // Reordering moves the existing blocks; nothing re-renders.
//! items.set(vec![3, 1, 2]);
//! ```

pub mod reactive;
pub mod reconcile;

pub use reactive::{CleanupFault, Disposer, Memo, Runtime, ScopeError, Signal};
