//! Structural Reconciliation
//!
//! This module applies reactive output to an ordered sequence of
//! externally-owned nodes, without a virtual-tree diff pass. Two primitives
//! do the work:
//!
//! - [`show`] — a boolean-gated block: rendered content appears on
//!   `false -> true` and is torn down on `true -> false`.
//! - [`each`] / [`each_unkeyed`] — list reconcilers. The keyed form moves
//!   surviving blocks instead of recreating them; the unkeyed form disposes
//!   and fully re-renders when the list changes at all.
//!
//! Both delimit their output with invisible marker nodes, so the embedder's
//! sequence can hold unrelated content on either side. All mutation goes
//! through the [`Adapter`] trait; the reconcilers never assume a concrete
//! node representation.

mod adapter;
mod each;
mod show;

pub use adapter::{Adapter, MemorySequence, NodeId};
pub use each::{each, each_unkeyed, ItemIndex};
pub use show::show;

/// Dispose and detach every node strictly between `start` and `end`.
///
/// The markers themselves stay attached.
pub fn clear_between<A: Adapter>(adapter: &A, start: &A::Node, end: &A::Node) {
    let mut doomed = Vec::new();
    let mut cursor = adapter.next_sibling(start);
    while let Some(node) = cursor {
        if node == *end {
            break;
        }
        cursor = adapter.next_sibling(&node);
        doomed.push(node);
    }
    for node in doomed {
        adapter.dispose(&node);
        adapter.remove(&node);
    }
}

/// Move the inclusive range `start..=end` to sit immediately after `cursor`.
///
/// A range already in position is left untouched.
pub fn move_range_after<A: Adapter>(adapter: &A, cursor: &A::Node, start: &A::Node, end: &A::Node) {
    if adapter.next_sibling(cursor).as_ref() == Some(start) {
        return;
    }
    let range = adapter.extract_range(start, end);
    adapter.insert_after(cursor, &range);
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
