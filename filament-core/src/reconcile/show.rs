//! Conditional Block
//!
//! `show` gates a rendered block on a reactive boolean. The content appears
//! when the condition flips to true and is torn down when it flips back;
//! re-evaluations that do not change the boolean leave the block untouched.
//!
//! The block's content lives in its own root scope, so effects created while
//! rendering survive re-evaluations of the condition and die exactly when
//! the block is removed.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::reactive::{Disposer, Runtime};

use super::{clear_between, Adapter};

/// Mount a boolean-gated block immediately after `anchor`.
///
/// `when` is tracked: any signal it reads re-evaluates the gate. `render` is
/// called once per `false -> true` transition and must return the nodes to
/// insert, already created through the adapter. There is no fine-grained
/// update of shown content across `when` re-evaluations; renderers that want
/// that create their own effects inside `render`.
///
/// When `show` is called inside a reactive scope, that scope owns the block:
/// disposing it clears the content and removes the markers. Outside any
/// scope the block lives for the runtime's lifetime.
pub fn show<A>(
    runtime: &Runtime,
    adapter: &A,
    anchor: &A::Node,
    when: impl Fn() -> bool + 'static,
    render: impl Fn(&A) -> Vec<A::Node> + 'static,
) where
    A: Adapter,
{
    let start = adapter.create_marker();
    let end = adapter.create_marker();
    adapter.insert_after(anchor, &[start.clone(), end.clone()]);

    let previous: Rc<Cell<Option<bool>>> = Rc::new(Cell::new(None));
    let scope: Rc<RefCell<Option<Disposer>>> = Rc::new(RefCell::new(None));

    let rt = runtime.clone();
    let adapter_effect = adapter.clone();
    let start_effect = start.clone();
    let end_effect = end.clone();
    let scope_effect = Rc::clone(&scope);
    runtime.effect(move || {
        let next = when();
        if previous.get() == Some(next) {
            return;
        }
        previous.set(Some(next));

        let old = scope_effect.borrow_mut().take();
        if let Some(old) = old {
            old.dispose();
        }
        clear_between(&adapter_effect, &start_effect, &end_effect);

        if next {
            let (nodes, disposer) = rt.create_root(|disposer| {
                let nodes = render(&adapter_effect);
                (nodes, disposer)
            });
            adapter_effect.insert_after(&start_effect, &nodes);
            *scope_effect.borrow_mut() = Some(disposer);
        }
    });

    let adapter_teardown = adapter.clone();
    let scope_teardown = Rc::clone(&scope);
    let _ = runtime.on_cleanup(move || {
        let old = scope_teardown.borrow_mut().take();
        if let Some(old) = old {
            old.dispose();
        }
        clear_between(&adapter_teardown, &start, &end);
        adapter_teardown.remove(&start);
        adapter_teardown.remove(&end);
    });
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
