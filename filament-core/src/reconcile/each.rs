//! List Reconcilers
//!
//! `each` keeps a rendered block per list item, keyed by a caller-supplied
//! key function, and reconciles by moving surviving blocks instead of
//! recreating them.
//!
//! # How It Works
//!
//! 1. Every block is delimited by its own pair of marker nodes and rendered
//!    into its own root scope.
//!
//! 2. On each pass, a cursor walks the target sequence in the new list
//!    order. A key with an existing block moves that block's whole range to
//!    the cursor (a no-op when it is already in place); a new key renders a
//!    fresh block at the cursor.
//!
//! 3. Keys absent from the new list are swept afterwards: their scopes are
//!    disposed and their ranges detached.
//!
//! 4. A shared key-to-index signal is rebuilt every pass, so renderers that
//!    read their position through [`ItemIndex`] inside an effect see
//!    reorders without their block re-rendering.
//!
//! `each_unkeyed` is the blunt fallback: when the new list differs from the
//! previous one at all, every block is disposed and re-rendered.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::reactive::{Disposer, Runtime, Signal};

use super::{clear_between, move_range_after, Adapter};

/// A reactive accessor for one item's current position in a keyed list.
///
/// Reading it inside an effect subscribes that effect to reorders; the
/// block itself does not re-render when only positions change.
pub struct ItemIndex<K: Clone + Eq + Hash + 'static> {
    positions: Signal<HashMap<K, usize>>,
    key: K,
}

impl<K: Clone + Eq + Hash + 'static> ItemIndex<K> {
    /// The item's position, tracked. Returns 0 for a key that has already
    /// been swept.
    pub fn get(&self) -> usize {
        let key = self.key.clone();
        self.positions
            .with(move |map| map.get(&key).copied().unwrap_or(0))
    }

    /// The item's position, untracked.
    pub fn get_untracked(&self) -> usize {
        let key = self.key.clone();
        self.positions
            .with_untracked(move |map| map.get(&key).copied().unwrap_or(0))
    }
}

impl<K: Clone + Eq + Hash + 'static> Clone for ItemIndex<K> {
    fn clone(&self) -> Self {
        Self {
            positions: self.positions.clone(),
            key: self.key.clone(),
        }
    }
}

/// One keyed block: its delimiting markers and the scope its content
/// lives in.
struct Block<N> {
    start: N,
    end: N,
    scope: Disposer,
}

/// Mount a keyed list immediately after `anchor`.
///
/// `items` is tracked; `key` must be injective over one list (a duplicate
/// key is skipped with a warning, first occurrence wins). `render` receives
/// the adapter, the item, and an [`ItemIndex`] handle, and returns the nodes
/// of the block's content; it runs once per key's lifetime, not per pass.
///
/// When `each` is called inside a reactive scope, that scope owns the list:
/// disposing it tears down every block and removes the outer markers.
pub fn each<A, T, K>(
    runtime: &Runtime,
    adapter: &A,
    anchor: &A::Node,
    items: impl Fn() -> Vec<T> + 'static,
    key: impl Fn(&T) -> K + 'static,
    render: impl Fn(&A, &T, ItemIndex<K>) -> Vec<A::Node> + 'static,
) where
    A: Adapter,
    T: Clone + 'static,
    K: Clone + Eq + Hash + Debug + 'static,
{
    let start = adapter.create_marker();
    let end = adapter.create_marker();
    adapter.insert_after(anchor, &[start.clone(), end.clone()]);

    let blocks: Rc<RefCell<IndexMap<K, Block<A::Node>>>> =
        Rc::new(RefCell::new(IndexMap::new()));
    let positions: Signal<HashMap<K, usize>> = runtime.signal(HashMap::new());

    let rt = runtime.clone();
    let adapter_effect = adapter.clone();
    let start_effect = start.clone();
    let blocks_effect = Rc::clone(&blocks);
    let positions_effect = positions.clone();
    runtime.effect(move || {
        let list = items();

        let mut entries: Vec<(K, T)> = Vec::with_capacity(list.len());
        let mut seen: HashSet<K> = HashSet::with_capacity(list.len());
        for item in list {
            let k = key(&item);
            if !seen.insert(k.clone()) {
                tracing::warn!(key = ?k, "duplicate key in keyed list, skipping");
                continue;
            }
            entries.push((k, item));
        }

        // Positions first, so index readers observe the new order even when
        // no block moves.
        positions_effect.set(
            entries
                .iter()
                .enumerate()
                .map(|(i, (k, _))| (k.clone(), i))
                .collect(),
        );

        let mut cursor = start_effect.clone();
        for (k, item) in &entries {
            let existing = blocks_effect
                .borrow()
                .get(k)
                .map(|block| (block.start.clone(), block.end.clone()));
            match existing {
                Some((block_start, block_end)) => {
                    move_range_after(&adapter_effect, &cursor, &block_start, &block_end);
                    cursor = block_end;
                }
                None => {
                    let block_start = adapter_effect.create_marker();
                    let block_end = adapter_effect.create_marker();
                    let index = ItemIndex {
                        positions: positions_effect.clone(),
                        key: k.clone(),
                    };
                    let (nodes, scope) = rt.create_root(|disposer| {
                        let nodes = render(&adapter_effect, item, index);
                        (nodes, disposer)
                    });
                    let mut range = Vec::with_capacity(nodes.len() + 2);
                    range.push(block_start.clone());
                    range.extend(nodes);
                    range.push(block_end.clone());
                    adapter_effect.insert_after(&cursor, &range);
                    blocks_effect.borrow_mut().insert(
                        k.clone(),
                        Block {
                            start: block_start,
                            end: block_end.clone(),
                            scope,
                        },
                    );
                    cursor = block_end;
                }
            }
        }

        let dead: Vec<K> = blocks_effect
            .borrow()
            .keys()
            .filter(|k| !seen.contains(*k))
            .cloned()
            .collect();
        for k in dead {
            let block = blocks_effect
                .borrow_mut()
                .shift_remove(&k)
                .expect("swept key has a block");
            block.scope.dispose();
            clear_between(&adapter_effect, &block.start, &block.end);
            adapter_effect.remove(&block.start);
            adapter_effect.remove(&block.end);
        }
    });

    let adapter_teardown = adapter.clone();
    let blocks_teardown = Rc::clone(&blocks);
    let _ = runtime.on_cleanup(move || {
        let drained: Vec<Block<A::Node>> = blocks_teardown
            .borrow_mut()
            .drain(..)
            .map(|(_, block)| block)
            .collect();
        for block in drained {
            block.scope.dispose();
            clear_between(&adapter_teardown, &block.start, &block.end);
            adapter_teardown.remove(&block.start);
            adapter_teardown.remove(&block.end);
        }
        adapter_teardown.remove(&start);
        adapter_teardown.remove(&end);
    });
}

/// Mount an unkeyed list immediately after `anchor`.
///
/// When the new list is element-wise equal to the previous one, nothing
/// happens. Otherwise every block is disposed and the whole range is
/// re-rendered in order.
pub fn each_unkeyed<A, T>(
    runtime: &Runtime,
    adapter: &A,
    anchor: &A::Node,
    items: impl Fn() -> Vec<T> + 'static,
    render: impl Fn(&A, &T, usize) -> Vec<A::Node> + 'static,
) where
    A: Adapter,
    T: Clone + PartialEq + 'static,
{
    let start = adapter.create_marker();
    let end = adapter.create_marker();
    adapter.insert_after(anchor, &[start.clone(), end.clone()]);

    let previous: Rc<RefCell<Option<Vec<T>>>> = Rc::new(RefCell::new(None));
    let scopes: Rc<RefCell<Vec<Disposer>>> = Rc::new(RefCell::new(Vec::new()));

    let rt = runtime.clone();
    let adapter_effect = adapter.clone();
    let start_effect = start.clone();
    let end_effect = end.clone();
    let scopes_effect = Rc::clone(&scopes);
    runtime.effect(move || {
        let list = items();
        if previous.borrow().as_deref() == Some(list.as_slice()) {
            return;
        }
        *previous.borrow_mut() = Some(list.clone());

        let old_scopes = std::mem::take(&mut *scopes_effect.borrow_mut());
        for scope in old_scopes {
            scope.dispose();
        }
        clear_between(&adapter_effect, &start_effect, &end_effect);

        let mut cursor = start_effect.clone();
        for (i, item) in list.iter().enumerate() {
            let (nodes, scope) = rt.create_root(|disposer| {
                let nodes = render(&adapter_effect, item, i);
                (nodes, disposer)
            });
            adapter_effect.insert_after(&cursor, &nodes);
            if let Some(last) = nodes.last() {
                cursor = last.clone();
            }
            scopes_effect.borrow_mut().push(scope);
        }
    });

    let adapter_teardown = adapter.clone();
    let scopes_teardown = Rc::clone(&scopes);
    let _ = runtime.on_cleanup(move || {
        let old_scopes = std::mem::take(&mut *scopes_teardown.borrow_mut());
        for scope in old_scopes {
            scope.dispose();
        }
        clear_between(&adapter_teardown, &start, &end);
        adapter_teardown.remove(&start);
        adapter_teardown.remove(&end);
    });
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
