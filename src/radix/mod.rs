//! `RadixMap`: a compressed prefix tree keyed by `&str`, supporting point
//! lookup, prefix-subtree views, and bounded-edit-distance (fuzzy) lookup.
//!
//! This is the term dictionary underneath [`crate::inverted_index::InvertedIndex`],
//! but it has no dependency on anything search-specific and is usable as a
//! standalone ordered string map.

mod fuzzy;
mod node;

use node::Node;
use std::cell::Cell;
use std::collections::HashMap;

pub use node::common_prefix_len;

/// A compressed (Patricia-style) prefix tree.
///
/// No node has exactly one child that is itself an interior, valueless
/// node (such chains are collapsed into a single edge), and no two
/// sibling edges share a first byte. These invariants hold after every
/// `set`/`delete`, including ones performed through a [`RadixView`].
pub struct RadixMap<V> {
    root: Node<V>,
    size: Cell<Option<usize>>,
}

impl<V> Default for RadixMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> RadixMap<V> {
    pub fn new() -> Self {
        Self {
            root: Node::empty(),
            size: Cell::new(Some(0)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.root.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.root.get_mut(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.root.has(key)
    }

    pub fn set(&mut self, key: &str, value: V) {
        let node = self.root.descend_for_write(key);
        if node.value.is_none() {
            self.bump_size(1);
        }
        node.value = Some(value);
    }

    /// Fetches the current value at `key` (or `None`), calls `f` with it,
    /// and stores whatever `f` returns.
    pub fn update<F>(&mut self, key: &str, f: F)
    where
        F: FnOnce(Option<V>) -> V,
    {
        let node = self.root.descend_for_write(key);
        let was_present = node.value.is_some();
        let current = node.value.take();
        node.value = Some(f(current));
        if !was_present {
            self.bump_size(1);
        }
    }

    /// Returns a mutable handle to the value at `key`, inserting
    /// `init()`'s result first if the key is absent.
    pub fn fetch<F>(&mut self, key: &str, init: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        let node = self.root.descend_for_write(key);
        let was_present = node.value.is_some();
        if !was_present {
            self.bump_size(1);
        }
        node.value.get_or_insert_with(init)
    }

    /// Removes `key`, restoring the radix invariants. Returns whether a
    /// value was actually present.
    pub fn delete(&mut self, key: &str) -> bool {
        let removed = self.root.delete(key);
        if removed {
            self.bump_size(-1);
        }
        removed
    }

    pub fn len(&self) -> usize {
        match self.size.get() {
            Some(n) => n,
            None => {
                let n = self.root.count_entries();
                self.size.set(Some(n));
                n
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entries(&self) -> Vec<(String, &V)> {
        let mut out = Vec::new();
        self.root.collect_entries("", &mut out);
        out
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries().into_iter().map(|(k, _)| k).collect()
    }

    pub fn values(&self) -> Vec<&V> {
        self.entries().into_iter().map(|(_, v)| v).collect()
    }

    /// Every key within `max_distance` of `key`, with its true minimum
    /// Levenshtein distance. Exactly one entry per matching key.
    pub fn fuzzy_get(&self, key: &str, max_distance: usize) -> HashMap<String, (&V, usize)> {
        fuzzy::collect(&self.root, key, max_distance)
    }

    /// A mutable view of the subtree whose keys all start with `prefix`.
    /// Keys passed to the view's own `get`/`set`/`fetch`/`delete` are
    /// relative to `prefix`; `entries`/`keys` reconstruct full keys. The
    /// view is empty (but still usable for writes) if no key currently
    /// starts with `prefix`.
    pub fn at_prefix<'a>(&'a mut self, prefix: &str) -> RadixView<'a, V> {
        let size_cell = &self.size;
        let inner = locate(&mut self.root, prefix);
        RadixView {
            inner: Some(inner),
            prefix: prefix.to_owned(),
            size_cell,
        }
    }

    fn invalidate_size(&self) {
        self.size.set(None);
    }

    fn bump_size(&self, delta: isize) {
        if let Some(n) = self.size.get() {
            let updated = (n as isize) + delta;
            self.size.set(Some(updated.max(0) as usize));
        }
    }
}

enum ViewInner<'a, V> {
    /// The view's root is exactly this real node.
    Node(&'a mut Node<V>),
    /// The view's conceptual root lies `offset` bytes into
    /// `parent.children[idx]`'s edge label. Reads delegate straight to
    /// that child (the unconsumed label suffix can't branch); a write
    /// first splits the edge at `offset` to materialize a real node.
    Partial {
        parent: &'a mut Node<V>,
        idx: usize,
        offset: usize,
    },
    /// No key currently starts with this prefix. `anchor` is the nearest
    /// real ancestor node; `remaining` is the full suffix, relative to
    /// `anchor`, a write would need to create (equivalent to what
    /// `anchor.descend_for_write` would have done had the mismatch not
    /// stopped the descent).
    Empty {
        anchor: &'a mut Node<V>,
        remaining: String,
    },
}

/// Descends from `node` following `rem` through existing edges only (never
/// restructuring the tree), stopping at the node the prefix resolves to.
fn locate<'a, V>(node: &'a mut Node<V>, rem: &str) -> ViewInner<'a, V> {
    if rem.is_empty() {
        return ViewInner::Node(node);
    }

    let first = rem.as_bytes()[0];
    let idx = match node
        .children
        .binary_search_by_key(&first, |e| e.label.as_bytes()[0])
    {
        Ok(idx) => idx,
        Err(_) => {
            return ViewInner::Empty {
                anchor: node,
                remaining: rem.to_owned(),
            }
        }
    };

    let label_len = node.children[idx].label.len();
    let common = node::common_prefix_len(&node.children[idx].label, rem);

    if common < label_len && common < rem.len() {
        return ViewInner::Empty {
            anchor: node,
            remaining: rem.to_owned(),
        };
    }
    if common < label_len {
        // common == rem.len(): rem is a strict, non-empty prefix of the edge label.
        return ViewInner::Partial {
            parent: node,
            idx,
            offset: common,
        };
    }

    let child = &mut node.children[idx].node;
    locate(child, &rem[label_len..])
}

/// A mutable view of a `RadixMap` restricted to keys sharing a prefix.
/// Aliases the underlying storage: reads and writes made through the view
/// are visible through (and mutate) the map it was taken from.
pub struct RadixView<'a, V> {
    inner: Option<ViewInner<'a, V>>,
    prefix: String,
    size_cell: &'a Cell<Option<usize>>,
}

impl<'a, V> RadixView<'a, V> {
    /// If the view doesn't yet sit on a real node, performs whatever real
    /// tree surgery (edge split, or fresh descent from the nearest
    /// ancestor) is needed so it does. A no-op once already materialized.
    fn materialize(&mut self) {
        let inner = self.inner.take().expect("inner is always present");
        self.inner = Some(match inner {
            ViewInner::Partial {
                parent,
                idx,
                offset,
            } => {
                parent.split_edge(idx, offset);
                ViewInner::Node(&mut parent.children[idx].node)
            }
            ViewInner::Empty { anchor, remaining } => {
                ViewInner::Node(anchor.descend_for_write(&remaining))
            }
            node @ ViewInner::Node(_) => node,
        });
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        match self.inner.as_ref().unwrap() {
            ViewInner::Node(node) => node.get(key),
            ViewInner::Empty { .. } => None,
            ViewInner::Partial { parent, idx, .. } => parent.children[*idx].node.get(key),
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn set(&mut self, key: &str, value: V) {
        self.materialize();
        self.size_cell.set(None);
        if let Some(ViewInner::Node(node)) = &mut self.inner {
            node.descend_for_write(key).value = Some(value);
        }
    }

    pub fn fetch<F>(&mut self, key: &str, init: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        self.materialize();
        self.size_cell.set(None);
        match &mut self.inner {
            Some(ViewInner::Node(node)) => node.descend_for_write(key).value.get_or_insert_with(init),
            _ => unreachable!("materialize always produces ViewInner::Node"),
        }
    }

    pub fn delete(&mut self, key: &str) -> bool {
        let removed = match self.inner.as_mut().unwrap() {
            ViewInner::Node(node) => node.delete(key),
            ViewInner::Empty { .. } => false,
            ViewInner::Partial { parent, idx, .. } => parent.children[*idx].node.delete(key),
        };
        if removed {
            self.size_cell.set(None);
        }
        removed
    }

    /// Narrows the view further. `prefix` must start with the view's own
    /// already-accumulated prefix.
    pub fn at_prefix(self, prefix: &str) -> Result<RadixView<'a, V>, crate::error::SearchError> {
        if !prefix.starts_with(&self.prefix) {
            return Err(crate::error::SearchError::InvalidPrefix);
        }
        let local_rem = &prefix[self.prefix.len()..];

        let inner = match self.inner.unwrap() {
            ViewInner::Empty { anchor, remaining } => ViewInner::Empty {
                anchor,
                remaining: remaining + local_rem,
            },
            ViewInner::Node(node) => locate(node, local_rem),
            ViewInner::Partial {
                parent,
                idx,
                offset,
            } => {
                let full_label = parent.children[idx].label.clone();
                let remaining_label = &full_label[offset..];
                let common = node::common_prefix_len(remaining_label, local_rem);

                if common == remaining_label.len() && common == local_rem.len() {
                    ViewInner::Node(&mut parent.children[idx].node)
                } else if common == remaining_label.len() {
                    let child = &mut parent.children[idx].node;
                    locate(child, &local_rem[common..])
                } else if common == local_rem.len() {
                    ViewInner::Partial {
                        parent,
                        idx,
                        offset: offset + common,
                    }
                } else {
                    let reconstructed = format!("{}{}", &full_label[..offset], local_rem);
                    ViewInner::Empty {
                        anchor: parent,
                        remaining: reconstructed,
                    }
                }
            }
        };

        Ok(RadixView {
            inner: Some(inner),
            prefix: prefix.to_owned(),
            size_cell: self.size_cell,
        })
    }

    pub fn entries(&self) -> Vec<(String, &V)> {
        let mut out = Vec::new();
        match self.inner.as_ref().unwrap() {
            ViewInner::Node(node) => node.collect_entries("", &mut out),
            ViewInner::Empty { .. } => {}
            ViewInner::Partial { parent, idx, .. } => {
                parent.children[*idx].node.collect_entries("", &mut out)
            }
        }
        out.into_iter()
            .map(|(suffix, v)| (format!("{}{}", self.prefix, suffix), v))
            .collect()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries().into_iter().map(|(k, _)| k).collect()
    }

    pub fn values(&self) -> Vec<&V> {
        self.entries().into_iter().map(|(_, v)| v).collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_roundtrips() {
        let mut map = RadixMap::new();
        map.set("hello", 1);
        assert_eq!(map.get("hello"), Some(&1));
        assert_eq!(map.get("hell"), None);
    }

    #[test]
    fn set_then_delete_removes_value() {
        let mut map = RadixMap::new();
        map.set("hello", 1);
        assert!(map.delete("hello"));
        assert_eq!(map.get("hello"), None);
        assert!(!map.delete("hello"));
    }

    #[test]
    fn shared_prefixes_split_and_merge_edges() {
        let mut map = RadixMap::new();
        map.set("test", 1);
        map.set("testing", 2);
        map.set("tester", 3);

        assert_eq!(map.get("test"), Some(&1));
        assert_eq!(map.get("testing"), Some(&2));
        assert_eq!(map.get("tester"), Some(&3));
        assert_eq!(map.len(), 3);

        assert!(map.delete("testing"));
        assert_eq!(map.get("test"), Some(&1));
        assert_eq!(map.get("tester"), Some(&3));
        assert_eq!(map.get("testing"), None);
        assert_eq!(map.len(), 2);

        assert!(map.delete("tester"));
        assert!(map.delete("test"));
        assert_eq!(map.len(), 0);
    }

    #[test]
    fn fetch_inserts_default_and_returns_mutable_handle() {
        let mut map: RadixMap<Vec<i32>> = RadixMap::new();
        map.fetch("k", Vec::new).push(1);
        map.fetch("k", Vec::new).push(2);
        assert_eq!(map.get("k"), Some(&vec![1, 2]));
    }

    #[test]
    fn at_prefix_exact_node_match() {
        let mut map = RadixMap::new();
        for key in ["summer", "summertime", "sum"] {
            map.set(key, key.to_owned());
        }

        let view = map.at_prefix("summer");
        let mut keys = view.keys();
        keys.sort();
        assert_eq!(keys, vec!["summer".to_owned(), "summertime".to_owned()]);
    }

    #[test]
    fn at_prefix_mid_edge() {
        let mut map = RadixMap::new();
        for key in ["summer", "summertime", "sum"] {
            map.set(key, key.to_owned());
        }

        let view = map.at_prefix("su");
        let mut keys = view.keys();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "sum".to_owned(),
                "summer".to_owned(),
                "summertime".to_owned()
            ]
        );
    }

    #[test]
    fn at_prefix_no_match_is_empty_but_writable() {
        let mut map = RadixMap::new();
        map.set("hello", 1);

        let mut view = map.at_prefix("zzz");
        assert!(view.is_empty());
        // keys passed to the view are relative to its prefix.
        view.set("top", 42);
        drop(view);
        assert_eq!(map.get("zzztop"), Some(&42));
    }

    #[test]
    fn writes_through_mid_edge_view_preserve_invariants() {
        let mut map = RadixMap::new();
        for key in ["summer", "summertime"] {
            map.set(key, key.to_owned());
        }

        {
            // prefix "su" sits inside the "summer" edge; relative key
            // "mmertide" reaches the full key "summertide".
            let mut view = map.at_prefix("su");
            view.set("mmertide", "summertide".to_owned());
        }

        assert_eq!(map.get("summer"), Some(&"summer".to_owned()));
        assert_eq!(map.get("summertime"), Some(&"summertime".to_owned()));
        assert_eq!(map.get("summertide"), Some(&"summertide".to_owned()));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn prefix_view_matches_filter_over_all_keys() {
        let mut map = RadixMap::new();
        for key in ["apple", "app", "application", "apt", "banana"] {
            map.set(key, ());
        }

        let mut via_view = map.at_prefix("app").keys();
        via_view.sort();

        let mut via_filter: Vec<String> = map
            .keys()
            .into_iter()
            .filter(|k| k.starts_with("app"))
            .collect();
        via_filter.sort();

        assert_eq!(via_view, via_filter);
    }
}
