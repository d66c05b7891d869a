//! The radix tree node representation shared by `RadixMap` and `RadixView`.
//!
//! Each node holds a set of outgoing edges, sorted by the first byte of
//! their label so lookups can binary-search instead of scanning. Edge
//! labels are never empty, and a node's children never share a first byte
//! (the sibling invariant); chains of single-child, valueless nodes are
//! collapsed as edges split and merge (the collapse invariant).

pub struct Edge<V> {
    pub label: String,
    pub node: Node<V>,
}

pub struct Node<V> {
    pub children: Vec<Edge<V>>,
    pub value: Option<V>,
}

impl<V> Node<V> {
    pub fn empty() -> Self {
        Self {
            children: Vec::new(),
            value: None,
        }
    }

    fn child_index(&self, first_byte: u8) -> Result<usize, usize> {
        self.children
            .binary_search_by_key(&first_byte, |edge| edge.label.as_bytes()[0])
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        if key.is_empty() {
            return self.value.as_ref();
        }

        let idx = self.child_index(key.as_bytes()[0]).ok()?;
        let edge = &self.children[idx];
        let rest = key.strip_prefix(edge.label.as_str())?;
        edge.node.get(rest)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        if key.is_empty() {
            return self.value.as_mut();
        }

        let idx = self.child_index(key.as_bytes()[0]).ok()?;
        let edge = &mut self.children[idx];
        if !key.starts_with(edge.label.as_str()) {
            return None;
        }
        let rest = &key[edge.label.len()..];
        edge.node.get_mut(rest)
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Descends to (creating as necessary) the node that should hold `key`'s
    /// value, splitting edges along the way so the radix invariants hold
    /// once a value or further children are attached at the returned node.
    pub fn descend_for_write(&mut self, key: &str) -> &mut Node<V> {
        if key.is_empty() {
            return self;
        }

        let first = key.as_bytes()[0];
        match self.child_index(first) {
            Ok(idx) => {
                let label_len = self.children[idx].label.len();
                let common = common_prefix_len(&self.children[idx].label, key);
                if common < label_len {
                    self.split_edge(idx, common);
                }
                self.children[idx].node.descend_for_write(&key[common..])
            }
            Err(idx) => {
                self.children.insert(
                    idx,
                    Edge {
                        label: key.to_owned(),
                        node: Node::empty(),
                    },
                );
                &mut self.children[idx].node
            }
        }
    }

    /// Splits `children[idx]`'s edge at byte offset `at`, inserting an
    /// intermediate, valueless node that owns the original child under the
    /// label suffix. `at` must be a char boundary strictly within the
    /// current label.
    pub fn split_edge(&mut self, idx: usize, at: usize) {
        let edge = &mut self.children[idx];
        let old_label = std::mem::take(&mut edge.label);
        let (prefix, suffix) = old_label.split_at(at);
        let old_child = std::mem::replace(&mut edge.node, Node::empty());

        edge.label = prefix.to_owned();
        edge.node.children.push(Edge {
            label: suffix.to_owned(),
            node: old_child,
        });
    }

    /// Removes `key` from this subtree, returning whether a value was
    /// actually removed, and restoring the radix invariants on the way
    /// back up (pruning empty children, merging single-child chains).
    pub fn delete(&mut self, key: &str) -> bool {
        if key.is_empty() {
            return self.value.take().is_some();
        }

        let idx = match self.child_index(key.as_bytes()[0]) {
            Ok(idx) => idx,
            Err(_) => return false,
        };

        let (matches_prefix, label_len) = {
            let label = self.children[idx].label.as_str();
            (key.starts_with(label), label.len())
        };
        if !matches_prefix {
            return false;
        }

        let removed = self.children[idx].node.delete(&key[label_len..]);
        if removed {
            self.repair_child(idx);
        }
        removed
    }

    /// After a deletion beneath `children[idx]`, restores the invariants:
    /// prune the child if it is now a dead leaf, or merge it into its own
    /// single remaining grandchild if it became a valueless pass-through.
    fn repair_child(&mut self, idx: usize) {
        let is_dead_leaf = {
            let child = &self.children[idx].node;
            child.value.is_none() && child.children.is_empty()
        };
        if is_dead_leaf {
            self.children.remove(idx);
            return;
        }

        let should_merge = {
            let child = &self.children[idx].node;
            child.value.is_none() && child.children.len() == 1
        };
        if should_merge {
            let Edge {
                label: child_label,
                node: mut child_node,
            } = self.children.remove(idx);
            let Edge {
                label: grandchild_label,
                node: grandchild_node,
            } = child_node.children.remove(0);
            let merged_label = child_label + &grandchild_label;
            let merged_first_byte = merged_label.as_bytes()[0];
            let insert_at = self
                .children
                .binary_search_by_key(&merged_first_byte, |e| e.label.as_bytes()[0])
                .unwrap_or_else(|pos| pos);
            self.children.insert(
                insert_at,
                Edge {
                    label: merged_label,
                    node: grandchild_node,
                },
            );
        }
    }

    /// Deterministic depth-first enumeration of every (key, value) pair in
    /// this subtree, in lexicographic edge order.
    pub fn collect_entries<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a V)>) {
        if let Some(value) = &self.value {
            out.push((prefix.to_owned(), value));
        }
        for edge in &self.children {
            let mut child_prefix = String::with_capacity(prefix.len() + edge.label.len());
            child_prefix.push_str(prefix);
            child_prefix.push_str(&edge.label);
            edge.node.collect_entries(&child_prefix, out);
        }
    }

    pub fn count_entries(&self) -> usize {
        let mut total = if self.value.is_some() { 1 } else { 0 };
        for edge in &self.children {
            total += edge.node.count_entries();
        }
        total
    }
}

/// Length, in bytes, of the common prefix of `a` and `b`, rounded down to
/// the nearest shared char boundary so splits never land inside a
/// multi-byte codepoint.
pub fn common_prefix_len(a: &str, b: &str) -> usize {
    let max = a.len().min(b.len());
    let mut len = 0;
    for (ca, cb) in a.as_bytes().iter().zip(b.as_bytes().iter()) {
        if ca != cb {
            break;
        }
        len += 1;
        if len >= max {
            break;
        }
    }
    while len > 0 && !a.is_char_boundary(len) {
        len -= 1;
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_prefix_respects_char_boundaries() {
        assert_eq!(common_prefix_len("summer", "summertime"), 6);
        assert_eq!(common_prefix_len("sum", "summer"), 3);
        assert_eq!(common_prefix_len("abc", "xyz"), 0);
        // "café" and "cafeteria" share "caf" only (é is multi-byte, e is not)
        assert_eq!(common_prefix_len("café", "cafeteria"), 3);
    }
}
