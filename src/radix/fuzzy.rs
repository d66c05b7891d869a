//! Bounded Levenshtein search over a radix tree.
//!
//! Maintains one Levenshtein DP row per query, extended one matched
//! character at a time as the traversal walks down edges. An edge whose
//! row minimum already exceeds the distance budget can't lead to any
//! further match, so its whole subtree is pruned.

use super::node::Node;
use smallvec::SmallVec;
use std::collections::HashMap;

type Row = SmallVec<[usize; 24]>;

fn initial_row(query_len: usize) -> Row {
    (0..=query_len).collect()
}

/// Extends `row` (distances against `query` for the matched prefix ending
/// just before `ch`) by one matched character. Returns `None` once the
/// resulting row can no longer reach `max_distance`.
fn step(row: &Row, query: &[char], ch: char, max_distance: usize) -> Option<Row> {
    let mut next: Row = SmallVec::with_capacity(row.len());
    next.push(row[0] + 1);
    for j in 1..row.len() {
        let deletion = row[j] + 1;
        let insertion = next[j - 1] + 1;
        let substitution = row[j - 1] + usize::from(query[j - 1] != ch);
        next.push(deletion.min(insertion).min(substitution));
    }

    if *next.iter().min().unwrap_or(&usize::MAX) > max_distance {
        None
    } else {
        Some(next)
    }
}

/// Finds every key in `root`'s subtree within `max_distance` of `query`,
/// keeping (for each key) the minimum distance observed.
pub fn collect<'a, V>(
    root: &'a Node<V>,
    query: &str,
    max_distance: usize,
) -> HashMap<String, (&'a V, usize)> {
    let query_chars: Vec<char> = query.chars().collect();
    let mut out = HashMap::new();
    let row = initial_row(query_chars.len());

    if let Some(value) = &root.value {
        let distance = row[query_chars.len()];
        if distance <= max_distance {
            out.insert(String::new(), (value, distance));
        }
    }

    for edge in &root.children {
        walk_edge(edge, &query_chars, max_distance, &row, "", &mut out);
    }

    out
}

fn walk_edge<'a, V>(
    edge: &'a super::node::Edge<V>,
    query: &[char],
    max_distance: usize,
    incoming_row: &Row,
    matched_prefix: &str,
    out: &mut HashMap<String, (&'a V, usize)>,
) {
    let mut row = incoming_row.clone();
    let mut matched_suffix = String::with_capacity(edge.label.len());

    for ch in edge.label.chars() {
        match step(&row, query, ch, max_distance) {
            Some(next) => row = next,
            None => return,
        }
        matched_suffix.push(ch);
    }

    let full_key = format!("{}{}", matched_prefix, matched_suffix);

    if let Some(value) = &edge.node.value {
        let distance = row[query.len()];
        if distance <= max_distance {
            out.entry(full_key.clone())
                .and_modify(|existing: &mut (&'a V, usize)| {
                    if distance < existing.1 {
                        *existing = (value, distance);
                    }
                })
                .or_insert((value, distance));
        }
    }

    if full_key.chars().count() >= query.len() + max_distance {
        return;
    }

    for child in &edge.node.children {
        walk_edge(child, query, max_distance, &row, &full_key, out);
    }
}

#[cfg(test)]
mod tests {
    use super::super::RadixMap;

    #[test]
    fn fuzzy_matches_known_distances() {
        let mut map = RadixMap::new();
        for key in ["acqua", "aqua", "acquire", "summer"] {
            map.set(key, key.to_owned());
        }

        let matches = map.fuzzy_get("acqua", 2);
        assert_eq!(matches.len(), 3);
        assert_eq!(matches["acqua"].1, 0);
        assert_eq!(matches["aqua"].1, 1);
        assert_eq!(matches["acquire"].1, 2);
        assert!(!matches.contains_key("summer"));
    }

    #[test]
    fn fuzzy_zero_distance_matches_exact_get() {
        let mut map = RadixMap::new();
        map.set("hello", 1);
        map.set("help", 2);

        let matches = map.fuzzy_get("hello", 0);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches["hello"], (&1, 0));
    }
}
