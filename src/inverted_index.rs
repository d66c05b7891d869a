//! The term dictionary: term → field → (short_id → term_frequency).
//!
//! Backed by a [`RadixMap`] over terms so exact, prefix, and fuzzy term
//! lookup all come for free from that structure; this module only adds
//! the per-field posting bookkeeping and its cleanup on removal.

use crate::radix::RadixMap;
use std::collections::HashMap;

pub type ShortId = u32;
pub type FieldId = u32;

/// `field_id → (short_id → term_frequency)` for a single term.
pub type Postings = HashMap<FieldId, HashMap<ShortId, u32>>;

#[derive(Default)]
pub struct InvertedIndex {
    terms: RadixMap<Postings>,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self {
            terms: RadixMap::new(),
        }
    }

    /// Increments `tf` at `(term, field, short_id)`. Returns `true` if this
    /// is a brand-new posting for the (term, field) pair (i.e. the
    /// field's document frequency for this term just went up).
    pub fn add_occurrence(&mut self, term: &str, field: FieldId, short_id: ShortId) -> bool {
        let postings = self.terms.fetch(term, HashMap::new);
        let field_postings = postings.entry(field).or_insert_with(HashMap::new);
        let is_new = !field_postings.contains_key(&short_id);
        *field_postings.entry(short_id).or_insert(0) += 1;
        is_new
    }

    /// Decrements `tf` at `(term, field, short_id)`, cleaning up empty
    /// field entries and, if the term has no postings left in any field,
    /// removing the term from the dictionary entirely.
    ///
    /// Returns `false` if there was no such posting to remove (a
    /// version-conflict: the caller's re-tokenization disagreed with what
    /// was actually indexed).
    pub fn remove_occurrence(&mut self, term: &str, field: FieldId, short_id: ShortId) -> bool {
        let removed = match self.terms.get_mut(term) {
            Some(postings) => match postings.get_mut(&field) {
                Some(field_postings) => {
                    let had = field_postings.remove(&short_id).is_some();
                    if had && field_postings.is_empty() {
                        postings.remove(&field);
                    }
                    had
                }
                None => false,
            },
            None => false,
        };

        if removed {
            let term_is_empty = self
                .terms
                .get(term)
                .map(|postings| postings.is_empty())
                .unwrap_or(false);
            if term_is_empty {
                self.terms.delete(term);
            }
        }
        removed
    }

    pub fn get(&self, term: &str) -> Option<&Postings> {
        self.terms.get(term)
    }

    pub fn has(&self, term: &str) -> bool {
        self.terms.has(term)
    }

    /// Every term in the dictionary starting with `prefix`, excluding
    /// `prefix` itself if the caller wants only strict expansions (callers
    /// filter that themselves, since the exact term is scored separately).
    pub fn terms_with_prefix(&mut self, prefix: &str) -> Vec<String> {
        self.terms.at_prefix(prefix).keys()
    }

    pub fn fuzzy_terms(
        &self,
        term: &str,
        max_distance: usize,
    ) -> HashMap<String, (&Postings, usize)> {
        self.terms.fuzzy_get(term, max_distance)
    }

    /// A snapshot of every term currently in the dictionary, for a vacuum
    /// sweep to chunk up and iterate over.
    pub fn term_keys(&self) -> Vec<String> {
        self.terms.keys()
    }

    /// For each of `terms_chunk`, drops every posting whose short_id is no
    /// longer live, collapsing empty field entries and empty terms.
    /// Returns the number of postings actually removed.
    pub fn vacuum_terms<F: Fn(ShortId) -> bool>(&mut self, terms_chunk: &[String], is_live: F) -> usize {
        let mut removed = 0;
        for term in terms_chunk {
            let mut delete_term = false;
            if let Some(postings) = self.terms.get_mut(term) {
                let mut empty_fields = Vec::new();
                for (field, field_postings) in postings.iter_mut() {
                    let before = field_postings.len();
                    field_postings.retain(|short_id, _| is_live(*short_id));
                    removed += before - field_postings.len();
                    if field_postings.is_empty() {
                        empty_fields.push(*field);
                    }
                }
                for field in empty_fields {
                    postings.remove(&field);
                }
                delete_term = postings.is_empty();
            }
            if delete_term {
                self.terms.delete(term);
            }
        }
        removed
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// Every `(term, postings)` pair currently in the dictionary, for
    /// serialization.
    pub fn entries(&self) -> Vec<(String, &Postings)> {
        self.terms.entries()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_occurrence_accumulates_term_frequency() {
        let mut index = InvertedIndex::new();
        assert!(index.add_occurrence("vita", 0, 1));
        assert!(!index.add_occurrence("vita", 0, 1));
        assert!(index.add_occurrence("vita", 0, 3));

        let postings = index.get("vita").unwrap();
        assert_eq!(postings[&0][&1], 2);
        assert_eq!(postings[&0][&3], 1);
    }

    #[test]
    fn remove_occurrence_cleans_up_empty_entries() {
        let mut index = InvertedIndex::new();
        index.add_occurrence("vita", 0, 1);

        assert!(index.remove_occurrence("vita", 0, 1));
        assert!(!index.has("vita"));
    }

    #[test]
    fn remove_occurrence_on_missing_posting_reports_conflict() {
        let mut index = InvertedIndex::new();
        assert!(!index.remove_occurrence("ghost", 0, 1));
    }

    #[test]
    fn vacuum_terms_removes_dead_short_ids_and_collapses_empties() {
        let mut index = InvertedIndex::new();
        index.add_occurrence("vita", 0, 1);
        index.add_occurrence("vita", 0, 2);
        index.add_occurrence("nova", 0, 1);

        let terms = index.term_keys();
        let removed = index.vacuum_terms(&terms, |short_id| short_id != 1);

        assert_eq!(removed, 2);
        assert!(!index.get("vita").unwrap().get(&0).unwrap().contains_key(&1));
        assert!(index.get("vita").unwrap()[&0].contains_key(&2));
        assert!(!index.has("nova"));
    }
}
