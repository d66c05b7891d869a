//! Document-side bookkeeping: the external-id/short-id bijection, per-field
//! length tables and running averages, and optional verbatim stored
//! fields.

use crate::error::{Result, SearchError};
use crate::inverted_index::{FieldId, ShortId};
use serde_json::Value;
use std::collections::HashMap;
use std::hash::Hash;

#[derive(Default)]
pub struct DocStore<Id> {
    external_to_short: HashMap<Id, ShortId>,
    short_to_external: HashMap<ShortId, Id>,
    next_short_id: ShortId,
    field_length: HashMap<ShortId, HashMap<FieldId, u32>>,
    avg_field_length: HashMap<FieldId, f64>,
    doc_count_by_field: HashMap<FieldId, u32>,
    stored_fields: HashMap<ShortId, HashMap<String, Value>>,
}

impl<Id> DocStore<Id>
where
    Id: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            external_to_short: HashMap::new(),
            short_to_external: HashMap::new(),
            next_short_id: 0,
            field_length: HashMap::new(),
            avg_field_length: HashMap::new(),
            doc_count_by_field: HashMap::new(),
            stored_fields: HashMap::new(),
        }
    }

    pub fn documents_count(&self) -> usize {
        self.external_to_short.len()
    }

    pub fn next_short_id(&self) -> ShortId {
        self.next_short_id
    }

    pub fn add_id(&mut self, external_id: Id) -> Result<ShortId> {
        if self.external_to_short.contains_key(&external_id) {
            return Err(SearchError::DuplicateId);
        }
        let short_id = self.next_short_id;
        self.next_short_id += 1;
        self.external_to_short.insert(external_id.clone(), short_id);
        self.short_to_external.insert(short_id, external_id);
        Ok(short_id)
    }

    pub fn get_external(&self, short_id: ShortId) -> Option<&Id> {
        self.short_to_external.get(&short_id)
    }

    pub fn get_short<Q>(&self, external_id: &Q) -> Option<ShortId>
    where
        Id: std::borrow::Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.external_to_short.get(external_id).copied()
    }

    pub fn is_live(&self, short_id: ShortId) -> bool {
        self.short_to_external.contains_key(&short_id)
    }

    pub fn all_live_short_ids(&self) -> Vec<ShortId> {
        self.short_to_external.keys().copied().collect()
    }

    /// Every live `(short_id, external_id)` pair, for serialization.
    pub fn iter_external(&self) -> impl Iterator<Item = (ShortId, &Id)> {
        self.short_to_external.iter().map(|(k, v)| (*k, v))
    }

    /// Every `(short_id, field → length)` table, for serialization.
    pub fn iter_field_lengths(&self) -> impl Iterator<Item = (ShortId, &HashMap<FieldId, u32>)> {
        self.field_length.iter().map(|(k, v)| (*k, v))
    }

    /// Every field's current running average length, for serialization.
    pub fn iter_avg_field_lengths(&self) -> impl Iterator<Item = (FieldId, f64)> + '_ {
        self.avg_field_length.iter().map(|(k, v)| (*k, *v))
    }

    /// Every `(short_id, stored fields)` record, for serialization.
    pub fn iter_stored(&self) -> impl Iterator<Item = (ShortId, &HashMap<String, Value>)> {
        self.stored_fields.iter().map(|(k, v)| (*k, v))
    }

    /// Reconstructs a store from its serialized parts. Used by
    /// deserialization; does not re-derive anything, it trusts the
    /// serialized state is internally consistent.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        next_short_id: ShortId,
        ids: HashMap<ShortId, Id>,
        field_length: HashMap<ShortId, HashMap<FieldId, u32>>,
        avg_field_length: HashMap<FieldId, f64>,
        doc_count_by_field: HashMap<FieldId, u32>,
        stored_fields: HashMap<ShortId, HashMap<String, Value>>,
    ) -> Self {
        let mut external_to_short = HashMap::new();
        for (short_id, external_id) in &ids {
            external_to_short.insert(external_id.clone(), *short_id);
        }
        Self {
            external_to_short,
            short_to_external: ids,
            next_short_id,
            field_length,
            avg_field_length,
            doc_count_by_field,
            stored_fields,
        }
    }

    pub fn avg_field_length(&self, field: FieldId) -> f64 {
        self.avg_field_length.get(&field).copied().unwrap_or(0.0)
    }

    pub fn field_length(&self, short_id: ShortId, field: FieldId) -> u32 {
        self.field_length
            .get(&short_id)
            .and_then(|by_field| by_field.get(&field))
            .copied()
            .unwrap_or(0)
    }

    /// Records `length` as the unique-token count for `(short_id, field)`
    /// and folds it into the field's running average, using
    /// `prior_count` — the number of documents contributing to the
    /// average *before* this one.
    pub fn add_field_length(&mut self, short_id: ShortId, field: FieldId, prior_count: u32, length: u32) {
        self.field_length
            .entry(short_id)
            .or_insert_with(HashMap::new)
            .insert(field, length);

        let avg = self.avg_field_length.entry(field).or_insert(0.0);
        *avg = (*avg * prior_count as f64 + length as f64) / (prior_count as f64 + 1.0);
        *self.doc_count_by_field.entry(field).or_insert(0) += 1;
    }

    /// Reverses `add_field_length`'s effect on the running average.
    /// `prior_count` is the document count for this field *before* the
    /// removal (so `prior_count == 1` means this was the last document
    /// contributing to the field).
    pub fn remove_field_length(&mut self, short_id: ShortId, field: FieldId, prior_count: u32, length: u32) {
        if let Some(by_field) = self.field_length.get_mut(&short_id) {
            by_field.remove(&field);
        }

        let avg = self.avg_field_length.entry(field).or_insert(0.0);
        *avg = if prior_count <= 1 {
            0.0
        } else {
            (*avg * prior_count as f64 - length as f64) / (prior_count as f64 - 1.0)
        };
        if let Some(count) = self.doc_count_by_field.get_mut(&field) {
            *count = count.saturating_sub(1);
        }
    }

    pub fn doc_count_for_field(&self, field: FieldId) -> u32 {
        self.doc_count_by_field.get(&field).copied().unwrap_or(0)
    }

    pub fn put_stored(&mut self, short_id: ShortId, field_name: &str, value: Value) {
        self.stored_fields
            .entry(short_id)
            .or_insert_with(HashMap::new)
            .insert(field_name.to_owned(), value);
    }

    pub fn get_stored(&self, short_id: ShortId) -> Option<&HashMap<String, Value>> {
        self.stored_fields.get(&short_id)
    }

    /// Removes every trace of `short_id`: its id mapping, its stored
    /// fields, and all its field-length entries (folding them out of the
    /// running averages first).
    pub fn drop(&mut self, short_id: ShortId) {
        if let Some(external_id) = self.short_to_external.remove(&short_id) {
            self.external_to_short.remove(&external_id);
        }
        self.stored_fields.remove(&short_id);

        if let Some(by_field) = self.field_length.remove(&short_id) {
            for (field, length) in by_field {
                let prior_count = self.doc_count_for_field(field);
                self.remove_field_length(short_id, field, prior_count, length);
            }
        }
    }

    /// Clears the store back to its just-constructed state.
    pub fn clear(&mut self) {
        self.external_to_short.clear();
        self.short_to_external.clear();
        self.next_short_id = 0;
        self.field_length.clear();
        self.avg_field_length.clear();
        self.doc_count_by_field.clear();
        self.stored_fields.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_id_assigns_monotonic_short_ids() {
        let mut store: DocStore<String> = DocStore::new();
        let a = store.add_id("a".to_owned()).unwrap();
        let b = store.add_id("b".to_owned()).unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(store.get_short(&"a".to_owned()), Some(0));
    }

    #[test]
    fn add_id_rejects_duplicates() {
        let mut store: DocStore<String> = DocStore::new();
        store.add_id("a".to_owned()).unwrap();
        assert_eq!(store.add_id("a".to_owned()), Err(SearchError::DuplicateId));
    }

    #[test]
    fn field_length_average_tracks_additions_and_removals() {
        let mut store: DocStore<String> = DocStore::new();
        let a = store.add_id("a".to_owned()).unwrap();
        let b = store.add_id("b".to_owned()).unwrap();

        store.add_field_length(a, 0, 0, 10);
        store.add_field_length(b, 0, 1, 20);
        assert!((store.avg_field_length(0) - 15.0).abs() < 1e-9);

        store.remove_field_length(b, 0, 2, 20);
        assert!((store.avg_field_length(0) - 10.0).abs() < 1e-9);

        store.remove_field_length(a, 0, 1, 10);
        assert_eq!(store.avg_field_length(0), 0.0);
    }

    #[test]
    fn drop_removes_id_mapping_and_folds_out_of_average() {
        let mut store: DocStore<String> = DocStore::new();
        let a = store.add_id("a".to_owned()).unwrap();
        let b = store.add_id("b".to_owned()).unwrap();
        store.add_field_length(a, 0, 0, 10);
        store.add_field_length(b, 0, 1, 20);

        store.drop(a);

        assert!(!store.is_live(a));
        assert_eq!(store.get_short(&"a".to_owned()), None);
        assert!((store.avg_field_length(0) - 20.0).abs() < 1e-9);
    }
}
