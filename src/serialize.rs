//! The schema-level (format-agnostic) serialized representation of an
//! index, round-tripped through `serde_json`.

use crate::error::{Result, SearchError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

pub const CURRENT_SERIALIZATION_VERSION: u32 = 2;

/// `field_id_str → { short_id_str → tf }` for a single term, the canonical
/// (version-2) shape.
pub type FieldPostings = HashMap<String, HashMap<String, u32>>;

#[derive(Debug, Serialize, Deserialize)]
pub struct SerializedIndex<Id> {
    pub serialization_version: u32,
    pub document_count: usize,
    pub next_short_id: u32,
    pub dirty_count: usize,
    pub document_ids: HashMap<String, Id>,
    pub field_ids: HashMap<String, u32>,
    pub field_length: HashMap<String, Vec<u32>>,
    pub average_field_length: Vec<f64>,
    pub stored_fields: HashMap<String, HashMap<String, Value>>,
    pub index: Vec<(String, FieldPostings)>,
}

impl<Id> SerializedIndex<Id> {
    pub fn new(
        document_count: usize,
        next_short_id: u32,
        dirty_count: usize,
        document_ids: HashMap<String, Id>,
        field_ids: HashMap<String, u32>,
        field_length: HashMap<String, Vec<u32>>,
        average_field_length: Vec<f64>,
        stored_fields: HashMap<String, HashMap<String, Value>>,
        index: Vec<(String, FieldPostings)>,
    ) -> Self {
        Self {
            serialization_version: CURRENT_SERIALIZATION_VERSION,
            document_count,
            next_short_id,
            dirty_count,
            document_ids,
            field_ids,
            field_length,
            average_field_length,
            stored_fields,
            index,
        }
    }
}

/// Version 1 nested a term's per-field postings under a `ds` key instead
/// of storing `{ short_id_str → tf }` directly; accept either on load.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FieldPostingsCompat {
    V2(HashMap<String, u32>),
    V1 { ds: HashMap<String, u32> },
}

impl From<FieldPostingsCompat> for HashMap<String, u32> {
    fn from(raw: FieldPostingsCompat) -> Self {
        match raw {
            FieldPostingsCompat::V2(postings) => postings,
            FieldPostingsCompat::V1 { ds } => ds,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SerializedIndexRaw<Id> {
    serialization_version: u32,
    document_count: usize,
    next_short_id: u32,
    dirty_count: usize,
    document_ids: HashMap<String, Id>,
    field_ids: HashMap<String, u32>,
    field_length: HashMap<String, Vec<u32>>,
    average_field_length: Vec<f64>,
    stored_fields: HashMap<String, HashMap<String, Value>>,
    index: Vec<(String, HashMap<String, FieldPostingsCompat>)>,
}

pub fn to_json_value<Id: Serialize>(index: &SerializedIndex<Id>) -> Value {
    serde_json::to_value(index).expect("SerializedIndex always serializes to valid JSON")
}

pub fn to_string<Id: Serialize>(index: &SerializedIndex<Id>) -> String {
    serde_json::to_string(index).expect("SerializedIndex always serializes to valid JSON")
}

pub fn from_json_value<Id: DeserializeOwned>(value: Value) -> Result<SerializedIndex<Id>> {
    let raw: SerializedIndexRaw<Id> =
        serde_json::from_value(value).map_err(|_| SearchError::IncompatibleSerialization)?;

    if raw.serialization_version != 1 && raw.serialization_version != CURRENT_SERIALIZATION_VERSION {
        return Err(SearchError::IncompatibleSerialization);
    }

    let index = raw
        .index
        .into_iter()
        .map(|(term, by_field)| {
            let normalized = by_field
                .into_iter()
                .map(|(field, postings)| (field, postings.into()))
                .collect();
            (term, normalized)
        })
        .collect();

    Ok(SerializedIndex {
        serialization_version: CURRENT_SERIALIZATION_VERSION,
        document_count: raw.document_count,
        next_short_id: raw.next_short_id,
        dirty_count: raw.dirty_count,
        document_ids: raw.document_ids,
        field_ids: raw.field_ids,
        field_length: raw.field_length,
        average_field_length: raw.average_field_length,
        stored_fields: raw.stored_fields,
        index,
    })
}

pub fn from_str<Id: DeserializeOwned>(s: &str) -> Result<SerializedIndex<Id>> {
    let value: Value = serde_json::from_str(s).map_err(|_| SearchError::IncompatibleSerialization)?;
    from_json_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_unsupported_serialization_version() {
        let payload = json!({
            "serialization_version": 99,
            "document_count": 0,
            "next_short_id": 0,
            "dirty_count": 0,
            "document_ids": {},
            "field_ids": {},
            "field_length": {},
            "average_field_length": [],
            "stored_fields": {},
            "index": [],
        });

        let result = from_json_value::<String>(payload);
        assert_eq!(result.unwrap_err(), SearchError::IncompatibleSerialization);
    }

    #[test]
    fn accepts_version_one_nested_ds_shape() {
        let payload = json!({
            "serialization_version": 1,
            "document_count": 1,
            "next_short_id": 1,
            "dirty_count": 0,
            "document_ids": {"0": "doc-a"},
            "field_ids": {"text": 0},
            "field_length": {"0": [3]},
            "average_field_length": [3.0],
            "stored_fields": {},
            "index": [["vita", {"0": {"ds": {"0": 1}}}]],
        });

        let loaded = from_json_value::<String>(payload).unwrap();
        assert_eq!(loaded.serialization_version, CURRENT_SERIALIZATION_VERSION);
        assert_eq!(loaded.index[0].0, "vita");
        assert_eq!(loaded.index[0].1["0"]["0"], 1);
    }

    #[test]
    fn round_trips_through_json_value() {
        let mut index_postings = HashMap::new();
        let mut field_postings = HashMap::new();
        field_postings.insert("0".to_owned(), 2u32);
        index_postings.insert("0".to_owned(), field_postings);

        let original: SerializedIndex<String> = SerializedIndex::new(
            1,
            1,
            0,
            HashMap::from([("0".to_owned(), "doc-a".to_owned())]),
            HashMap::from([("text".to_owned(), 0u32)]),
            HashMap::from([("0".to_owned(), vec![3u32])]),
            vec![3.0],
            HashMap::new(),
            vec![("vita".to_owned(), index_postings)],
        );

        let value = to_json_value(&original);
        let loaded: SerializedIndex<String> = from_json_value(value).unwrap();
        assert_eq!(loaded.document_ids, original.document_ids);
        assert_eq!(loaded.index, original.index);
    }
}
