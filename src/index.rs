//! `SearchIndex`: the incrementally-updatable, in-memory full-text index
//! that ties the term dictionary, document store, scorer and query engine
//! together into a single addressable unit with a document lifecycle.

use crate::doc_store::DocStore;
use crate::engine::{self, SearchContext};
use crate::error::{Result, SearchError};
use crate::inverted_index::{FieldId, InvertedIndex, ShortId};
use crate::logger::{DefaultLogger, LogLevel, Logger};
use crate::query::{Query, SearchOptions, SearchResult, Suggestion};
use crate::serialize::{FieldPostings, SerializedIndex};
use crate::tokenize::{DefaultTermProcessor, DefaultTokenizer, Extractor, ProcessedTerm, TermProcessor, Tokenizer};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

const DEFAULT_VACUUM_BATCH_SIZE: usize = 256;
const DEFAULT_ADD_ALL_ASYNC_CHUNK_SIZE: usize = 200;

/// When (and how aggressively) a `SearchIndex` reclaims tombstoned
/// postings on its own, without an explicit `vacuum()` call.
#[derive(Debug, Clone, Copy)]
pub struct AutoVacuumPolicy {
    pub enabled: bool,
    pub min_dirty_count: usize,
    pub min_dirty_factor: f64,
    pub batch_size: usize,
}

impl Default for AutoVacuumPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            min_dirty_count: 20,
            min_dirty_factor: 0.1,
            batch_size: DEFAULT_VACUUM_BATCH_SIZE,
        }
    }
}

/// Outcome of `add_all`/`add_all_async`: how many documents actually
/// committed before an error (if any) stopped the batch.
#[derive(Debug, Clone)]
pub struct BulkOutcome {
    pub committed: usize,
    pub error: Option<SearchError>,
}

/// Outcome of `remove`/`remove_all`: how many of the re-tokenized terms
/// didn't match what was actually indexed (logged individually as
/// `version_conflict` warnings, summed here for callers who want a count
/// without scraping logs).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveOutcome {
    pub version_conflicts: usize,
}

/// Construction-time configuration for a [`SearchIndex`]. Every field has a
/// sensible default except `fields` and `extractor`, which describe the
/// caller's document shape and so can't be guessed.
pub struct IndexConfig<D> {
    pub fields: Vec<String>,
    pub id_field: String,
    pub store_fields: Vec<String>,
    pub extractor: Box<dyn Extractor<D>>,
    pub tokenizer: Box<dyn Tokenizer>,
    pub term_processor: Box<dyn TermProcessor>,
    pub search_options: SearchOptions<String>,
    pub auto_suggest_options: SearchOptions<String>,
    pub auto_vacuum: AutoVacuumPolicy,
    pub logger: Box<dyn Logger>,
}

impl<D> IndexConfig<D> {
    pub fn new(fields: Vec<String>, extractor: Box<dyn Extractor<D>>) -> Self {
        Self {
            fields,
            id_field: "id".to_owned(),
            store_fields: Vec::new(),
            extractor,
            tokenizer: Box::new(DefaultTokenizer),
            term_processor: Box::new(DefaultTermProcessor),
            search_options: SearchOptions::default(),
            auto_suggest_options: SearchOptions::auto_suggest_defaults(),
            auto_vacuum: AutoVacuumPolicy::default(),
            logger: Box::new(DefaultLogger),
        }
    }
}

impl IndexConfig<serde_json::Map<String, Value>> {
    /// Convenience constructor for the common case of indexing flat JSON
    /// records.
    pub fn for_json_documents(fields: Vec<String>) -> Self {
        Self::new(fields, Box::new(crate::tokenize::JsonRecordExtractor))
    }
}

/// An incrementally-updatable full-text index over documents of type `D`.
/// External document ids are always strings (coerced by the configured
/// `Extractor`, per the id field's contract), though the internal document
/// store and query engine stay generic over the id type for testability.
pub struct SearchIndex<D> {
    fields: Vec<String>,
    field_ids: HashMap<String, FieldId>,
    id_field: String,
    store_fields: Vec<String>,
    inverted_index: InvertedIndex,
    doc_store: DocStore<String>,
    dirty_count: usize,
    tokenizer: Box<dyn Tokenizer>,
    term_processor: Box<dyn TermProcessor>,
    extractor: Box<dyn Extractor<D>>,
    search_options: SearchOptions<String>,
    auto_suggest_options: SearchOptions<String>,
    auto_vacuum: AutoVacuumPolicy,
    logger: Box<dyn Logger>,
    vacuum_in_progress: bool,
    queued_vacuum: bool,
}

impl<D> SearchIndex<D> {
    pub fn new(config: IndexConfig<D>) -> Result<Self> {
        if config.fields.is_empty() {
            return Err(SearchError::MissingFields);
        }
        let field_ids = config
            .fields
            .iter()
            .enumerate()
            .map(|(id, name)| (name.clone(), id as FieldId))
            .collect();

        Ok(Self {
            fields: config.fields,
            field_ids,
            id_field: config.id_field,
            store_fields: config.store_fields,
            inverted_index: InvertedIndex::new(),
            doc_store: DocStore::new(),
            dirty_count: 0,
            tokenizer: config.tokenizer,
            term_processor: config.term_processor,
            extractor: config.extractor,
            search_options: config.search_options,
            auto_suggest_options: config.auto_suggest_options,
            auto_vacuum: config.auto_vacuum,
            logger: config.logger,
            vacuum_in_progress: false,
            queued_vacuum: false,
        })
    }

    pub fn documents_count(&self) -> usize {
        self.doc_store.documents_count()
    }

    pub fn has(&self, id: &str) -> bool {
        self.doc_store.get_short(id).is_some()
    }

    pub fn get_stored_fields(&self, id: &str) -> Option<&HashMap<String, Value>> {
        let short_id = self.doc_store.get_short(id)?;
        self.doc_store.get_stored(short_id)
    }

    fn extract_id(&self, document: &D) -> Result<String> {
        self.extractor
            .extract(document, &self.id_field)
            .map(|cow| cow.into_owned())
            .ok_or(SearchError::MissingId)
    }

    fn process_token(&self, token: &str, field_name: &str) -> Vec<String> {
        match self.term_processor.process(token, field_name) {
            ProcessedTerm::One(term) => vec![term],
            ProcessedTerm::Many(terms) => terms,
            ProcessedTerm::Skip => Vec::new(),
        }
    }

    /// The distinct processed terms `document`'s `field_name` contributes,
    /// or `None` if the field is absent (silently skipped, as §6 requires).
    fn field_terms(&self, document: &D, field_name: &str) -> Option<HashSet<String>> {
        let text = self.extractor.extract(document, field_name)?;
        let mut terms = HashSet::new();
        for token in self.tokenizer.tokenize(&text, field_name) {
            for term in self.process_token(&token, field_name) {
                terms.insert(term);
            }
        }
        Some(terms)
    }

    /// Indexes `document`. Fails with `MissingId` if the id field is
    /// absent, or `DuplicateId` if a document with this id is already
    /// indexed.
    pub fn add(&mut self, document: &D) -> Result<()> {
        let external_id = self.extract_id(document)?;
        if self.doc_store.get_short(external_id.as_str()).is_some() {
            return Err(SearchError::DuplicateId);
        }
        let short_id = self.doc_store.add_id(external_id)?;

        for field_name in self.store_fields.clone() {
            if let Some(value) = self.extractor.extract(document, &field_name) {
                self.doc_store
                    .put_stored(short_id, &field_name, Value::String(value.into_owned()));
            }
        }

        for field_name in self.fields.clone() {
            let field_id = self.field_ids[&field_name];
            let terms = match self.field_terms(document, &field_name) {
                Some(terms) => terms,
                None => continue,
            };
            for term in &terms {
                self.inverted_index.add_occurrence(term, field_id, short_id);
            }
            let prior_count = self.doc_store.doc_count_for_field(field_id);
            self.doc_store
                .add_field_length(short_id, field_id, prior_count, terms.len() as u32);
        }

        Ok(())
    }

    /// Removes `document`'s occurrences from the term dictionary and drops
    /// its document-store entry. Re-tokenizes `document` the same way
    /// `add` did, so if it has drifted from what was actually indexed,
    /// some terms won't match — each such miss is logged as a
    /// `version_conflict` warning and counted in the returned outcome
    /// rather than failing the whole removal.
    pub fn remove(&mut self, document: &D) -> Result<RemoveOutcome> {
        let external_id = self.extract_id(document)?;
        let short_id = self
            .doc_store
            .get_short(external_id.as_str())
            .ok_or(SearchError::NotIndexed)?;

        let mut version_conflicts = 0;
        for field_name in self.fields.clone() {
            let field_id = self.field_ids[&field_name];
            let terms = match self.field_terms(document, &field_name) {
                Some(terms) => terms,
                None => continue,
            };
            for term in &terms {
                if !self.inverted_index.remove_occurrence(term, field_id, short_id) {
                    version_conflicts += 1;
                    self.logger.log(
                        LogLevel::Warn,
                        "version_conflict",
                        &format!(
                            "document {:?} did not have term {:?} indexed in field {:?}",
                            external_id, term, field_name
                        ),
                    );
                }
            }
        }

        self.doc_store.drop(short_id);
        Ok(RemoveOutcome { version_conflicts })
    }

    /// Drops `id`'s document-store entry (id mapping, stored fields, field
    /// lengths) but leaves its postings in the term dictionary as
    /// tombstones for a later `vacuum()` to reclaim. Cheaper than `remove`
    /// when discarding many documents at once, at the cost of stale
    /// postings until vacuumed.
    pub fn discard(&mut self, id: &str) -> Result<()> {
        let short_id = self.doc_store.get_short(id).ok_or(SearchError::NotIndexed)?;
        self.doc_store.drop(short_id);
        self.dirty_count += 1;
        self.maybe_auto_vacuum();
        Ok(())
    }

    /// Discards the document sharing `document`'s id (if indexed) and
    /// re-adds `document` in its place.
    pub fn replace(&mut self, document: &D) -> Result<()> {
        let external_id = self.extract_id(document)?;
        if self.doc_store.get_short(external_id.as_str()).is_some() {
            self.discard(&external_id)?;
        }
        self.add(document)
    }

    /// Adds each of `documents` in order, stopping at the first error.
    pub fn add_all(&mut self, documents: &[D]) -> BulkOutcome {
        let mut committed = 0;
        for document in documents {
            if let Err(error) = self.add(document) {
                return BulkOutcome { committed, error: Some(error) };
            }
            committed += 1;
        }
        BulkOutcome { committed, error: None }
    }

    /// Like `add_all`, but cooperatively yields between chunks of
    /// `chunk_size` (default 200) documents so a caller sharing this
    /// thread gets a chance to run.
    pub async fn add_all_async(&mut self, documents: &[D], chunk_size: Option<usize>) -> BulkOutcome {
        let chunk_size = chunk_size.unwrap_or(DEFAULT_ADD_ALL_ASYNC_CHUNK_SIZE).max(1);
        let mut committed = 0;
        for chunk in documents.chunks(chunk_size) {
            for document in chunk {
                if let Err(error) = self.add(document) {
                    return BulkOutcome { committed, error: Some(error) };
                }
                committed += 1;
            }
            yield_now().await;
        }
        BulkOutcome { committed, error: None }
    }

    /// `None` clears the entire index; `Some(documents)` removes exactly
    /// those documents (as repeated `remove` calls, summing their
    /// conflict counts).
    pub fn remove_all(&mut self, documents: Option<&[D]>) -> Result<RemoveOutcome> {
        match documents {
            None => {
                self.clear();
                Ok(RemoveOutcome::default())
            }
            Some(documents) => {
                let mut outcome = RemoveOutcome::default();
                for document in documents {
                    let result = self.remove(document)?;
                    outcome.version_conflicts += result.version_conflicts;
                }
                Ok(outcome)
            }
        }
    }

    /// Resets the index to its just-constructed state, keeping its
    /// configuration (fields, extractor, options, ...).
    pub fn clear(&mut self) {
        self.inverted_index = InvertedIndex::new();
        self.doc_store.clear();
        self.dirty_count = 0;
    }

    fn vacuum_chunk(&mut self, chunk: &[String]) {
        let doc_store = &self.doc_store;
        self.inverted_index
            .vacuum_terms(chunk, |short_id| doc_store.is_live(short_id));
    }

    /// Sweeps the entire term dictionary once, batch by batch, dropping
    /// tombstoned postings left behind by `discard`/`replace`. Cooperatively
    /// yields between batches. If another `vacuum()` call arrives while one
    /// is already running, it's coalesced into a single follow-up pass
    /// rather than running concurrently with this one.
    pub async fn vacuum(&mut self) {
        if self.vacuum_in_progress {
            self.queued_vacuum = true;
            return;
        }
        self.vacuum_in_progress = true;
        loop {
            let observed_dirty = self.dirty_count;
            let terms = self.inverted_index.term_keys();
            let batch_size = self.auto_vacuum.batch_size.max(1);
            for chunk in terms.chunks(batch_size) {
                self.vacuum_chunk(chunk);
                yield_now().await;
            }
            self.dirty_count = self.dirty_count.saturating_sub(observed_dirty);
            if !std::mem::take(&mut self.queued_vacuum) {
                break;
            }
        }
        self.vacuum_in_progress = false;
    }

    /// A full vacuum sweep run to completion without yielding, for the
    /// auto-vacuum trigger inside synchronous lifecycle methods (which
    /// can't `.await`).
    fn vacuum_all_sync(&mut self) {
        let observed_dirty = self.dirty_count;
        let terms = self.inverted_index.term_keys();
        let batch_size = self.auto_vacuum.batch_size.max(1);
        for chunk in terms.chunks(batch_size) {
            self.vacuum_chunk(chunk);
        }
        self.dirty_count = self.dirty_count.saturating_sub(observed_dirty);
    }

    fn maybe_auto_vacuum(&mut self) {
        if !self.auto_vacuum.enabled || self.vacuum_in_progress {
            return;
        }
        let live = self.doc_store.documents_count() as f64;
        let dirty = self.dirty_count as f64;
        let factor = dirty / (1.0 + live + dirty);
        if self.dirty_count >= self.auto_vacuum.min_dirty_count && factor >= self.auto_vacuum.min_dirty_factor {
            self.logger.log(
                LogLevel::Debug,
                "auto_vacuum",
                &format!("auto-vacuuming at dirty_count={}", self.dirty_count),
            );
            self.vacuum_all_sync();
        }
    }

    /// Rejects any field name in `names` that isn't one of this index's
    /// configured fields.
    fn validate_field_names<'a, I: IntoIterator<Item = &'a str>>(&self, names: I) -> Result<()> {
        for name in names {
            if !self.field_ids.contains_key(name) {
                return Err(SearchError::UnknownOption(name.to_owned()));
            }
        }
        Ok(())
    }

    fn validate_options(&self, options: &SearchOptions<String>) -> Result<()> {
        if let Some(fields) = &options.fields {
            self.validate_field_names(fields.iter().map(String::as_str))?;
        }
        self.validate_field_names(options.boost.keys().map(String::as_str))
    }

    /// Recursively validates every `fields`/`boost` override named anywhere
    /// in a query tree, not just the top-level options.
    fn validate_query(&self, query: &Query) -> Result<()> {
        match query {
            Query::Text(_) | Query::Wildcard => Ok(()),
            Query::Combination { queries, options, .. } => {
                if let Some(patch) = options {
                    if let Some(fields) = &patch.fields {
                        self.validate_field_names(fields.iter().map(String::as_str))?;
                    }
                    if let Some(boost) = &patch.boost {
                        self.validate_field_names(boost.keys().map(String::as_str))?;
                    }
                }
                for q in queries {
                    self.validate_query(q)?;
                }
                Ok(())
            }
        }
    }

    /// Evaluates `query`, applying `options` (falling back to the index's
    /// configured default search options). Fails with `UnknownOption` if
    /// `query` or `options` names a field this index wasn't configured
    /// with, anywhere in the query tree.
    pub fn search(
        &mut self,
        query: &Query,
        options: Option<&SearchOptions<String>>,
    ) -> Result<Vec<SearchResult<String>>> {
        let base = options.cloned().unwrap_or_else(|| self.search_options.clone());
        self.validate_options(&base)?;
        self.validate_query(query)?;

        let filter = base.filter.clone();
        let store_fields = !self.store_fields.is_empty();
        let mut ctx = SearchContext {
            inverted_index: &mut self.inverted_index,
            doc_store: &self.doc_store,
            field_ids: &self.field_ids,
            all_fields: &self.fields,
            default_tokenizer: self.tokenizer.as_ref(),
            default_term_processor: self.term_processor.as_ref(),
        };
        let results = engine::evaluate(query, &mut ctx, &base);
        Ok(engine::finalize(results, &ctx, store_fields, &filter))
    }

    /// Searches `text` with the index's auto-suggest options (AND-combined,
    /// prefix expansion on the last term only) and aggregates hits into
    /// phrase suggestions ranked by mean score.
    pub fn auto_suggest(&mut self, text: &str) -> Result<Vec<Suggestion>> {
        let options = self.auto_suggest_options.clone();
        let results = self.search(&Query::Text(text.to_owned()), Some(&options))?;

        let mut aggregated: HashMap<String, (Vec<String>, f64, usize)> = HashMap::new();
        for result in results {
            if result.terms.is_empty() {
                continue;
            }
            let phrase = result.terms.join(" ");
            let entry = aggregated
                .entry(phrase)
                .or_insert_with(|| (result.terms.clone(), 0.0, 0));
            entry.1 += result.score;
            entry.2 += 1;
        }

        let mut suggestions: Vec<Suggestion> = aggregated
            .into_iter()
            .map(|(phrase, (terms, total_score, count))| Suggestion {
                phrase,
                terms,
                score: total_score / count as f64,
            })
            .collect();
        suggestions.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.phrase.cmp(&b.phrase))
        });
        Ok(suggestions)
    }

    /// Snapshots the index into its schema-level serialized form.
    pub fn to_serialized(&self) -> SerializedIndex<String> {
        let document_ids: HashMap<String, String> = self
            .doc_store
            .iter_external()
            .map(|(short_id, id)| (short_id.to_string(), id.clone()))
            .collect();

        let mut field_length: HashMap<String, Vec<u32>> = HashMap::new();
        for (short_id, by_field) in self.doc_store.iter_field_lengths() {
            let mut lengths = vec![0u32; self.fields.len()];
            for (field_id, length) in by_field {
                if let Some(slot) = lengths.get_mut(*field_id as usize) {
                    *slot = *length;
                }
            }
            field_length.insert(short_id.to_string(), lengths);
        }

        let mut average_field_length = vec![0.0; self.fields.len()];
        for (field_id, avg) in self.doc_store.iter_avg_field_lengths() {
            if let Some(slot) = average_field_length.get_mut(field_id as usize) {
                *slot = avg;
            }
        }

        let stored_fields: HashMap<String, HashMap<String, Value>> = self
            .doc_store
            .iter_stored()
            .map(|(short_id, fields)| (short_id.to_string(), fields.clone()))
            .collect();

        let index: Vec<(String, FieldPostings)> = self
            .inverted_index
            .entries()
            .into_iter()
            .map(|(term, postings)| {
                let by_field: FieldPostings = postings
                    .iter()
                    .map(|(field_id, by_short_id)| {
                        let by_short_id_str: HashMap<String, u32> = by_short_id
                            .iter()
                            .map(|(short_id, tf)| (short_id.to_string(), *tf))
                            .collect();
                        (field_id.to_string(), by_short_id_str)
                    })
                    .collect();
                (term, by_field)
            })
            .collect();

        SerializedIndex::new(
            self.doc_store.documents_count(),
            self.doc_store.next_short_id(),
            self.dirty_count,
            document_ids,
            self.field_ids.clone(),
            field_length,
            average_field_length,
            stored_fields,
            index,
        )
    }

    /// Rebuilds a `SearchIndex` from a previously-serialized snapshot.
    /// `config` must describe the same document shape (extractor,
    /// tokenizer, term processor) that produced the snapshot; the field
    /// list and field ids come from the snapshot itself, not `config`.
    pub fn from_serialized(data: SerializedIndex<String>, config: IndexConfig<D>) -> Result<Self> {
        let field_ids = data.field_ids;
        if field_ids.is_empty() {
            return Err(SearchError::MissingFields);
        }
        let mut fields: Vec<String> = field_ids.keys().cloned().collect();
        fields.sort_by_key(|name| field_ids[name]);

        let parse_id = |s: &str| -> Result<u32> { s.parse().map_err(|_| SearchError::IncompatibleSerialization) };

        let mut ids: HashMap<ShortId, String> = HashMap::new();
        for (short_id_str, id) in data.document_ids {
            ids.insert(parse_id(&short_id_str)?, id);
        }

        let mut field_length: HashMap<ShortId, HashMap<FieldId, u32>> = HashMap::new();
        for (short_id_str, lengths) in &data.field_length {
            let short_id = parse_id(short_id_str)?;
            let by_field: HashMap<FieldId, u32> = lengths
                .iter()
                .enumerate()
                .filter(|(_, length)| **length > 0)
                .map(|(field_id, length)| (field_id as FieldId, *length))
                .collect();
            field_length.insert(short_id, by_field);
        }

        let avg_field_length: HashMap<FieldId, f64> = data
            .average_field_length
            .iter()
            .enumerate()
            .map(|(field_id, avg)| (field_id as FieldId, *avg))
            .collect();

        let mut doc_count_by_field: HashMap<FieldId, u32> = HashMap::new();
        for by_field in field_length.values() {
            for field_id in by_field.keys() {
                *doc_count_by_field.entry(*field_id).or_insert(0) += 1;
            }
        }

        let mut stored_fields: HashMap<ShortId, HashMap<String, Value>> = HashMap::new();
        for (short_id_str, fields_map) in data.stored_fields {
            stored_fields.insert(parse_id(&short_id_str)?, fields_map);
        }

        let doc_store = DocStore::from_parts(
            data.next_short_id,
            ids,
            field_length,
            avg_field_length,
            doc_count_by_field,
            stored_fields,
        );

        let mut inverted_index = InvertedIndex::new();
        for (term, by_field) in data.index {
            for (field_id_str, by_short_id) in by_field {
                let field_id = parse_id(&field_id_str)?;
                for (short_id_str, tf) in by_short_id {
                    let short_id = parse_id(&short_id_str)?;
                    for _ in 0..tf {
                        inverted_index.add_occurrence(&term, field_id, short_id);
                    }
                }
            }
        }

        Ok(Self {
            fields,
            field_ids,
            id_field: config.id_field,
            store_fields: config.store_fields,
            inverted_index,
            doc_store,
            dirty_count: data.dirty_count,
            tokenizer: config.tokenizer,
            term_processor: config.term_processor,
            extractor: config.extractor,
            search_options: config.search_options,
            auto_suggest_options: config.auto_suggest_options,
            auto_vacuum: config.auto_vacuum,
            logger: config.logger,
            vacuum_in_progress: false,
            queued_vacuum: false,
        })
    }
}

/// Yields to the executor exactly once. Hand-rolled rather than pulled from
/// an async runtime crate: the only place this index suspends is between
/// chunks of `add_all_async`/`vacuum`, and a bare `Future` impl covers that
/// without pulling in a scheduler this crate has no other use for.
struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<()> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

fn yield_now() -> YieldNow {
    YieldNow { yielded: false }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{CombineWith, FuzzyOption, PrefixOption};
    use serde_json::json;

    fn doc(id: &str, text: &str) -> serde_json::Map<String, Value> {
        let mut m = serde_json::Map::new();
        m.insert("id".to_owned(), json!(id));
        m.insert("text".to_owned(), json!(text));
        m
    }

    fn sample_index() -> SearchIndex<serde_json::Map<String, Value>> {
        let config = IndexConfig::for_json_documents(vec!["text".to_owned()]);
        let mut index = SearchIndex::new(config).unwrap();
        index.add(&doc("d1", "Nel mezzo del cammin di nostra vita")).unwrap();
        index
            .add(&doc("d2", "mi ritrovai per una selva oscura"))
            .unwrap();
        index.add(&doc("d3", "vita nova")).unwrap();
        index
    }

    fn titled_doc(id: &str, title: &str, text: &str) -> serde_json::Map<String, Value> {
        let mut m = serde_json::Map::new();
        m.insert("id".to_owned(), json!(id));
        m.insert("title".to_owned(), json!(title));
        m.insert("text".to_owned(), json!(text));
        m
    }

    /// The D1/D2/D3 corpus used throughout the design doc's scenario walkthroughs.
    fn divine_comedy_index() -> SearchIndex<serde_json::Map<String, Value>> {
        let config = IndexConfig::for_json_documents(vec!["title".to_owned(), "text".to_owned()]);
        let mut index = SearchIndex::new(config).unwrap();
        index
            .add(&titled_doc("d1", "Divina Commedia", "Nel mezzo del cammin di nostra vita"))
            .unwrap();
        index
            .add(&titled_doc("d2", "I Promessi Sposi", "Quel ramo del lago di Como"))
            .unwrap();
        index
            .add(&titled_doc("d3", "Vita Nova", "In quella parte del libro della mia memoria"))
            .unwrap();
        index
    }

    #[test]
    fn boosting_title_field_ranks_title_hit_above_text_only_hit() {
        let mut index = divine_comedy_index();
        let mut options = SearchOptions::default();
        options.boost.insert("title".to_owned(), 2.0);
        let results = index.search(&Query::text("vita"), Some(&options)).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["d3", "d1"]);
    }

    #[test]
    fn restricting_to_title_field_excludes_text_only_matches() {
        let mut index = divine_comedy_index();
        let mut options = SearchOptions::default();
        options.fields = Some(vec!["title".to_owned()]);
        let results = index.search(&Query::text("vita"), Some(&options)).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["d3"]);
    }

    #[test]
    fn and_not_on_a_multi_term_text_query_excludes_documents_matching_either_term() {
        let mut index = divine_comedy_index();
        let mut options = SearchOptions::default();
        options.combine_with = CombineWith::AndNot;
        let results = index.search(&Query::text("cammin como"), Some(&options)).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["d3"]);
    }

    #[test]
    fn add_rejects_missing_and_duplicate_ids() {
        let config = IndexConfig::for_json_documents(vec!["text".to_owned()]);
        let mut index = SearchIndex::new(config).unwrap();
        let mut missing_id = serde_json::Map::new();
        missing_id.insert("text".to_owned(), json!("no id here"));
        assert_eq!(index.add(&missing_id), Err(SearchError::MissingId));

        index.add(&doc("d1", "vita")).unwrap();
        assert_eq!(index.add(&doc("d1", "vita again")), Err(SearchError::DuplicateId));
    }

    #[test]
    fn search_finds_matching_documents_and_ranks_rarer_terms_higher() {
        let mut index = sample_index();
        let results = index.search(&Query::text("vita"), None).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert!(ids.contains(&"d1"));
        assert!(ids.contains(&"d3"));
        assert!(!ids.contains(&"d2"));
    }

    #[test]
    fn discard_then_vacuum_reclaims_postings() {
        let mut index = sample_index();
        index.discard("d1").unwrap();
        assert!(!index.has("d1"));
        assert_eq!(index.documents_count(), 2);

        // Postings referencing d1 are tombstoned, not yet gone.
        assert!(index.inverted_index.has("vita"));

        futures_lite_block_on(index.vacuum());

        let results = index.search(&Query::text("vita"), None).unwrap();
        assert!(results.iter().all(|r| r.id != "d1"));
    }

    #[test]
    fn replace_swaps_a_document_in_place() {
        let mut index = sample_index();
        index.replace(&doc("d1", "tutto cambia")).unwrap();
        assert!(index.has("d1"));

        let results = index.search(&Query::text("cambia"), None).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "d1");

        let old_term_results = index.search(&Query::text("mezzo"), None).unwrap();
        assert!(old_term_results.iter().all(|r| r.id != "d1"));
    }

    #[test]
    fn remove_all_with_none_clears_everything() {
        let mut index = sample_index();
        index.remove_all(None).unwrap();
        assert_eq!(index.documents_count(), 0);
        assert!(index.search(&Query::text("vita"), None).unwrap().is_empty());
    }

    #[test]
    fn and_not_combination_excludes_matching_subquery() {
        let mut index = sample_index();
        let query = Query::combine(
            CombineWith::AndNot,
            vec![Query::Wildcard, Query::text("vita")],
        );
        let results = index.search(&query, None).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert!(ids.contains(&"d2"));
        assert!(!ids.contains(&"d1"));
        assert!(!ids.contains(&"d3"));
    }

    #[test]
    fn fuzzy_search_matches_near_miss_spellings() {
        let mut index = sample_index();
        let mut options = SearchOptions::default();
        options.fuzzy = FuzzyOption::Distance(1);
        let results = index.search(&Query::text("vitaa"), Some(&options)).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert!(ids.contains(&"d1"));
        assert!(ids.contains(&"d3"));
    }

    #[test]
    fn prefix_search_matches_term_prefixes() {
        let mut index = sample_index();
        let mut options = SearchOptions::default();
        options.prefix = PrefixOption::Enabled;
        let results = index.search(&Query::text("cam"), Some(&options)).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert!(ids.contains(&"d1"));
    }

    #[test]
    fn auto_suggest_returns_matched_phrase_not_the_typed_prefix() {
        let mut index = sample_index();
        let suggestions = index.auto_suggest("vita no").unwrap();
        assert!(suggestions.iter().any(|s| s.phrase == "vita nova"));
    }

    #[test]
    fn search_rejects_unknown_field_names() {
        let mut index = sample_index();
        let mut options = SearchOptions::default();
        options.fields = Some(vec!["nonexistent".to_owned()]);
        match index.search(&Query::text("vita"), Some(&options)) {
            Err(SearchError::UnknownOption(name)) => assert_eq!(name, "nonexistent"),
            other => panic!("expected UnknownOption, got {other:?}"),
        }

        let mut boost_options = SearchOptions::default();
        boost_options.boost.insert("nonexistent".to_owned(), 2.0);
        match index.search(&Query::text("vita"), Some(&boost_options)) {
            Err(SearchError::UnknownOption(name)) => assert_eq!(name, "nonexistent"),
            other => panic!("expected UnknownOption, got {other:?}"),
        }
    }

    #[test]
    fn serialization_round_trips_searchable_state() {
        let index = sample_index();
        let snapshot = index.to_serialized();

        let config = IndexConfig::for_json_documents(vec!["text".to_owned()]);
        let mut restored = SearchIndex::from_serialized(snapshot, config).unwrap();

        assert_eq!(restored.documents_count(), 3);
        let results = restored.search(&Query::text("vita"), None).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert!(ids.contains(&"d1"));
        assert!(ids.contains(&"d3"));
    }

    /// A single-poll, no-dependency block_on: every future this crate
    /// produces only ever yields via `YieldNow`, which immediately wakes
    /// its waker, so a trivial poll loop suffices without pulling in an
    /// executor crate just for tests.
    fn futures_lite_block_on<F: Future<Output = ()>>(mut fut: F) {
        use std::task::{RawWaker, RawWakerVTable, Waker};

        fn noop(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            RawWaker::new(std::ptr::null(), &VTABLE)
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, noop, noop, noop);

        let raw_waker = RawWaker::new(std::ptr::null(), &VTABLE);
        let waker = unsafe { Waker::from_raw(raw_waker) };
        let mut cx = TaskContext::from_waker(&waker);

        // SAFETY: `fut` is a local variable that is never moved again after
        // this point, satisfying `Pin`'s guarantee for the lifetime of the
        // poll loop below.
        let mut fut = unsafe { Pin::new_unchecked(&mut fut) };
        loop {
            match fut.as_mut().poll(&mut cx) {
                Poll::Ready(()) => return,
                Poll::Pending => continue,
            }
        }
    }
}
