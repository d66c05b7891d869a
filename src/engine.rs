//! Query evaluation: turns a [`Query`] tree plus [`SearchOptions`] into
//! scored [`SearchResult`]s.

use crate::doc_store::DocStore;
use crate::inverted_index::{FieldId, InvertedIndex, Postings, ShortId};
use crate::query::{CombineWith, Query, SearchOptions, SearchResult};
use crate::scorer::bm25_plus;
use crate::tokenize::{ProcessedTerm, TermProcessor, Tokenizer};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Borrowed handles to everything query evaluation needs to read (and, for
/// eager tombstone cleanup, mutate).
pub struct SearchContext<'a, Id> {
    pub inverted_index: &'a mut InvertedIndex,
    pub doc_store: &'a DocStore<Id>,
    pub field_ids: &'a HashMap<String, FieldId>,
    pub all_fields: &'a [String],
    pub default_tokenizer: &'a dyn Tokenizer,
    pub default_term_processor: &'a dyn TermProcessor,
}

/// A document's accumulated score and match provenance while a query tree
/// is being evaluated; converted into a [`SearchResult`] once the whole
/// tree has been folded.
#[derive(Clone)]
struct RawResult {
    score: f64,
    /// Indices into the flattened query-term list that contributed any
    /// match, used only for the final `|matched_terms|` multiplier.
    matched_query_terms: HashSet<usize>,
    /// Distinct expanded (dictionary) terms matched, in first-seen order —
    /// this is what's surfaced to callers and fed to `auto_suggest`.
    terms: Vec<String>,
    terms_seen: HashSet<String>,
    match_fields: HashMap<String, Vec<String>>,
}

impl RawResult {
    fn empty() -> Self {
        Self {
            score: 0.0,
            matched_query_terms: HashSet::new(),
            terms: Vec::new(),
            terms_seen: HashSet::new(),
            match_fields: HashMap::new(),
        }
    }

    fn record_match(&mut self, query_term_index: usize, matched_term: &str, field: &str) {
        self.matched_query_terms.insert(query_term_index);
        if self.terms_seen.insert(matched_term.to_owned()) {
            self.terms.push(matched_term.to_owned());
        }
        let fields = self.match_fields.entry(matched_term.to_owned()).or_insert_with(Vec::new);
        if !fields.iter().any(|f| f == field) {
            fields.push(field.to_owned());
        }
    }

    fn merge_additive(mut self, other: &RawResult) -> Self {
        self.score += other.score;
        for idx in &other.matched_query_terms {
            self.matched_query_terms.insert(*idx);
        }
        for term in &other.terms {
            if self.terms_seen.insert(term.clone()) {
                self.terms.push(term.clone());
            }
        }
        for (term, fields) in &other.match_fields {
            let entry = self.match_fields.entry(term.clone()).or_insert_with(Vec::new);
            for f in fields {
                if !entry.iter().any(|existing| existing == f) {
                    entry.push(f.clone());
                }
            }
        }
        self
    }
}

type ResultMap = HashMap<ShortId, RawResult>;

fn flatten_query_terms(
    text: &str,
    tokenizer: &dyn Tokenizer,
    processor: &dyn TermProcessor,
) -> Vec<String> {
    let mut terms = Vec::new();
    for token in tokenizer.tokenize(text, "") {
        match processor.process(&token, "") {
            ProcessedTerm::One(t) => terms.push(t),
            ProcessedTerm::Many(ts) => terms.extend(ts),
            ProcessedTerm::Skip => {}
        }
    }
    terms
}

/// Evaluates `query` against `ctx` under `options`, returning one raw
/// result per matching live document.
pub fn evaluate<Id>(query: &Query, ctx: &mut SearchContext<'_, Id>, options: &SearchOptions<Id>) -> ResultMap
where
    Id: Hash + Eq + Clone,
{
    match query {
        Query::Wildcard => ctx
            .doc_store
            .all_live_short_ids()
            .into_iter()
            .map(|id| (id, RawResult::empty()))
            .collect(),
        Query::Text(text) => evaluate_text(text, ctx, options),
        Query::Combination {
            combine_with,
            queries,
            options: patch,
        } => {
            let effective = match patch {
                Some(patch) => options.inherit(patch),
                None => options.clone(),
            };
            let mut acc: Option<ResultMap> = None;
            for q in queries {
                let r = evaluate(q, &mut *ctx, &effective);
                acc = Some(match acc {
                    None => r,
                    Some(prev) => combine_pair(*combine_with, prev, r),
                });
            }
            acc.unwrap_or_else(HashMap::new)
        }
    }
}

fn combine_pair(combine_with: CombineWith, a: ResultMap, b: ResultMap) -> ResultMap {
    match combine_with {
        CombineWith::Or => {
            let mut merged = a;
            for (short_id, raw) in b {
                merged
                    .entry(short_id)
                    .and_modify(|existing| *existing = existing.clone().merge_additive(&raw))
                    .or_insert(raw);
            }
            merged
        }
        CombineWith::And => {
            let mut merged = HashMap::new();
            for (short_id, raw) in a {
                if let Some(other) = b.get(&short_id) {
                    merged.insert(short_id, raw.merge_additive(other));
                }
            }
            merged
        }
        CombineWith::AndNot => {
            let mut merged = a;
            merged.retain(|short_id, _| !b.contains_key(short_id));
            merged
        }
    }
}

fn evaluate_text<Id>(text: &str, ctx: &mut SearchContext<'_, Id>, options: &SearchOptions<Id>) -> ResultMap
where
    Id: Hash + Eq + Clone,
{
    let tokenizer: &dyn Tokenizer = options.tokenize.as_deref().unwrap_or(ctx.default_tokenizer);
    let processor: &dyn TermProcessor = options
        .process_term
        .as_deref()
        .unwrap_or(ctx.default_term_processor);

    let query_terms = flatten_query_terms(text, tokenizer, processor);
    let requested_fields: Vec<String> = options
        .fields
        .clone()
        .unwrap_or_else(|| ctx.all_fields.to_vec());

    let mut to_delete: Vec<(String, FieldId, ShortId)> = Vec::new();

    // AND/AND_NOT fold from the universal set (every term narrows further);
    // OR folds from the empty set (every term adds more). Each query term's
    // matches are computed into their own map first and combined through
    // the same `combine_pair` the Combination operator uses, so a
    // multi-term text query actually respects `combine_with` instead of
    // always unioning additively.
    let mut acc: ResultMap = match options.combine_with {
        CombineWith::Or => HashMap::new(),
        CombineWith::And | CombineWith::AndNot => ctx
            .doc_store
            .all_live_short_ids()
            .into_iter()
            .map(|id| (id, RawResult::empty()))
            .collect(),
    };

    for (index, term) in query_terms.iter().enumerate() {
        let mut expansions: Vec<(String, f64, usize)> = Vec::new();
        let mut seen_expansions: HashSet<String> = HashSet::new();

        if ctx.inverted_index.has(term) {
            expansions.push((term.clone(), 1.0, 0));
            seen_expansions.insert(term.clone());
        }

        if options.prefix.applies(term, index, &query_terms) {
            for candidate in ctx.inverted_index.terms_with_prefix(term) {
                if seen_expansions.contains(&candidate) {
                    continue;
                }
                let candidate_len = candidate.chars().count() as f64;
                let term_len = term.chars().count() as f64;
                let weight = options.prefix_weight * candidate_len
                    / (candidate_len + 0.3 * (candidate_len - term_len));
                seen_expansions.insert(candidate.clone());
                expansions.push((candidate, weight, 0));
            }
        }

        if let Some(distance) = options.fuzzy.resolve(term, options.max_fuzzy) {
            for (candidate, (_, dist)) in ctx.inverted_index.fuzzy_terms(term, distance) {
                if dist == 0 || seen_expansions.contains(&candidate) {
                    continue;
                }
                let candidate_len = candidate.chars().count() as f64;
                let weight = options.fuzzy_weight * candidate_len / (candidate_len + dist as f64);
                seen_expansions.insert(candidate.clone());
                expansions.push((candidate, weight, dist));
            }
        }

        let mut term_map: ResultMap = HashMap::new();

        for (matched_term, weight, _dist) in expansions {
            let postings: Postings = match ctx.inverted_index.get(&matched_term) {
                Some(p) => p.clone(),
                None => continue,
            };

            for field_name in &requested_fields {
                let field_id = match ctx.field_ids.get(field_name) {
                    Some(id) => *id,
                    None => continue,
                };
                let field_postings = match postings.get(&field_id) {
                    Some(p) => p,
                    None => continue,
                };
                let n_f = field_postings.len() as u32;
                let total_docs = ctx.doc_store.documents_count() as u32;

                for (&short_id, &tf) in field_postings {
                    if !ctx.doc_store.is_live(short_id) {
                        to_delete.push((matched_term.clone(), field_id, short_id));
                        continue;
                    }

                    let external_id = match ctx.doc_store.get_external(short_id) {
                        Some(id) => id.clone(),
                        None => continue,
                    };

                    let doc_boost = match &options.boost_document {
                        Some(f) => {
                            let stored = ctx.doc_store.get_stored(short_id);
                            let factor = f(&external_id, &matched_term, stored);
                            if factor <= 0.0 {
                                continue;
                            }
                            factor
                        }
                        None => 1.0,
                    };

                    let field_boost = options.boost.get(field_name).copied().unwrap_or(1.0);
                    let doc_field_length = ctx.doc_store.field_length(short_id, field_id);
                    let avg_field_length = ctx.doc_store.avg_field_length(field_id);

                    let base_score = bm25_plus(
                        options.bm25,
                        total_docs,
                        n_f,
                        tf,
                        doc_field_length,
                        avg_field_length,
                    );
                    let contribution = base_score * weight * field_boost * doc_boost;

                    let entry = term_map.entry(short_id).or_insert_with(RawResult::empty);
                    entry.score += contribution;
                    entry.record_match(index, &matched_term, field_name);
                }
            }
        }

        acc = combine_pair(options.combine_with, acc, term_map);
    }

    for (term, field_id, short_id) in to_delete {
        ctx.inverted_index.remove_occurrence(&term, field_id, short_id);
    }

    acc
}

pub fn finalize<Id>(
    results: ResultMap,
    ctx: &SearchContext<'_, Id>,
    store_fields: bool,
    filter: &Option<std::sync::Arc<dyn Fn(&SearchResult<Id>) -> bool + Send + Sync>>,
) -> Vec<SearchResult<Id>>
where
    Id: Hash + Eq + Clone,
{
    let mut out: Vec<(ShortId, SearchResult<Id>)> = results
        .into_iter()
        .filter_map(|(short_id, raw)| {
            let external_id = ctx.doc_store.get_external(short_id)?.clone();
            let multiplier = raw.matched_query_terms.len().max(1) as f64;
            let stored_fields = if store_fields {
                ctx.doc_store.get_stored(short_id).cloned()
            } else {
                None
            };
            let result = SearchResult {
                id: external_id,
                score: raw.score * multiplier,
                terms: raw.terms,
                match_data: raw.match_fields,
                stored_fields,
            };
            Some((short_id, result))
        })
        .filter(|(_, result)| filter.as_ref().map(|f| f(result)).unwrap_or(true))
        .collect();

    out.sort_by(|(id_a, a), (id_b, b)| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(id_a.cmp(id_b))
    });

    out.into_iter().map(|(_, result)| result).collect()
}
