//! Query representation and search options.

use crate::scorer::Bm25Params;
use crate::tokenize::{TermProcessor, Tokenizer};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// How sibling queries in a [`Query::Combination`] are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineWith {
    Or,
    And,
    AndNot,
}

/// A query tree: either free text to tokenize and expand, or a combination
/// of child queries joined by an operator.
pub enum Query {
    /// Free text, tokenized and expanded (exact/prefix/fuzzy) per term.
    Text(String),
    /// Matches every live document. Most useful as the first operand of an
    /// `AND_NOT` combination ("all documents except...").
    Wildcard,
    Combination {
        combine_with: CombineWith,
        queries: Vec<Query>,
        /// Overrides inherited from the parent's options for this subtree.
        options: Option<SearchOptionsPatch>,
    },
}

impl Query {
    pub fn text(s: impl Into<String>) -> Self {
        Query::Text(s.into())
    }

    pub fn combine(combine_with: CombineWith, queries: Vec<Query>) -> Self {
        Query::Combination {
            combine_with,
            queries,
            options: None,
        }
    }

    pub fn combine_with_options(
        combine_with: CombineWith,
        queries: Vec<Query>,
        options: SearchOptionsPatch,
    ) -> Self {
        Query::Combination {
            combine_with,
            queries,
            options: Some(options),
        }
    }
}

/// Whether and how aggressively prefix expansion applies to a query term.
/// The function variant receives the term, its index among the query's
/// terms, and the full term list, so a caller can e.g. only prefix-expand
/// the last term (as `auto_suggest` does).
#[derive(Clone)]
pub enum PrefixOption {
    Disabled,
    Enabled,
    PerTerm(Arc<dyn Fn(&str, usize, &[String]) -> bool + Send + Sync>),
}

impl PrefixOption {
    pub fn applies(&self, term: &str, index: usize, terms: &[String]) -> bool {
        match self {
            PrefixOption::Disabled => false,
            PrefixOption::Enabled => true,
            PrefixOption::PerTerm(f) => f(term, index, terms),
        }
    }
}

/// Whether and how aggressively fuzzy expansion applies to a query term.
/// `Fraction(f)` means "edit distance = round(term length * f)".
#[derive(Clone)]
pub enum FuzzyOption {
    Disabled,
    Distance(usize),
    Fraction(f64),
}

impl FuzzyOption {
    /// Resolves to a concrete edit-distance budget for `term`, or `None` if
    /// fuzzy matching is disabled for it. Only the fractional form is
    /// clamped to `max_fuzzy`; an explicit distance is used as given.
    pub fn resolve(&self, term: &str, max_fuzzy: usize) -> Option<usize> {
        match self {
            FuzzyOption::Disabled => None,
            FuzzyOption::Distance(d) => Some(*d),
            FuzzyOption::Fraction(f) => {
                let distance = (term.chars().count() as f64 * f).round() as usize;
                Some(distance.min(max_fuzzy))
            }
        }
    }
}

/// Per-search (or per-subquery) configuration. Unset fields inherit from
/// the parent query's options, which in turn inherit from the index's
/// configured defaults.
#[derive(Clone)]
pub struct SearchOptions<Id = String> {
    pub fields: Option<Vec<String>>,
    pub filter: Option<Arc<dyn Fn(&SearchResult<Id>) -> bool + Send + Sync>>,
    pub boost: HashMap<String, f64>,
    pub boost_document:
        Option<Arc<dyn Fn(&Id, &str, Option<&HashMap<String, Value>>) -> f64 + Send + Sync>>,
    pub prefix: PrefixOption,
    pub fuzzy: FuzzyOption,
    pub prefix_weight: f64,
    pub fuzzy_weight: f64,
    pub max_fuzzy: usize,
    pub combine_with: CombineWith,
    pub tokenize: Option<Arc<dyn Tokenizer>>,
    pub process_term: Option<Arc<dyn TermProcessor>>,
    pub bm25: Bm25Params,
}

impl<Id> Default for SearchOptions<Id> {
    fn default() -> Self {
        Self {
            fields: None,
            filter: None,
            boost: HashMap::new(),
            boost_document: None,
            prefix: PrefixOption::Disabled,
            fuzzy: FuzzyOption::Disabled,
            prefix_weight: 0.375,
            fuzzy_weight: 0.45,
            max_fuzzy: 6,
            combine_with: CombineWith::Or,
            tokenize: None,
            process_term: None,
            bm25: Bm25Params::default(),
        }
    }
}

impl<Id> SearchOptions<Id> {
    /// Defaults used by `auto_suggest`: AND-combined, prefix expansion on
    /// the last term only.
    pub fn auto_suggest_defaults() -> Self {
        Self {
            combine_with: CombineWith::And,
            prefix: PrefixOption::PerTerm(Arc::new(|_term, index, terms| index + 1 == terms.len())),
            ..Self::default()
        }
    }

    /// Overlays `overrides` on top of `self`: every field `overrides`
    /// actually sets wins, everything else is inherited from `self`.
    pub fn inherit(&self, overrides: &SearchOptionsPatch<Id>) -> Self {
        let mut merged = self.clone();
        if let Some(fields) = &overrides.fields {
            merged.fields = Some(fields.clone());
        }
        if let Some(filter) = &overrides.filter {
            merged.filter = Some(filter.clone());
        }
        if let Some(boost) = &overrides.boost {
            merged.boost = boost.clone();
        }
        if let Some(boost_document) = &overrides.boost_document {
            merged.boost_document = Some(boost_document.clone());
        }
        if let Some(prefix) = &overrides.prefix {
            merged.prefix = prefix.clone();
        }
        if let Some(fuzzy) = &overrides.fuzzy {
            merged.fuzzy = fuzzy.clone();
        }
        if let Some(w) = overrides.prefix_weight {
            merged.prefix_weight = w;
        }
        if let Some(w) = overrides.fuzzy_weight {
            merged.fuzzy_weight = w;
        }
        if let Some(m) = overrides.max_fuzzy {
            merged.max_fuzzy = m;
        }
        if let Some(c) = overrides.combine_with {
            merged.combine_with = c;
        }
        if let Some(t) = &overrides.tokenize {
            merged.tokenize = Some(t.clone());
        }
        if let Some(p) = &overrides.process_term {
            merged.process_term = Some(p.clone());
        }
        if let Some(bm25) = overrides.bm25 {
            merged.bm25 = bm25;
        }
        merged
    }
}

/// A sparse set of overrides applied to an inherited [`SearchOptions`] at
/// one level of a query tree.
#[derive(Clone, Default)]
pub struct SearchOptionsPatch<Id = String> {
    pub fields: Option<Vec<String>>,
    pub filter: Option<Arc<dyn Fn(&SearchResult<Id>) -> bool + Send + Sync>>,
    pub boost: Option<HashMap<String, f64>>,
    pub boost_document:
        Option<Arc<dyn Fn(&Id, &str, Option<&HashMap<String, Value>>) -> f64 + Send + Sync>>,
    pub prefix: Option<PrefixOption>,
    pub fuzzy: Option<FuzzyOption>,
    pub prefix_weight: Option<f64>,
    pub fuzzy_weight: Option<f64>,
    pub max_fuzzy: Option<usize>,
    pub combine_with: Option<CombineWith>,
    pub tokenize: Option<Arc<dyn Tokenizer>>,
    pub process_term: Option<Arc<dyn TermProcessor>>,
    pub bm25: Option<Bm25Params>,
}

/// One scored hit from a search.
#[derive(Debug, Clone)]
pub struct SearchResult<Id> {
    pub id: Id,
    pub score: f64,
    pub terms: Vec<String>,
    /// For each matched query term, the fields it was found in.
    pub match_data: HashMap<String, Vec<String>>,
    pub stored_fields: Option<HashMap<String, Value>>,
}

impl<Id> std::fmt::Debug for SearchOptions<Id> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchOptions")
            .field("fields", &self.fields)
            .field("combine_with", &self.combine_with)
            .field("max_fuzzy", &self.max_fuzzy)
            .finish()
    }
}

/// One aggregated phrase suggestion from `auto_suggest`.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub phrase: String,
    pub terms: Vec<String>,
    pub score: f64,
}
