//! In-memory, incrementally updatable full-text search index with BM25+
//! ranking.
//!
//! [`SearchIndex`] owns the whole lifecycle: add/remove/discard/replace
//! documents, run [`Query`] trees against them, and vacuum tombstoned
//! postings left behind by `discard`. Everything underneath — the
//! [`radix`] prefix tree, the [`inverted_index`], the [`scorer`], the
//! [`query`] engine — is usable on its own, but `SearchIndex` is the
//! intended entry point.

pub mod doc_store;
pub mod engine;
pub mod error;
pub mod index;
pub mod inverted_index;
pub mod logger;
pub mod query;
pub mod radix;
pub mod scorer;
pub mod serialize;
pub mod tokenize;

pub use doc_store::DocStore;
pub use error::{Result, SearchError};
pub use index::{AutoVacuumPolicy, BulkOutcome, IndexConfig, RemoveOutcome, SearchIndex};
pub use inverted_index::InvertedIndex;
pub use logger::{LogLevel, Logger};
pub use query::{CombineWith, FuzzyOption, PrefixOption, Query, SearchOptions, SearchResult, Suggestion};
pub use radix::RadixMap;
pub use serialize::SerializedIndex;
pub use tokenize::{Extractor, JsonRecordExtractor, TermProcessor, Tokenizer};
