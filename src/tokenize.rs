//! Injectable text-processing collaborators: how a document's fields turn
//! into strings, how those strings split into tokens, and how tokens turn
//! into indexed terms.

use regex::Regex;
use std::borrow::Cow;

lazy_static::lazy_static! {
    static ref TOKEN_SEPARATOR: Regex =
        Regex::new(r"[^\w]+").expect("token separator regex is valid");
}

/// Splits field text into an ordered sequence of tokens.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str, field_name: &str) -> Vec<String>;
}

/// Splits on runs of non-word characters, matching Unicode's notion of a
/// "word" character. `field_name` is available to tokenizers that vary
/// behavior per field but is ignored by the default.
pub struct DefaultTokenizer;

impl Tokenizer for DefaultTokenizer {
    fn tokenize(&self, text: &str, _field_name: &str) -> Vec<String> {
        TOKEN_SEPARATOR
            .split(text)
            .filter(|token| !token.is_empty())
            .map(|token| token.to_owned())
            .collect()
    }
}

/// The three-valued outcome of processing one token into zero, one, or
/// several indexed terms.
pub enum ProcessedTerm {
    One(String),
    Many(Vec<String>),
    Skip,
}

pub trait TermProcessor: Send + Sync {
    fn process(&self, token: &str, field_name: &str) -> ProcessedTerm;
}

/// Lowercases the token and keeps it, unless it's empty once lowercased.
pub struct DefaultTermProcessor;

impl TermProcessor for DefaultTermProcessor {
    fn process(&self, token: &str, _field_name: &str) -> ProcessedTerm {
        let lowered = token.to_lowercase();
        if lowered.is_empty() {
            ProcessedTerm::Skip
        } else {
            ProcessedTerm::One(lowered)
        }
    }
}

/// Reads a named field's value out of a document, coercing whatever it
/// finds to a string. Returns `None` if the field is absent, in which case
/// the caller silently skips it.
pub trait Extractor<D>: Send + Sync {
    fn extract<'d>(&self, document: &'d D, field_name: &str) -> Option<Cow<'d, str>>;
}

/// Extracts from a flat `field name → JSON value` record, coercing
/// non-string values (numbers, booleans) to their string form and
/// rejecting arrays/objects/null as unextractable.
pub struct JsonRecordExtractor;

impl Extractor<serde_json::Map<String, serde_json::Value>> for JsonRecordExtractor {
    fn extract<'d>(
        &self,
        document: &'d serde_json::Map<String, serde_json::Value>,
        field_name: &str,
    ) -> Option<Cow<'d, str>> {
        match document.get(field_name)? {
            serde_json::Value::String(s) => Some(Cow::Borrowed(s.as_str())),
            serde_json::Value::Number(n) => Some(Cow::Owned(n.to_string())),
            serde_json::Value::Bool(b) => Some(Cow::Owned(b.to_string())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tokenizer_splits_on_punctuation_and_space() {
        let tokens = DefaultTokenizer.tokenize("Nel mezzo del cammin, di nostra vita", "text");
        assert_eq!(
            tokens,
            vec!["Nel", "mezzo", "del", "cammin", "di", "nostra", "vita"]
        );
    }

    #[test]
    fn default_term_processor_lowercases() {
        match DefaultTermProcessor.process("Vita", "text") {
            ProcessedTerm::One(term) => assert_eq!(term, "vita"),
            _ => panic!("expected a single processed term"),
        }
    }

    #[test]
    fn json_record_extractor_coerces_numbers() {
        let mut doc = serde_json::Map::new();
        doc.insert("id".to_owned(), serde_json::json!(42));
        doc.insert("title".to_owned(), serde_json::json!("Vita Nova"));

        assert_eq!(JsonRecordExtractor.extract(&doc, "id").unwrap(), "42");
        assert_eq!(
            JsonRecordExtractor.extract(&doc, "title").unwrap(),
            "Vita Nova"
        );
        assert!(JsonRecordExtractor.extract(&doc, "missing").is_none());
    }
}
