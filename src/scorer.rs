//! BM25+ relevance scoring.

/// Tunable BM25+ parameters. `k` must be strictly positive; `b` and `d`
/// must be non-negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    pub k: f64,
    pub b: f64,
    pub d: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k: 1.2,
            b: 0.7,
            d: 0.5,
        }
    }
}

/// BM25+ contribution of a single (term, field, document) match.
///
/// - `total_docs`: N, total live document count.
/// - `docs_with_term_in_field`: n_f, size of the (term, field) posting map.
/// - `term_frequency`: tf, occurrences of the term in this field of this doc.
/// - `doc_field_length`: L, the document's unique-token count in this field.
/// - `avg_field_length`: L_avg, the running average for this field.
pub fn bm25_plus(
    params: Bm25Params,
    total_docs: u32,
    docs_with_term_in_field: u32,
    term_frequency: u32,
    doc_field_length: u32,
    avg_field_length: f64,
) -> f64 {
    let n = total_docs as f64;
    let n_f = docs_with_term_in_field as f64;
    let tf = term_frequency as f64;
    let l = doc_field_length as f64;
    let l_avg = if avg_field_length > 0.0 {
        avg_field_length
    } else {
        1.0
    };

    let idf = (1.0 + (n - n_f + 0.5) / (n_f + 0.5)).ln();
    let normalized_length = params.k * (1.0 - params.b + params.b * l / l_avg);
    idf * (params.d + tf * (params.k + 1.0) / (tf + normalized_length))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rarer_terms_score_higher_at_equal_tf() {
        let params = Bm25Params::default();
        let common = bm25_plus(params, 100, 80, 1, 10, 10.0);
        let rare = bm25_plus(params, 100, 2, 1, 10, 10.0);
        assert!(rare > common);
    }

    #[test]
    fn higher_term_frequency_scores_higher() {
        let params = Bm25Params::default();
        let low_tf = bm25_plus(params, 100, 10, 1, 10, 10.0);
        let high_tf = bm25_plus(params, 100, 10, 5, 10, 10.0);
        assert!(high_tf > low_tf);
    }

    #[test]
    fn longer_than_average_documents_are_penalized() {
        let params = Bm25Params::default();
        let short_doc = bm25_plus(params, 100, 10, 3, 5, 10.0);
        let long_doc = bm25_plus(params, 100, 10, 3, 40, 10.0);
        assert!(short_doc > long_doc);
    }

    #[test]
    fn delta_keeps_score_strictly_positive_for_any_match() {
        let params = Bm25Params::default();
        let score = bm25_plus(params, 100, 99, 1, 1000, 10.0);
        assert!(score > 0.0);
    }
}
