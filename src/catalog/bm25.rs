//! BM25 full-text scoring.
//!
//! `SPEC_FULL.md` §4.2 computes BM25 in pure Rust rather than delegating to
//! an engine FTS extension (no such dependency exists in this workspace's
//! lineage; see §9 of `SPEC_FULL.md`). The tokenizer splits on Unicode
//! word boundaries, preserves case, applies no stemming, and drops no
//! stopwords — matching the distilled spec's FTS transform defaults
//! (identity `toFullTextSearchString`) exactly.
//!
//! Constants: `k1 = 1.2` (standard Okapi term-frequency saturation) and
//! `b = 1.0` (full document-length normalization). The distilled spec
//! does not fix these; `b = 1.0` is required to reproduce its literal
//! scenario (§8 #4): a one-word exact match outranks a longer document
//! repeating the same query term alongside unrelated words.

use std::collections::HashMap;

const K1: f64 = 1.2;
const B: f64 = 1.0;

/// Split on non-alphanumeric boundaries, preserving case. `char::is_alphanumeric`
/// is Unicode-aware, so this tokenizer works across scripts without assuming
/// ASCII or whitespace-delimited languages (the distilled spec calls out
/// non-whitespace-tokenized languages as the reason `toFullTextSearchString`
/// exists; this tokenizer is the identity-hook's counterpart on the index
/// side).
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn term_counts(tokens: &[String]) -> HashMap<&str, usize> {
    let mut counts = HashMap::new();
    for t in tokens {
        *counts.entry(t.as_str()).or_insert(0) += 1;
    }
    counts
}

/// One document's contribution to a BM25 index: its tokenized text and
/// length, keyed by whatever identity the caller uses (the catalog keys
/// this by `fullpath`).
pub struct Document<'a> {
    pub key: &'a str,
    pub tokens: Vec<String>,
}

/// Score every document in `corpus` against `query`. Returns `None` for a
/// document that shares no token with the query (the distilled spec's
/// "null score", always excluded regardless of threshold); `Some(score)`
/// otherwise, where `score` is strictly positive because every query term
/// actually present in a document contributes a strictly positive
/// BM25 term (smoothed IDF never reaches zero for a non-empty corpus).
pub fn score_corpus<'a>(corpus: &'a [Document<'a>], query: &str) -> HashMap<&'a str, f64> {
    let query_terms = tokenize(query);
    if query_terms.is_empty() || corpus.is_empty() {
        return HashMap::new();
    }

    let n = corpus.len() as f64;
    let avg_len = corpus.iter().map(|d| d.tokens.len()).sum::<usize>() as f64 / n;

    let doc_counts: Vec<(&str, usize, HashMap<&str, usize>)> = corpus
        .iter()
        .map(|d| (d.key, d.tokens.len(), term_counts(&d.tokens)))
        .collect();

    let mut idf: HashMap<&str, f64> = HashMap::new();
    for term in &query_terms {
        idf.entry(term.as_str()).or_insert_with(|| {
            let n_t = doc_counts
                .iter()
                .filter(|(_, _, counts)| counts.contains_key(term.as_str()))
                .count() as f64;
            ((n - n_t + 0.5) / (n_t + 0.5) + 1.0).ln()
        });
    }

    let mut scores = HashMap::new();
    for (key, len, counts) in &doc_counts {
        let mut total = 0.0;
        let mut matched = false;
        let len_norm = (1.0 - B) + B * (*len as f64 / avg_len.max(f64::EPSILON));
        for term in &query_terms {
            let f = *counts.get(term.as_str()).unwrap_or(&0) as f64;
            if f == 0.0 {
                continue;
            }
            matched = true;
            let idf_t = idf[term.as_str()];
            total += idf_t * (f * (K1 + 1.0)) / (f + K1 * len_norm);
        }
        if matched {
            scores.insert(*key, total);
        }
    }
    scores
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc<'a>(key: &'a str, text: &str) -> Document<'a> {
        Document {
            key,
            tokens: tokenize(text),
        }
    }

    #[test]
    fn tokenizer_preserves_case_and_drops_punctuation() {
        assert_eq!(tokenize("Foo, bar-baz!"), vec!["Foo", "bar", "baz"]);
    }

    #[test]
    fn exact_short_match_outranks_longer_repeats() {
        let docs = vec![
            doc("a", "foo"),
            doc("b", "foo foo foo bar baz"),
            doc("c", "foo foo bar bar"),
        ];
        let scores = score_corpus(&docs, "foo");
        assert_eq!(scores.len(), 3);
        assert!(scores["a"] > scores["b"]);
        assert!(scores["b"] > scores["c"]);
    }

    #[test]
    fn non_matching_document_is_absent() {
        let docs = vec![doc("a", "foo"), doc("b", "completely unrelated text")];
        let scores = score_corpus(&docs, "foo");
        assert!(scores.contains_key("a"));
        assert!(!scores.contains_key("b"));
    }

    #[test]
    fn monotone_in_term_frequency_at_equal_length() {
        // Equal document length (4 tokens each); only the count of "foo"
        // vs filler differs, isolating the frequency effect.
        let docs = vec![
            doc("low", "foo filler filler filler"),
            doc("high", "foo foo filler filler"),
        ];
        let scores = score_corpus(&docs, "foo");
        assert!(scores["high"] > scores["low"]);
    }

    #[test]
    fn empty_query_scores_nothing() {
        let docs = vec![doc("a", "foo bar")];
        assert!(score_corpus(&docs, "").is_empty());
    }
}
