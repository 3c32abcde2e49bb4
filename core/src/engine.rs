//! Cosine-similarity retrieval over an [`InvertedIndex`].
//!
//! Scoring is document-at-a-time: every query term's postings list is walked
//! once, feeding a per-query accumulator table with the partial dot product
//! and the partial squared length of each touched document. Documents that
//! share no term with the query never enter the table.
//!
//! Weights:
//! - `idf = ln(N / df)`, `0` when `df == 0`
//! - document weight `tf * idf`
//! - query weight `idf` for every occurrence of a term in the query
//!
//! `score = dot / (|d| * |q|)`, `0` when either length is zero. Rankings are
//! ordered by score descending, then by document id ascending.

use crate::index::{DocId, DocMeta, InvertedIndex};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Inverse document frequency, `ln(N / df)`. Zero for unknown terms or an empty corpus.
pub fn idf(doc_freq: u32, num_docs: u32) -> f64 {
    if doc_freq == 0 || num_docs == 0 {
        return 0.0;
    }
    (num_docs as f64 / doc_freq as f64).ln()
}

/// Document-side weight of a term: raw term frequency times idf.
pub fn tfidf(term_frequency: u32, doc_freq: u32, num_docs: u32) -> f64 {
    if term_frequency == 0 || doc_freq == 0 {
        return 0.0;
    }
    term_frequency as f64 * idf(doc_freq, num_docs)
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Accumulator {
    pub dot_product: f64,
    pub length_sq: f64,
}

impl Accumulator {
    fn cosine(&self, query_weight_sq: f64) -> f64 {
        let denominator = self.length_sq.sqrt() * query_weight_sq.sqrt();
        if denominator > 0.0 {
            self.dot_product / denominator
        } else {
            0.0
        }
    }
}

/// Per-query scoring state. Borrows document ids from the index and is dropped
/// once ranked.
#[derive(Debug, Default)]
pub struct Accumulation<'a> {
    docs: HashMap<&'a str, Accumulator>,
    query_weight_sq: f64,
}

impl<'a> Accumulation<'a> {
    /// Walks the postings of every query term, in query order. Repeated terms
    /// are accumulated once per occurrence, on both the query and document side.
    pub fn collect<S: AsRef<str>>(terms: &[S], index: &'a InvertedIndex) -> Self {
        let num_docs = index.num_docs();
        let mut acc = Accumulation::default();
        for term in terms {
            let stats = index.lookup(term.as_ref());
            let query_weight = idf(stats.doc_freq, num_docs);
            acc.query_weight_sq += query_weight * query_weight;
            if stats.is_absent() {
                continue;
            }
            for (doc_id, tf) in stats.postings() {
                let w = tfidf(tf, stats.doc_freq, num_docs);
                let slot = acc.docs.entry(doc_id).or_default();
                slot.dot_product += w * query_weight;
                slot.length_sq += w * w;
            }
        }
        acc
    }

    pub fn query_weight_sq(&self) -> f64 {
        self.query_weight_sq
    }

    pub fn get(&self, doc_id: &str) -> Option<&Accumulator> {
        self.docs.get(doc_id)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Cosine-normalizes every accumulated document and sorts the result.
    pub fn rank(self) -> Ranking {
        let query_weight_sq = self.query_weight_sq;
        let mut hits: Vec<ScoredDoc> = self
            .docs
            .into_iter()
            .map(|(doc_id, acc)| ScoredDoc { doc_id: doc_id.to_string(), score: acc.cosine(query_weight_sq) })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });
        Ranking { hits }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredDoc {
    pub doc_id: DocId,
    pub score: f64,
}

/// Documents ordered by score descending, ties by `doc_id` ascending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ranking {
    hits: Vec<ScoredDoc>,
}

impl Ranking {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScoredDoc> {
        self.hits.iter()
    }

    pub fn as_slice(&self) -> &[ScoredDoc] {
        &self.hits
    }

    pub fn into_vec(self) -> Vec<ScoredDoc> {
        self.hits
    }

    /// Keeps the `k` best entries.
    pub fn top(mut self, k: usize) -> Ranking {
        self.hits.truncate(k);
        self
    }
}

impl IntoIterator for Ranking {
    type Item = ScoredDoc;
    type IntoIter = std::vec::IntoIter<ScoredDoc>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.into_iter()
    }
}

/// Rank every document sharing at least one term with `terms`.
///
/// Pure function of its inputs: no state survives the call, so one index can
/// serve any number of concurrent callers.
pub fn retrieve<S: AsRef<str>>(terms: &[S], index: &InvertedIndex) -> Ranking {
    Accumulation::collect(terms, index).rank()
}

/// Result of one [`SearchEngine::search`] call.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub query: String,
    pub terms: Vec<String>,
    pub hits: Vec<ScoredDoc>,
    /// Candidate count before the result limit was applied.
    pub total_hits: usize,
    pub elapsed: Duration,
}

/// Loaded index plus document metadata, cheap to clone and share between workers.
#[derive(Debug, Clone)]
pub struct SearchEngine {
    index: Arc<InvertedIndex>,
    docs: Arc<HashMap<DocId, DocMeta>>,
    // Every id with at least one posting, collected once at construction.
    doc_ids: Arc<HashSet<DocId>>,
}

impl SearchEngine {
    pub fn new(index: InvertedIndex) -> Self {
        let doc_ids: HashSet<DocId> = index
            .terms()
            .flat_map(|(_, entry)| entry.postings.keys().cloned())
            .collect();
        Self { index: Arc::new(index), docs: Arc::new(HashMap::new()), doc_ids: Arc::new(doc_ids) }
    }

    pub fn with_docs(mut self, docs: HashMap<DocId, DocMeta>) -> Self {
        self.docs = Arc::new(docs);
        self
    }

    pub fn index(&self) -> &InvertedIndex {
        &self.index
    }

    pub fn doc_meta(&self, doc_id: &str) -> Option<&DocMeta> {
        self.docs.get(doc_id)
    }

    /// True when the index holds a posting for `doc_id` or metadata describes it.
    pub fn contains_document(&self, doc_id: &str) -> bool {
        self.doc_ids.contains(doc_id) || self.docs.contains_key(doc_id)
    }

    /// Normalize, retrieve and optionally truncate. The timer covers all three.
    pub fn search(&self, raw_query: &str, limit: Option<usize>) -> SearchOutcome {
        let start = Instant::now();
        let terms = crate::tokenizer::normalize(raw_query);
        let ranking = retrieve(&terms, &self.index);
        let total_hits = ranking.len();
        let ranking = match limit {
            Some(k) => ranking.top(k),
            None => ranking,
        };
        let elapsed = start.elapsed();
        tracing::debug!(terms = terms.len(), total_hits, elapsed_us = elapsed.as_micros() as u64, "query served");
        SearchOutcome {
            query: raw_query.to_string(),
            terms,
            hits: ranking.into_vec(),
            total_hits,
            elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn run_index() -> InvertedIndex {
        let mut index = InvertedIndex::new();
        index.add_document("docA", ["run", "run", "run"]);
        index.add_document("docB", ["run"]);
        index.set_num_docs(10);
        index
    }

    // N = 4; "a" in d1 (tf 1) and d2 (tf 2); "b" only in d1.
    fn two_term_index() -> InvertedIndex {
        let mut index = InvertedIndex::new();
        index.add_document("d1", ["a", "b"]);
        index.add_document("d2", ["a", "a"]);
        index.add_document("d3", ["c"]);
        index.add_document("d4", ["c"]);
        index
    }

    #[test]
    fn idf_degenerate_inputs_are_zero() {
        assert_eq!(idf(0, 10), 0.0);
        assert_eq!(idf(3, 0), 0.0);
        assert_eq!(idf(10, 10), 0.0);
        assert_eq!(tfidf(0, 2, 10), 0.0);
        assert_eq!(tfidf(5, 0, 10), 0.0);
    }

    #[test]
    fn single_term_weights_match_hand_computation() {
        let index = run_index();
        let acc = Accumulation::collect(&["run"], &index);
        let idf = (10.0f64 / 2.0).ln();
        assert!((acc.query_weight_sq() - idf * idf).abs() < EPS);
        let a = acc.get("docA").unwrap();
        assert!((a.dot_product - 3.0 * idf * idf).abs() < EPS);
        assert!((a.length_sq - 9.0 * idf * idf).abs() < EPS);
    }

    #[test]
    fn single_term_cosine_is_one_and_ties_break_by_id() {
        let ranking = retrieve(&["run"], &run_index());
        let hits = ranking.as_slice();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].doc_id, "docA");
        assert_eq!(hits[1].doc_id, "docB");
        for hit in hits {
            assert!((hit.score - 1.0).abs() < EPS, "score was {}", hit.score);
        }
    }

    #[test]
    fn two_term_scores() {
        let ranking = retrieve(&["a", "b"], &two_term_index());
        let hits = ranking.as_slice();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].doc_id, "d1");
        assert!((hits[0].score - 1.0).abs() < EPS);
        assert_eq!(hits[1].doc_id, "d2");
        assert!((hits[1].score - 1.0 / 5f64.sqrt()).abs() < EPS);
    }

    #[test]
    fn repeated_query_terms_count_per_occurrence() {
        let index = two_term_index();
        let l = 2f64.ln();
        let acc = Accumulation::collect(&["a", "a", "b"], &index);
        assert!((acc.query_weight_sq() - 6.0 * l * l).abs() < EPS);

        let ranking = retrieve(&["a", "a", "b"], &index);
        let d2 = ranking.iter().find(|h| h.doc_id == "d2").unwrap();
        // Deduplicating would give 1/sqrt(5) instead.
        assert!((d2.score - 4.0 / 48f64.sqrt()).abs() < EPS);
    }

    #[test]
    fn repeating_a_term_never_decreases_dot_product() {
        let index = two_term_index();
        let once = Accumulation::collect(&["a", "b"], &index);
        let twice = Accumulation::collect(&["a", "b", "a"], &index);
        for doc in ["d1", "d2"] {
            assert!(twice.get(doc).unwrap().dot_product >= once.get(doc).unwrap().dot_product);
        }
    }

    #[test]
    fn term_in_every_document_scores_zero_but_is_returned() {
        let mut index = InvertedIndex::new();
        index.add_document("x", ["common"]);
        index.add_document("y", ["common", "common"]);
        let ranking = retrieve(&["common"], &index);
        let ids: Vec<&str> = ranking.iter().map(|h| h.doc_id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y"]);
        assert!(ranking.iter().all(|h| h.score == 0.0));
    }

    #[test]
    fn documents_without_shared_terms_are_filtered() {
        let ranking = retrieve(&["b"], &two_term_index());
        let ids: Vec<&str> = ranking.iter().map(|h| h.doc_id.as_str()).collect();
        assert_eq!(ids, vec!["d1"]);
    }

    #[test]
    fn empty_and_unknown_queries_rank_nothing() {
        let index = two_term_index();
        let empty: [&str; 0] = [];
        assert!(retrieve(&empty, &index).is_empty());
        let acc = Accumulation::collect(&["zzz", "qqq"], &index);
        assert_eq!(acc.query_weight_sq(), 0.0);
        assert!(acc.rank().is_empty());
    }

    #[test]
    fn top_truncates_after_sorting() {
        let ranking = retrieve(&["a"], &two_term_index()).top(1);
        assert_eq!(ranking.len(), 1);
        assert_eq!(ranking.as_slice()[0].doc_id, "d1");
    }

    #[test]
    fn search_reports_total_hits_before_limit() {
        let engine = SearchEngine::new(run_index());
        let out = engine.search("Running", Some(1));
        assert_eq!(out.terms, vec!["run"]);
        assert_eq!(out.total_hits, 2);
        assert_eq!(out.hits.len(), 1);

        let none = engine.search("", None);
        assert!(none.terms.is_empty());
        assert!(none.hits.is_empty());
        assert_eq!(none.total_hits, 0);
    }

    #[test]
    fn contains_document_covers_postings_and_metadata() {
        let docs = HashMap::from([("meta-only".to_string(), DocMeta::default())]);
        let engine = SearchEngine::new(two_term_index()).with_docs(docs);
        assert!(engine.contains_document("d1"));
        assert!(engine.contains_document("d4"));
        assert!(engine.contains_document("meta-only"));
        assert!(!engine.contains_document("d5"));
    }

    #[test]
    fn concurrent_queries_share_one_index() {
        let engine = SearchEngine::new(two_term_index());
        let expected = engine.search("a b", None).hits;
        let engine = &engine;
        std::thread::scope(|s| {
            let handles: Vec<_> = (0..8).map(|_| s.spawn(move || engine.search("a b", None).hits)).collect();
            for h in handles {
                assert_eq!(h.join().unwrap(), expected);
            }
        });
    }
}
