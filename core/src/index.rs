use crate::error::IndexError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type DocId = String;

/// Presentation-side metadata for one document. The index itself never reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMeta {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Corpus-wide statistics of one term. Field names on disk follow the
/// `invertedIndex.txt` interchange format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermEntry {
    #[serde(rename = "docFreq")]
    pub doc_freq: u32,
    #[serde(rename = "docList")]
    pub postings: HashMap<DocId, u32>,
}

/// Result of [`InvertedIndex::lookup`]. A term missing from the index is
/// `doc_freq == 0` with no postings, never an error.
#[derive(Debug, Clone, Copy)]
pub struct TermStats<'a> {
    pub doc_freq: u32,
    postings: Option<&'a HashMap<DocId, u32>>,
}

impl<'a> TermStats<'a> {
    pub const ABSENT: TermStats<'static> = TermStats { doc_freq: 0, postings: None };

    pub fn is_absent(&self) -> bool {
        self.doc_freq == 0
    }

    /// Iterates `(doc_id, term_frequency)` pairs in unspecified order.
    pub fn postings(&self) -> impl Iterator<Item = (&'a str, u32)> + 'a {
        self.postings
            .into_iter()
            .flat_map(|p| p.iter().map(|(doc, tf)| (doc.as_str(), *tf)))
    }

    /// Raw term frequency of the term in `doc_id`, 0 when the document has no posting.
    pub fn term_frequency(&self, doc_id: &str) -> u32 {
        self.postings
            .and_then(|p| p.get(doc_id).copied())
            .unwrap_or(0)
    }
}

/// Immutable term -> postings mapping plus the corpus size `N`.
///
/// Built once (by the indexer or by loading a directory) and then only read.
/// Sharing across threads is done with `Arc<InvertedIndex>`; nothing mutates it
/// after [`InvertedIndex::validate`] has passed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvertedIndex {
    terms: HashMap<String, TermEntry>,
    num_docs: u32,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assembles an index from already-built entries and checks every invariant.
    pub fn from_terms(terms: HashMap<String, TermEntry>, num_docs: u32) -> Result<Self, IndexError> {
        let index = Self { terms, num_docs };
        index.validate()?;
        Ok(index)
    }

    /// Counts the stems of one document and adds its postings. Bumps the corpus size.
    pub fn add_document<I, S>(&mut self, doc_id: &str, stems: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tf_counts: HashMap<String, u32> = HashMap::new();
        for stem in stems {
            *tf_counts.entry(stem.into()).or_insert(0) += 1;
        }
        for (term, tf) in tf_counts {
            let entry = self.terms.entry(term).or_default();
            let slot = entry.postings.entry(doc_id.to_string()).or_insert(0);
            if *slot == 0 {
                entry.doc_freq += 1;
            }
            *slot += tf;
        }
        self.num_docs += 1;
    }

    /// Replaces the corpus size. Callers must re-run [`validate`](Self::validate).
    pub fn set_num_docs(&mut self, num_docs: u32) {
        self.num_docs = num_docs;
    }

    pub fn lookup(&self, term: &str) -> TermStats<'_> {
        match self.terms.get(term) {
            Some(entry) if entry.doc_freq > 0 => TermStats {
                doc_freq: entry.doc_freq,
                postings: Some(&entry.postings),
            },
            _ => TermStats::ABSENT,
        }
    }

    pub fn num_docs(&self) -> u32 {
        self.num_docs
    }

    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> impl Iterator<Item = (&str, &TermEntry)> {
        self.terms.iter().map(|(t, e)| (t.as_str(), e))
    }

    pub fn max_doc_freq(&self) -> u32 {
        self.terms.values().map(|e| e.doc_freq).max().unwrap_or(0)
    }

    /// Checks `doc_freq == |postings|`, `tf >= 1` and `N >= doc_freq` for every term.
    pub fn validate(&self) -> Result<(), IndexError> {
        for (term, entry) in &self.terms {
            if entry.doc_freq as usize != entry.postings.len() {
                return Err(IndexError::DocFreqMismatch {
                    term: term.clone(),
                    doc_freq: entry.doc_freq,
                    postings: entry.postings.len(),
                });
            }
            if let Some((doc_id, _)) = entry.postings.iter().find(|(_, tf)| **tf == 0) {
                return Err(IndexError::ZeroTermFrequency { term: term.clone(), doc_id: doc_id.clone() });
            }
            if entry.doc_freq > self.num_docs {
                return Err(IndexError::CorpusTooSmall {
                    term: term.clone(),
                    doc_freq: entry.doc_freq,
                    num_docs: self.num_docs,
                });
            }
        }
        Ok(())
    }
}
