use thiserror::Error;

/// Reasons an index is refused at load time.
///
/// Queries never fail; every variant here is a startup failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// `doc_freq` disagrees with the number of postings recorded for the term
    #[error("term {term:?}: doc_freq is {doc_freq} but {postings} postings are stored")]
    DocFreqMismatch { term: String, doc_freq: u32, postings: usize },
    /// A posting carries a term frequency of zero
    #[error("term {term:?}: document {doc_id:?} has term frequency 0")]
    ZeroTermFrequency { term: String, doc_id: String },
    /// The corpus is smaller than the number of documents some term occurs in
    #[error("corpus size {num_docs} is smaller than doc_freq {doc_freq} of term {term:?}")]
    CorpusTooSmall { term: String, doc_freq: u32, num_docs: u32 },
    /// Two input documents share one identifier
    #[error("duplicate document id {0:?}")]
    DuplicateDocument(String),
}
