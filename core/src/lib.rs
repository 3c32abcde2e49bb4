pub mod engine;
pub mod error;
pub mod index;
pub mod persist;
pub mod tokenizer;

pub use engine::{idf, retrieve, tfidf, Ranking, ScoredDoc, SearchEngine, SearchOutcome};
pub use error::IndexError;
pub use index::{DocId, DocMeta, InvertedIndex, TermEntry, TermStats};
