use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    // Any run of letters; digits, apostrophes and punctuation all separate tokens.
    static ref RE: Regex = Regex::new(r"\p{Alphabetic}+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
}

/// Normalize free text into the stems the index is keyed by: NFKC, lowercase,
/// split on every non-alphabetic character, English stemming.
///
/// Total: input with no letters (including `""`) yields an empty vector. Order
/// and duplicates of the input are preserved.
pub fn normalize(text: &str) -> Vec<String> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    RE.find_iter(&normalized)
        .map(|mat| STEMMER.stem(mat.as_str()).into_owned())
        .collect()
}
