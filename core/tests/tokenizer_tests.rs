use search_core::tokenizer::normalize;

#[test]
fn it_lowercases_and_stems() {
    let words = normalize("Running Runners RUN!");
    assert_eq!(words, vec!["run", "runner", "run"]);
}

#[test]
fn empty_and_blank_queries_normalize_to_nothing() {
    assert!(normalize("").is_empty());
    assert!(normalize("   \t\n").is_empty());
    assert!(normalize("123 -- 456 ??").is_empty());
}

#[test]
fn it_keeps_stopwords_and_order() {
    // No stopword filtering: "the" must still reach the index lookup.
    let words = normalize("the cats and the dogs");
    assert_eq!(words, vec!["the", "cat", "and", "the", "dog"]);
}

#[test]
fn apostrophes_separate_tokens() {
    let words = normalize("runner's");
    assert_eq!(words, vec!["runner", "s"]);
}
