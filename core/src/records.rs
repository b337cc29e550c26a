/// Groups the alphabetic words of `text` into single-column records of
/// `words_per_sentence` words each. Non-alphabetic characters are dropped
/// and everything is lowercased, so "Don't stop!" becomes "dont stop".
///
/// The returned rows feed `build_messages` through a field map such as
/// `{"sentence": 0}`.
pub fn sentences_from_text(text: &str, words_per_sentence: usize) -> Vec<Vec<String>> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_alphabetic() || c.is_whitespace())
        .map(|c| c.to_ascii_lowercase())
        .collect();

    let words: Vec<&str> = cleaned.split_whitespace().collect();
    words
        .chunks(words_per_sentence.max(1))
        .map(|chunk| vec![chunk.join(" ")])
        .collect()
}
