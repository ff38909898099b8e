/// Split text into words on the space character.
///
/// Runs of spaces collapse and leading/trailing spaces are ignored. Any other
/// whitespace (tabs, newlines) stays inside the word so that validation can
/// reject it.
pub fn split_into_words(text: &str) -> Vec<&str> {
    text.split(' ').filter(|word| !word.is_empty()).collect()
}

/// A word is valid when it contains no control characters (bytes below 0x20).
pub fn is_valid_word(word: &str) -> bool {
    !word.bytes().any(|b| b < b' ')
}
