use crate::error::{Result, SearchError};
use crate::stop_words::StopWords;
use crate::tokenizer::{is_valid_word, split_into_words};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueryWord<'q> {
    data: &'q str,
    is_minus: bool,
    is_stop: bool,
}

/// Parsed query: words that must match and words that exclude a document.
///
/// Both lists are sorted and hold no duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query<'q> {
    pub plus_words: Vec<&'q str>,
    pub minus_words: Vec<&'q str>,
}

impl<'q> Query<'q> {
    /// Parse raw query text, dropping stop words.
    ///
    /// A leading `-` marks a minus-word. A bare `-`, a `--` prefix or a word
    /// with control characters is rejected.
    pub fn parse(text: &'q str, stop_words: &StopWords) -> Result<Self> {
        let mut query = Query::default();
        for word in split_into_words(text) {
            let word = parse_query_word(word, stop_words)?;
            if word.is_stop {
                continue;
            }
            if word.is_minus {
                query.minus_words.push(word.data);
            } else {
                query.plus_words.push(word.data);
            }
        }
        dedup(&mut query.plus_words);
        dedup(&mut query.minus_words);
        Ok(query)
    }

    pub fn is_empty(&self) -> bool {
        self.plus_words.is_empty() && self.minus_words.is_empty()
    }
}

fn parse_query_word<'q>(text: &'q str, stop_words: &StopWords) -> Result<QueryWord<'q>> {
    if text.is_empty() {
        return Err(SearchError::invalid("query word is empty"));
    }
    let (data, is_minus) = match text.strip_prefix('-') {
        Some(rest) => (rest, true),
        None => (text, false),
    };
    if data.is_empty() || data.starts_with('-') || !is_valid_word(data) {
        return Err(SearchError::invalid(format!("query word {text:?} is invalid")));
    }
    Ok(QueryWord { data, is_minus, is_stop: stop_words.contains(data) })
}

fn dedup(words: &mut Vec<&str>) {
    words.sort_unstable();
    words.dedup();
}
