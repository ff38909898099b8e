use rayon::prelude::*;
use std::collections::BTreeMap;

use crate::document::{DocId, DocumentStatus};
use crate::execution::ExecutionPolicy;

/// Term frequencies keyed by word.
pub type WordFreqs = BTreeMap<String, f64>;

/// Term frequencies keyed by document id; one per indexed word.
pub type PostingList = BTreeMap<DocId, f64>;

static EMPTY_WORD_FREQS: WordFreqs = BTreeMap::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocMeta {
    pub rating: i32,
    pub status: DocumentStatus,
}

/// Word -> document and document -> word maps kept as two owned containers.
///
/// `postings[word][id] == doc_words[id][word]` holds for every indexed pair, and
/// a word whose posting list empties is dropped from `postings`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct InvertedIndex {
    postings: BTreeMap<String, PostingList>,
    doc_words: BTreeMap<DocId, WordFreqs>,
    docs: BTreeMap<DocId, DocMeta>,
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    /// Insert an already validated, stop-word-free token list.
    pub(crate) fn insert(&mut self, id: DocId, words: &[&str], meta: DocMeta) {
        let mut freqs = WordFreqs::new();
        if !words.is_empty() {
            let inv_word_count = 1.0 / words.len() as f64;
            for word in words {
                *freqs.entry((*word).to_string()).or_insert(0.0) += inv_word_count;
            }
        }
        for (word, tf) in &freqs {
            self.postings.entry(word.clone()).or_default().insert(id, *tf);
        }
        self.doc_words.insert(id, freqs);
        self.docs.insert(id, meta);
    }

    /// Erase every trace of `id`. Returns false if it was not indexed.
    pub(crate) fn remove(&mut self, id: DocId, policy: ExecutionPolicy) -> bool {
        let Some(freqs) = self.doc_words.remove(&id) else {
            return false;
        };
        match policy {
            ExecutionPolicy::Sequential => {
                for word in freqs.keys() {
                    if let Some(list) = self.postings.get_mut(word.as_str()) {
                        list.remove(&id);
                        if list.is_empty() {
                            self.postings.remove(word.as_str());
                        }
                    }
                }
            }
            ExecutionPolicy::Parallel => {
                // lift the document's own lists out so each task owns one
                let mut lists: Vec<(String, PostingList)> = freqs
                    .keys()
                    .filter_map(|word| self.postings.remove_entry(word.as_str()))
                    .collect();
                lists.par_iter_mut().for_each(|(_, list)| {
                    list.remove(&id);
                });
                self.postings.extend(lists.into_iter().filter(|(_, list)| !list.is_empty()));
            }
        }
        self.docs.remove(&id);
        true
    }

    pub fn contains(&self, id: DocId) -> bool {
        self.docs.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn meta(&self, id: DocId) -> Option<&DocMeta> {
        self.docs.get(&id)
    }

    pub fn postings(&self, word: &str) -> Option<&PostingList> {
        self.postings.get(word)
    }

    /// Number of distinct indexed words.
    pub fn word_count(&self) -> usize {
        self.postings.len()
    }

    /// Word frequencies of `id`, or an empty map if it is unknown.
    pub fn word_frequencies(&self, id: DocId) -> &WordFreqs {
        self.doc_words.get(&id).unwrap_or(&EMPTY_WORD_FREQS)
    }

    /// `ln(N / df)`; `None` for words absent from the corpus.
    pub fn inverse_document_freq(&self, word: &str) -> Option<f64> {
        let list = self.postings.get(word)?;
        Some((self.docs.len() as f64 / list.len() as f64).ln())
    }

    /// Indexed ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = DocId> + '_ {
        self.docs.keys().copied()
    }
}
