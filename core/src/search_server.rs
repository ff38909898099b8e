use rayon::prelude::*;
use std::cmp::Ordering;

use crate::concurrent_map::ConcurrentMap;
use crate::document::{DocId, Document, DocumentStatus};
use crate::error::{Result, SearchError};
use crate::execution::ExecutionPolicy;
use crate::index::{DocMeta, InvertedIndex, WordFreqs};
use crate::query::Query;
use crate::stop_words::StopWords;
use crate::tokenizer::{is_valid_word, split_into_words};

/// Maximum number of hits returned by a ranking call.
pub const MAX_RESULT_DOCUMENT_COUNT: usize = 5;

/// Relevances closer than this are ranked by rating instead.
pub const EPSILON: f64 = 1e-6;

/// In-memory TF-IDF search engine over short documents.
///
/// Mutating calls take `&mut self`; ranking and matching take `&self`, so any
/// number of queries may run concurrently against a stable index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchServer {
    stop_words: StopWords,
    index: InvertedIndex,
}

impl SearchServer {
    /// Engine whose stop words are the space-separated words of `stop_words_text`.
    pub fn new(stop_words_text: &str) -> Result<Self> {
        Ok(Self::with_stop_word_set(StopWords::from_text(stop_words_text)?))
    }

    pub fn with_stop_words<I, S>(stop_words: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self::with_stop_word_set(StopWords::new(stop_words)?))
    }

    pub fn with_stop_word_set(stop_words: StopWords) -> Self {
        Self { stop_words, index: InvertedIndex::new() }
    }

    pub fn stop_words(&self) -> &StopWords {
        &self.stop_words
    }

    pub fn index(&self) -> &InvertedIndex {
        &self.index
    }

    /// Index `text` under `id`.
    ///
    /// Every word is validated before the index is touched, so a rejected
    /// document leaves no partial state.
    pub fn add_document(
        &mut self,
        id: DocId,
        text: &str,
        status: DocumentStatus,
        ratings: &[i32],
    ) -> Result<()> {
        if id < 0 {
            return Err(SearchError::invalid(format!("document id {id} is negative")));
        }
        if self.index.contains(id) {
            return Err(SearchError::invalid(format!("document id {id} is already indexed")));
        }
        let words = self.split_into_words_no_stop(text)?;
        let meta = DocMeta { rating: compute_average_rating(ratings), status };
        self.index.insert(id, &words, meta);
        tracing::debug!(id, words = words.len(), %status, "document added");
        Ok(())
    }

    fn split_into_words_no_stop<'t>(&self, text: &'t str) -> Result<Vec<&'t str>> {
        let mut words = Vec::new();
        for word in split_into_words(text) {
            if !is_valid_word(word) {
                return Err(SearchError::invalid(format!("word {word:?} is invalid")));
            }
            if !self.stop_words.contains(word) {
                words.push(word);
            }
        }
        Ok(words)
    }

    /// Drop `id` from the index. Unknown ids are ignored.
    pub fn remove_document(&mut self, id: DocId) {
        self.remove_document_with_policy(ExecutionPolicy::Sequential, id);
    }

    pub fn remove_document_with_policy(&mut self, policy: ExecutionPolicy, id: DocId) {
        if self.index.remove(id, policy) {
            tracing::debug!(id, ?policy, "document removed");
        }
    }

    pub fn document_count(&self) -> usize {
        self.index.len()
    }

    /// Word frequencies of `id`; empty if the id is unknown.
    pub fn word_frequencies(&self, id: DocId) -> &WordFreqs {
        self.index.word_frequencies(id)
    }

    /// Indexed ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = DocId> + '_ {
        self.index.ids()
    }

    /// Top hits among documents with status ACTUAL.
    pub fn find_top_documents(&self, raw_query: &str) -> Result<Vec<Document>> {
        self.find_top_documents_by_status(raw_query, DocumentStatus::Actual)
    }

    pub fn find_top_documents_by_status(
        &self,
        raw_query: &str,
        status: DocumentStatus,
    ) -> Result<Vec<Document>> {
        self.find_top_documents_with_policy(ExecutionPolicy::Sequential, raw_query, move |_, s, _| {
            s == status
        })
    }

    pub fn find_top_documents_by<P>(&self, raw_query: &str, predicate: P) -> Result<Vec<Document>>
    where
        P: Fn(DocId, DocumentStatus, i32) -> bool + Sync,
    {
        self.find_top_documents_with_policy(ExecutionPolicy::Sequential, raw_query, predicate)
    }

    /// Top hits among ACTUAL documents under the given execution policy.
    pub fn par_find_top_documents(
        &self,
        policy: ExecutionPolicy,
        raw_query: &str,
    ) -> Result<Vec<Document>> {
        self.find_top_documents_with_policy(policy, raw_query, |_, status, _| {
            status == DocumentStatus::Actual
        })
    }

    /// Rank documents for `raw_query` by TF-IDF, keeping those `predicate` accepts.
    ///
    /// Returns at most [`MAX_RESULT_DOCUMENT_COUNT`] hits sorted by relevance
    /// descending; hits within [`EPSILON`] of each other are ordered by rating.
    pub fn find_top_documents_with_policy<P>(
        &self,
        policy: ExecutionPolicy,
        raw_query: &str,
        predicate: P,
    ) -> Result<Vec<Document>>
    where
        P: Fn(DocId, DocumentStatus, i32) -> bool + Sync,
    {
        let query = self.parse_query(raw_query)?;
        let mut matched = self.find_all_documents(policy, &query, &predicate);
        sort_by_relevance(policy, &mut matched);
        matched.truncate(MAX_RESULT_DOCUMENT_COUNT);
        Ok(matched)
    }

    fn parse_query<'q>(&self, raw_query: &'q str) -> Result<Query<'q>> {
        Query::parse(raw_query, &self.stop_words).inspect_err(|err| {
            tracing::debug!(query = raw_query, %err, "query rejected");
        })
    }

    fn find_all_documents<P>(
        &self,
        policy: ExecutionPolicy,
        query: &Query<'_>,
        predicate: &P,
    ) -> Vec<Document>
    where
        P: Fn(DocId, DocumentStatus, i32) -> bool + Sync,
    {
        let relevance: ConcurrentMap<DocId, f64> = ConcurrentMap::new(self.index.len());

        let accumulate = |word: &&str| {
            let (Some(list), Some(idf)) =
                (self.index.postings(word), self.index.inverse_document_freq(word))
            else {
                return;
            };
            for (&id, &tf) in list {
                let Some(meta) = self.index.meta(id) else { continue };
                if predicate(id, meta.status, meta.rating) {
                    relevance.add(id, tf * idf);
                }
            }
        };
        let exclude = |word: &&str| {
            if let Some(list) = self.index.postings(word) {
                for &id in list.keys() {
                    relevance.erase(id);
                }
            }
        };

        // each stage joins before the next starts
        if policy.is_parallel() {
            query.plus_words.par_iter().for_each(accumulate);
            query.minus_words.par_iter().for_each(exclude);
        } else {
            query.plus_words.iter().for_each(accumulate);
            query.minus_words.iter().for_each(exclude);
        }

        let matched: Vec<Document> = relevance
            .into_ordinary_map()
            .into_iter()
            .filter_map(|(id, relevance)| {
                self.index.meta(id).map(|meta| Document::new(id, relevance, meta.rating))
            })
            .collect();
        tracing::trace!(
            plus = query.plus_words.len(),
            minus = query.minus_words.len(),
            candidates = matched.len(),
            ?policy,
            "ranked query"
        );
        matched
    }

    /// Plus-words of `raw_query` present in document `id`, with its status.
    ///
    /// The word list is empty when any minus-word occurs in the document.
    pub fn match_document(
        &self,
        raw_query: &str,
        id: DocId,
    ) -> Result<(Vec<&str>, DocumentStatus)> {
        self.match_document_with_policy(ExecutionPolicy::Sequential, raw_query, id)
    }

    pub fn match_document_with_policy(
        &self,
        policy: ExecutionPolicy,
        raw_query: &str,
        id: DocId,
    ) -> Result<(Vec<&str>, DocumentStatus)> {
        let meta = self
            .index
            .meta(id)
            .ok_or_else(|| SearchError::invalid(format!("document id {id} is not indexed")))?;
        let query = self.parse_query(raw_query)?;
        let freqs = self.index.word_frequencies(id);

        let has_minus = if policy.is_parallel() {
            query.minus_words.par_iter().any(|word| freqs.contains_key(*word))
        } else {
            query.minus_words.iter().any(|word| freqs.contains_key(*word))
        };
        if has_minus {
            return Ok((Vec::new(), meta.status));
        }

        // borrow the stored key so results outlive the query text
        let lookup = |word: &&str| freqs.get_key_value(*word).map(|(key, _)| key.as_str());
        let mut matched: Vec<&str> = if policy.is_parallel() {
            query.plus_words.par_iter().filter_map(lookup).collect()
        } else {
            query.plus_words.iter().filter_map(lookup).collect()
        };
        matched.sort_unstable();
        matched.dedup();
        Ok((matched, meta.status))
    }
}

impl<'a> IntoIterator for &'a SearchServer {
    type Item = DocId;
    type IntoIter = Box<dyn Iterator<Item = DocId> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Truncating integer mean; 0 for no ratings.
fn compute_average_rating(ratings: &[i32]) -> i32 {
    if ratings.is_empty() {
        return 0;
    }
    let sum: i64 = ratings.iter().map(|&r| i64::from(r)).sum();
    (sum / ratings.len() as i64) as i32
}

fn by_relevance(lhs: &Document, rhs: &Document) -> Ordering {
    rhs.relevance.total_cmp(&lhs.relevance)
}

/// Sort by relevance, then reorder each run of near-equal relevances by rating.
///
/// A run starts at its most relevant hit and spans every following hit less
/// than [`EPSILON`] below it. Inside a run equal ratings fall back to ascending
/// id, which keeps the order independent of the summation order of parallel
/// accumulation. Rating order is only guaranteed between hits and their run's
/// leader: two hits within [`EPSILON`] of each other that land in different
/// runs keep relevance order.
fn sort_by_relevance(policy: ExecutionPolicy, documents: &mut [Document]) {
    if policy.is_parallel() {
        documents.par_sort_by(by_relevance);
    } else {
        documents.sort_by(by_relevance);
    }
    let mut start = 0;
    while start < documents.len() {
        let leader = documents[start].relevance;
        let run = documents[start..]
            .iter()
            .take_while(|doc| leader - doc.relevance < EPSILON)
            .count();
        documents[start..start + run]
            .sort_by(|lhs, rhs| rhs.rating.cmp(&lhs.rating).then(lhs.id.cmp(&rhs.id)));
        start += run;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_rating_truncates() {
        assert_eq!(compute_average_rating(&[]), 0);
        assert_eq!(compute_average_rating(&[7, 2, 7]), 5);
        assert_eq!(compute_average_rating(&[-7, 2]), -2);
        assert_eq!(compute_average_rating(&[i32::MAX, i32::MAX]), i32::MAX);
    }

    #[test]
    fn near_equal_relevances_order_by_rating() {
        let mut docs = vec![
            Document::new(1, 0.5, 1),
            Document::new(2, 0.5 + EPSILON / 2.0, 9),
            Document::new(3, 0.9, 0),
            Document::new(4, 0.1, 5),
        ];
        sort_by_relevance(ExecutionPolicy::Sequential, &mut docs);
        let ids: Vec<DocId> = docs.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![3, 2, 1, 4]);

        docs.swap(0, 3);
        sort_by_relevance(ExecutionPolicy::Parallel, &mut docs);
        let par_ids: Vec<DocId> = docs.iter().map(|d| d.id).collect();
        assert_eq!(par_ids, ids);
    }

    #[test]
    fn runs_are_anchored_at_their_leader() {
        let mut docs = vec![
            Document::new(1, 1.0, 0),
            Document::new(2, 1.0 - 0.9 * EPSILON, 1),
            Document::new(3, 1.0 - 1.8 * EPSILON, 9),
        ];
        sort_by_relevance(ExecutionPolicy::Sequential, &mut docs);
        // 3 is within EPSILON of 2 but outside the run led by 1
        let ids: Vec<DocId> = docs.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn rejects_bad_ids_without_side_effects() {
        let mut server = SearchServer::new("and").unwrap();
        server.add_document(1, "cat", DocumentStatus::Actual, &[1]).unwrap();
        assert!(server.add_document(-1, "dog", DocumentStatus::Actual, &[]).is_err());
        assert!(server.add_document(1, "dog", DocumentStatus::Actual, &[]).is_err());
        assert!(server.add_document(2, "dog ca\nt", DocumentStatus::Actual, &[]).is_err());
        assert_eq!(server.document_count(), 1);
        assert!(server.index().postings("dog").is_none());
    }

    #[test]
    fn match_unknown_document_is_an_error() {
        let server = SearchServer::new("").unwrap();
        assert!(server.match_document("cat", 3).is_err());
    }
}
