//! In-memory TF-IDF search over short documents.
//!
//! [`SearchServer`] owns the stop words and an [`InvertedIndex`]. Queries are
//! space-separated words; a `-` prefix excludes documents containing the word.
//! Ranking can fan out over a rayon pool, accumulating scores into a
//! [`ConcurrentMap`] sharded by document id.

pub mod concurrent_map;
pub mod document;
pub mod error;
pub mod execution;
pub mod index;
pub mod process_queries;
pub mod query;
pub mod request_queue;
pub mod search_server;
pub mod stop_words;
pub mod tokenizer;

pub use concurrent_map::{BucketKey, ConcurrentMap};
pub use document::{DocId, Document, DocumentStatus};
pub use error::{Result, SearchError};
pub use execution::ExecutionPolicy;
pub use index::{InvertedIndex, PostingList, WordFreqs};
pub use process_queries::{process_queries, process_queries_by, process_queries_joined};
pub use query::Query;
pub use request_queue::{RequestQueue, MIN_IN_DAY};
pub use search_server::{SearchServer, EPSILON, MAX_RESULT_DOCUMENT_COUNT};
pub use stop_words::StopWords;
