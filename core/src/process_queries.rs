use rayon::prelude::*;

use crate::document::{DocId, Document, DocumentStatus};
use crate::error::Result;
use crate::execution::ExecutionPolicy;
use crate::search_server::SearchServer;

/// Run every query against `server` in parallel, one result list per query.
///
/// Only ACTUAL documents are ranked. Results keep the input order. If any
/// query is malformed its error is returned instead.
pub fn process_queries<S>(server: &SearchServer, queries: &[S]) -> Result<Vec<Vec<Document>>>
where
    S: AsRef<str> + Sync,
{
    process_queries_by(server, queries, |_, status, _| status == DocumentStatus::Actual)
}

/// [`process_queries`] with a caller-supplied document filter.
pub fn process_queries_by<S, P>(
    server: &SearchServer,
    queries: &[S],
    predicate: P,
) -> Result<Vec<Vec<Document>>>
where
    S: AsRef<str> + Sync,
    P: Fn(DocId, DocumentStatus, i32) -> bool + Sync,
{
    queries
        .par_iter()
        .map(|query| {
            server.find_top_documents_with_policy(
                ExecutionPolicy::Parallel,
                query.as_ref(),
                &predicate,
            )
        })
        .collect()
}

/// [`process_queries`] flattened in query order.
pub fn process_queries_joined<S>(server: &SearchServer, queries: &[S]) -> Result<Vec<Document>>
where
    S: AsRef<str> + Sync,
{
    Ok(process_queries(server, queries)?.into_iter().flatten().collect())
}
