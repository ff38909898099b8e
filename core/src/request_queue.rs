use std::collections::VecDeque;

use crate::document::{DocId, Document, DocumentStatus};
use crate::error::Result;
use crate::search_server::SearchServer;

/// Width of the request window, one slot per minute of a day.
pub const MIN_IN_DAY: usize = 1440;

/// Forwards queries to a [`SearchServer`] and counts how many of the most
/// recent [`MIN_IN_DAY`] requests came back empty.
pub struct RequestQueue<'s> {
    server: &'s SearchServer,
    requests: VecDeque<bool>,
    no_result_requests: usize,
}

impl<'s> RequestQueue<'s> {
    pub fn new(server: &'s SearchServer) -> Self {
        Self { server, requests: VecDeque::with_capacity(MIN_IN_DAY), no_result_requests: 0 }
    }

    pub fn add_find_request(&mut self, raw_query: &str) -> Result<Vec<Document>> {
        let found = self.server.find_top_documents(raw_query)?;
        self.record(found.is_empty());
        Ok(found)
    }

    pub fn add_find_request_by_status(
        &mut self,
        raw_query: &str,
        status: DocumentStatus,
    ) -> Result<Vec<Document>> {
        let found = self.server.find_top_documents_by_status(raw_query, status)?;
        self.record(found.is_empty());
        Ok(found)
    }

    pub fn add_find_request_by<P>(&mut self, raw_query: &str, predicate: P) -> Result<Vec<Document>>
    where
        P: Fn(DocId, DocumentStatus, i32) -> bool + Sync,
    {
        let found = self.server.find_top_documents_by(raw_query, predicate)?;
        self.record(found.is_empty());
        Ok(found)
    }

    /// Empty results among the requests currently in the window.
    pub fn no_result_requests(&self) -> usize {
        self.no_result_requests
    }

    fn record(&mut self, empty: bool) {
        if self.requests.len() == MIN_IN_DAY {
            if let Some(true) = self.requests.pop_front() {
                self.no_result_requests -= 1;
            }
        }
        self.requests.push_back(empty);
        if empty {
            self.no_result_requests += 1;
        }
    }
}
