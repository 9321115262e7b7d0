use async_trait::async_trait;
use ferrum_references::{
    InMemorySearch, SearchError, SearchOutcome, SearchRequest, SearchSubsystem,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Wraps an [`InMemorySearch`] and records every request it receives.
pub struct RecordingSearch {
    inner: InMemorySearch,
    calls: AtomicUsize,
    requests: Mutex<Vec<SearchRequest>>,
}

impl RecordingSearch {
    pub fn new(inner: InMemorySearch) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchSubsystem for RecordingSearch {
    async fn search(&self, request: &SearchRequest) -> Result<SearchOutcome, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        self.inner.search(request).await
    }
}

/// Every search fails with a backend error.
pub struct FailingSearch;

#[async_trait]
impl SearchSubsystem for FailingSearch {
    async fn search(&self, _request: &SearchRequest) -> Result<SearchOutcome, SearchError> {
        Err(SearchError::Backend("index unavailable".to_string()))
    }
}

/// A search that never completes.
pub struct PendingSearch {
    pub calls: AtomicUsize,
}

impl PendingSearch {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SearchSubsystem for PendingSearch {
    async fn search(&self, _request: &SearchRequest) -> Result<SearchOutcome, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}
