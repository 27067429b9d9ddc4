//! In-process archive API double shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;
use shared::{ArchiveApi, Document, DocumentUpdate, Error, Result, SearchQuery, Settings};

pub fn doc(id: &str) -> Document {
    serde_json::from_value(json!({
        "id": id,
        "url": format!("https://example.com/{id}"),
        "title": format!("Doc {id}"),
        "content": "text",
        "date": "2024-01-01T00:00:00"
    }))
    .unwrap()
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Fetch { url: String, summarize: bool },
    Query(SearchQuery),
    Get(String),
    Update(String),
    Similar(String),
    Health,
}

#[derive(Default)]
pub struct StubApi {
    calls: Mutex<Vec<Call>>,
    saved: AtomicUsize,
    results: Vec<Document>,
    fetch_status: Option<u16>,
    fetch_panics: bool,
    unhealthy: bool,
}

impl StubApi {
    pub fn with_results(mut self, results: Vec<Document>) -> Self {
        self.results = results;
        self
    }

    pub fn failing_fetch(mut self, status: u16) -> Self {
        self.fetch_status = Some(status);
        self
    }

    pub fn panicking_fetch(mut self) -> Self {
        self.fetch_panics = true;
        self
    }

    pub fn unhealthy(mut self) -> Self {
        self.unhealthy = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn fetches(&self) -> Vec<(String, bool)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Fetch { url, summarize } => Some((url, summarize)),
                _ => None,
            })
            .collect()
    }

    pub fn queries(&self) -> Vec<SearchQuery> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Query(q) => Some(q),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ArchiveApi for StubApi {
    async fn fetch_and_save(&self, _settings: &Settings, url: &str, summarize: bool) -> Result<Document> {
        self.record(Call::Fetch {
            url: url.to_string(),
            summarize,
        });
        tokio::task::yield_now().await;

        if self.fetch_panics {
            panic!("archive stub exploded");
        }
        if let Some(status) = self.fetch_status {
            return Err(Error::ApiStatus { status });
        }

        let n = self.saved.fetch_add(1, Ordering::SeqCst);
        let mut saved = doc(&format!("saved-{n}"));
        saved.url = Some(url.to_string());
        if summarize {
            saved.summary = Some("A short summary.".to_string());
        }
        Ok(saved)
    }

    async fn query(&self, _settings: &Settings, query: &SearchQuery) -> Result<Vec<Document>> {
        self.record(Call::Query(query.clone()));
        Ok(self.results.clone())
    }

    async fn get_document(&self, _settings: &Settings, id: &str) -> Result<Document> {
        self.record(Call::Get(id.to_string()));
        Ok(doc(id))
    }

    async fn update_document(&self, _settings: &Settings, id: &str, update: &DocumentUpdate) -> Result<Document> {
        self.record(Call::Update(id.to_string()));
        let mut updated = doc(id);
        if let Some(title) = &update.title {
            updated.title = title.clone();
        }
        Ok(updated)
    }

    async fn similar_documents(&self, _settings: &Settings, id: &str) -> Result<Vec<Document>> {
        self.record(Call::Similar(id.to_string()));
        Ok(self.results.clone())
    }

    async fn health(&self, _settings: &Settings) -> Result<bool> {
        self.record(Call::Health);
        Ok(!self.unhealthy)
    }
}
