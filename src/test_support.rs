use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use rusqlite::Connection;
use serde_json::Value;

use crate::adapters::db::{StoredDocument, open_connection, run_migrations};
use crate::adapters::jcdecaux::{FetchError, StationSource};
use crate::app::services::{DurableSink, SinkError};
use crate::domain::clock::{Clock, TimestampMs};
use crate::domain::models::UpstreamStation;

static TEST_DB_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn open_test_connection(test_name: &str) -> Connection {
    let template = ensure_template_db();
    let test_db_path = unique_test_db_path(test_name);

    if let Some(parent) = test_db_path.parent() {
        std::fs::create_dir_all(parent).expect("test db dir should be creatable");
    }

    std::fs::copy(&template, &test_db_path).expect("template db should be copied");
    open_connection(test_db_path.to_string_lossy().as_ref()).expect("test db should open")
}

fn ensure_template_db() -> PathBuf {
    static TEMPLATE_PATH: OnceLock<PathBuf> = OnceLock::new();

    TEMPLATE_PATH
        .get_or_init(|| {
            let template_path = std::env::var("TEST_DB_TEMPLATE_PATH")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| Path::new("./target/testdb/template.db").to_path_buf());

            if let Some(parent) = template_path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent).expect("template parent dir should be creatable");
            }

            let mut connection = open_connection(template_path.to_string_lossy().as_ref())
                .expect("template db opens");
            run_migrations(&mut connection).expect("template migrations should succeed");

            template_path
        })
        .clone()
}

fn unique_test_db_path(test_name: &str) -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let counter = TEST_DB_COUNTER.fetch_add(1, Ordering::Relaxed);
    Path::new("./target/testdb").join(format!("{test_name}-{now}-{counter}.sqlite"))
}

pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now(&self) -> TimestampMs {
        TimestampMs(self.0)
    }
}

pub struct StepClock {
    values: Vec<i64>,
    index: AtomicUsize,
}

impl StepClock {
    pub fn new(values: Vec<i64>) -> Self {
        Self {
            values,
            index: AtomicUsize::new(0),
        }
    }
}

impl Clock for StepClock {
    fn now(&self) -> TimestampMs {
        let index = self.index.fetch_add(1, Ordering::SeqCst);
        TimestampMs(
            *self
                .values
                .get(index)
                .or(self.values.last())
                .unwrap_or(&0),
        )
    }
}

#[derive(Default)]
struct MemorySinkState {
    calls: usize,
    chunk_sizes: Vec<usize>,
    documents: HashMap<String, Vec<Value>>,
}

/// In-memory sink that can be told to reject a given append call (1-based)
/// or every call.
#[derive(Default)]
pub struct MemorySink {
    fail_on_call: Option<usize>,
    unavailable: bool,
    state: Mutex<MemorySinkState>,
}

impl MemorySink {
    pub fn failing_on_call(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::default()
        }
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.state.lock().expect("sink lock should be available").calls
    }

    pub fn chunk_sizes(&self) -> Vec<usize> {
        self.state
            .lock()
            .expect("sink lock should be available")
            .chunk_sizes
            .clone()
    }

    pub fn documents(&self, collection: &str) -> Vec<Value> {
        self.state
            .lock()
            .expect("sink lock should be available")
            .documents
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    fn append(&self, collection: &str, documents: &[Value]) -> Result<usize, SinkError> {
        let mut state = self.state.lock().map_err(|_| SinkError::DbLockPoisoned)?;
        state.calls += 1;

        if self.unavailable || self.fail_on_call == Some(state.calls) {
            return Err(SinkError::DbLockPoisoned);
        }

        state.chunk_sizes.push(documents.len());
        state
            .documents
            .entry(collection.to_string())
            .or_default()
            .extend_from_slice(documents);
        Ok(documents.len())
    }
}

impl DurableSink for MemorySink {
    fn append_one(&self, collection: &str, document: &Value) -> Result<i64, SinkError> {
        self.append(collection, std::slice::from_ref(document))?;
        Ok(self.documents(collection).len() as i64)
    }

    fn append_many(&self, collection: &str, documents: &[Value]) -> Result<usize, SinkError> {
        self.append(collection, documents)
    }

    fn query_recent(
        &self,
        collection: &str,
        limit: u32,
    ) -> Result<Vec<StoredDocument>, SinkError> {
        if self.unavailable {
            return Err(SinkError::DbLockPoisoned);
        }

        let documents = self.documents(collection);
        Ok(documents
            .into_iter()
            .enumerate()
            .rev()
            .take(limit as usize)
            .map(|(idx, payload)| StoredDocument {
                id: idx as i64 + 1,
                collection: collection.to_string(),
                created_at: "2026-01-01T00:00:00.000Z".to_string(),
                payload,
            })
            .collect())
    }
}

/// Replays queued fetch results; an exhausted script yields an empty list.
#[derive(Default)]
pub struct ScriptedSource {
    responses: Mutex<VecDeque<Result<Vec<UpstreamStation>, FetchError>>>,
    calls: AtomicUsize,
    missing_api_key: bool,
}

impl ScriptedSource {
    pub fn with(responses: Vec<Result<Vec<UpstreamStation>, FetchError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            ..Self::default()
        }
    }

    pub fn without_api_key() -> Self {
        Self {
            missing_api_key: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StationSource for ScriptedSource {
    async fn fetch_stations(&self) -> Result<Vec<UpstreamStation>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .expect("script lock should be available")
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn is_configured(&self) -> bool {
        !self.missing_api_key
    }
}

/// Source whose fetches take `delay` and record how many overlap.
pub struct SlowSource {
    delay: Duration,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl SlowSource {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StationSource for SlowSource {
    async fn fetch_stations(&self) -> Result<Vec<UpstreamStation>, FetchError> {
        let number = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(upstream_stations(number))
    }
}

pub fn upstream_stations(count: usize) -> Vec<UpstreamStation> {
    (1..=count)
        .map(|number| UpstreamStation {
            number: Some(number as i64),
            name: Some(format!("STATION {number}")),
            available_bikes: Some(3),
            ..UpstreamStation::default()
        })
        .collect()
}
