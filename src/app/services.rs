use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use serde_json::Value;
use thiserror::Error;

use crate::adapters::db;
use crate::adapters::db::{DbError, StoredDocument};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("database lock poisoned")]
    DbLockPoisoned,
    #[error("database operation failed: {0}")]
    Database(#[from] DbError),
    #[error("failed to encode document: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Append-only document store with recency-ordered reads. Each
/// `append_many` call is atomic and bounded by [`db::MAX_BATCH_WRITES`].
pub trait DurableSink: Send + Sync + 'static {
    fn append_one(&self, collection: &str, document: &Value) -> Result<i64, SinkError>;
    fn append_many(&self, collection: &str, documents: &[Value]) -> Result<usize, SinkError>;
    fn query_recent(&self, collection: &str, limit: u32)
    -> Result<Vec<StoredDocument>, SinkError>;
}

#[derive(Clone)]
pub struct SqliteSink {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteSink {
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }

    fn with_connection<T>(
        &self,
        op: impl FnOnce(&mut Connection) -> Result<T, DbError>,
    ) -> Result<T, SinkError> {
        let mut connection = self
            .connection
            .lock()
            .map_err(|_| SinkError::DbLockPoisoned)?;
        op(&mut connection).map_err(SinkError::from)
    }
}

impl DurableSink for SqliteSink {
    fn append_one(&self, collection: &str, document: &Value) -> Result<i64, SinkError> {
        self.with_connection(|connection| db::insert_document(connection, collection, document))
    }

    fn append_many(&self, collection: &str, documents: &[Value]) -> Result<usize, SinkError> {
        self.with_connection(|connection| db::insert_documents(connection, collection, documents))
    }

    fn query_recent(
        &self,
        collection: &str,
        limit: u32,
    ) -> Result<Vec<StoredDocument>, SinkError> {
        self.with_connection(|connection| db::list_recent_documents(connection, collection, limit))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use crate::test_support::open_test_connection;

    use super::{DurableSink, SinkError, SqliteSink};

    fn sink(name: &str) -> SqliteSink {
        SqliteSink::new(Arc::new(Mutex::new(open_test_connection(name))))
    }

    #[test]
    fn appends_and_reads_back_documents() {
        let sink = sink("sink-roundtrip");

        sink.append_one("sensor_data", &json!({ "timestamp": 1 }))
            .expect("append_one should succeed");
        sink.append_many(
            "sensor_data",
            &[json!({ "timestamp": 2 }), json!({ "timestamp": 3 })],
        )
        .expect("append_many should succeed");

        let documents = sink
            .query_recent("sensor_data", 100)
            .expect("query should succeed");

        assert_eq!(documents.len(), 3);
        assert_eq!(documents[0].payload["timestamp"], 3);
    }

    #[test]
    fn surfaces_oversized_batches_as_sink_errors() {
        let sink = sink("sink-oversized");
        let documents: Vec<_> = (0..501).map(|idx| json!({ "timestamp": idx })).collect();

        let result = sink.append_many("sensor_data", &documents);

        assert!(matches!(result, Err(SinkError::Database(_))));
    }
}
