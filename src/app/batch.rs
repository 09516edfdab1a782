use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::adapters::db::MAX_BATCH_WRITES;
use crate::app::services::{DurableSink, SinkError};

#[derive(Debug)]
pub enum CommitResult {
    Committed {
        total_added: usize,
        batches: usize,
    },
    Failed {
        committed_chunks: usize,
        error: SinkError,
    },
}

impl CommitResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}

/// Splits record lists into sink-sized chunks and commits them one after
/// another. A failed chunk stops the run; earlier chunks stay committed.
pub struct BatchCommitter {
    sink: Arc<dyn DurableSink>,
    chunk_size: usize,
}

impl BatchCommitter {
    pub fn new(sink: Arc<dyn DurableSink>) -> Self {
        Self {
            sink,
            chunk_size: MAX_BATCH_WRITES,
        }
    }

    pub fn sink(&self) -> &Arc<dyn DurableSink> {
        &self.sink
    }

    pub fn commit<T: Serialize>(&self, collection: &str, records: &[T]) -> CommitResult {
        let mut committed_chunks = 0;

        for chunk in records.chunks(self.chunk_size) {
            if let Err(error) = self.commit_chunk(collection, chunk) {
                tracing::warn!(
                    collection,
                    committed_chunks,
                    error = %error,
                    "batch commit stopped after chunk failure"
                );
                return CommitResult::Failed {
                    committed_chunks,
                    error,
                };
            }
            committed_chunks += 1;
        }

        tracing::debug!(
            collection,
            total_added = records.len(),
            batches = committed_chunks,
            "batch commit completed"
        );

        CommitResult::Committed {
            total_added: records.len(),
            batches: committed_chunks,
        }
    }

    fn commit_chunk<T: Serialize>(&self, collection: &str, chunk: &[T]) -> Result<(), SinkError> {
        let documents = chunk
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<Value>, _>>()?;

        match documents.as_slice() {
            [single] => self.sink.append_one(collection, single).map(|_| ()),
            _ => self.sink.append_many(collection, &documents).map(|_| ()),
        }
    }
}
