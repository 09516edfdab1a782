use std::sync::Arc;

use actix_web::web;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::adapters::db::StoredDocument;
use crate::app::batch::BatchCommitter;
use crate::app::poller::{FetchOutcome, PollError, StationPoller};
use crate::app::services::SinkError;
use crate::domain::models::{FetchStats, SensorRecord};
use crate::domain::session_buffer::{CsvExport, SessionBuffer, SessionError, SessionSnapshot};

pub const SENSOR_COLLECTION: &str = "sensor_data";
pub const DEFAULT_QUERY_LIMIT: u32 = 100;
pub const MAX_QUERY_LIMIT: u32 = 1000;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("durable store query failed: {0}")]
    Sink(#[from] SinkError),
    #[error("durable store task failed: {0}")]
    Blocking(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReceipt {
    pub session_id: String,
    pub accepted: usize,
    pub total_points: usize,
    pub stored_to_cloud: bool,
}

pub struct IngestionService {
    sessions: SessionBuffer,
    committer: Arc<BatchCommitter>,
    poller: Arc<StationPoller>,
}

impl IngestionService {
    pub fn new(
        sessions: SessionBuffer,
        committer: Arc<BatchCommitter>,
        poller: Arc<StationPoller>,
    ) -> Self {
        Self {
            sessions,
            committer,
            poller,
        }
    }

    pub fn start_session(&self) -> Result<String, IngestError> {
        let session_id = self.sessions.start_session()?;
        tracing::info!(session_id, "ingestion session started");
        Ok(session_id)
    }

    /// Appends to the in-memory session first; the durable copy is written
    /// afterwards and only drives `stored_to_cloud`.
    pub async fn ingest(&self, data: Option<&Value>) -> Result<IngestReceipt, IngestError> {
        let records = parse_sensor_batch(data)?;
        let appended = self.sessions.append_records(&records)?;

        let committer = Arc::clone(&self.committer);
        let stored_to_cloud =
            match web::block(move || committer.commit(SENSOR_COLLECTION, &records)).await {
                Ok(result) if result.is_success() => true,
                Ok(_) => false,
                Err(error) => {
                    tracing::warn!(error = %error, "sensor forward task failed");
                    false
                }
            };

        tracing::info!(
            session_id = %appended.session_id,
            accepted = appended.accepted,
            total_points = appended.total_points,
            stored_to_cloud,
            "sensor batch ingested"
        );

        Ok(IngestReceipt {
            session_id: appended.session_id,
            accepted: appended.accepted,
            total_points: appended.total_points,
            stored_to_cloud,
        })
    }

    pub fn snapshot(&self) -> Result<SessionSnapshot, IngestError> {
        Ok(self.sessions.snapshot()?)
    }

    pub fn export_csv(&self) -> Result<CsvExport, IngestError> {
        Ok(self.sessions.export_csv()?)
    }

    pub fn stop_session(&self) -> Result<SessionSnapshot, IngestError> {
        let snapshot = self.sessions.stop_session()?;
        tracing::info!(
            session_id = %snapshot.session_id,
            point_count = snapshot.point_count,
            "ingestion session stopped"
        );
        Ok(snapshot)
    }

    pub async fn recent_documents(
        &self,
        collection: &'static str,
        limit: u32,
    ) -> Result<Vec<Value>, IngestError> {
        let committer = Arc::clone(&self.committer);
        let documents = web::block(move || committer.sink().query_recent(collection, limit))
            .await
            .map_err(|error| IngestError::Blocking(error.to_string()))??;

        Ok(documents
            .into_iter()
            .map(StoredDocument::into_json)
            .collect())
    }

    pub fn station_polling_enabled(&self) -> bool {
        self.poller.is_configured()
    }

    pub fn station_stats(&self) -> FetchStats {
        self.poller.stats()
    }

    pub async fn trigger_station_fetch(&self) -> Result<FetchOutcome, PollError> {
        self.poller.trigger_manual_fetch().await
    }
}

pub fn parse_sensor_batch(data: Option<&Value>) -> Result<Vec<SensorRecord>, IngestError> {
    let Some(Value::Array(items)) = data else {
        return Err(IngestError::Validation(
            "Invalid data format. Expected array of sensor readings.".to_string(),
        ));
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            SensorRecord::deserialize(item).map_err(|error| {
                IngestError::Validation(format!("Invalid sensor reading at index {index}: {error}"))
            })
        })
        .collect()
}

/// Missing or non-numeric limits fall back to the default; numeric ones are
/// clamped into `1..=MAX_QUERY_LIMIT`.
pub fn normalize_limit(raw: Option<&str>) -> u32 {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
        .map_or(DEFAULT_QUERY_LIMIT, |value| {
            value.clamp(1, i64::from(MAX_QUERY_LIMIT)) as u32
        })
}
