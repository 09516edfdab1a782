use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;

use crate::domain::clock::{Clock, TimestampMs};
use crate::domain::models::SensorRecord;

pub const CSV_COLUMNS: [&str; 13] = [
    "timestamp",
    "datetime",
    "seconds_elapsed",
    "latitude",
    "longitude",
    "altitude",
    "speed",
    "accuracy",
    "heading",
    "accel_x",
    "accel_y",
    "accel_z",
    "accel_magnitude",
];

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session state lock poisoned")]
    LockPoisoned,
    #[error("no data available for export")]
    Empty,
    #[error("failed to render csv export: {0}")]
    Csv(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub point_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendReceipt {
    pub session_id: String,
    pub accepted: usize,
    pub total_points: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExport {
    pub session_id: String,
    pub body: Vec<u8>,
}

struct SessionState {
    id: String,
    last_id_ms: i64,
    records: Vec<SensorRecord>,
}

pub struct SessionBuffer {
    clock: Arc<dyn Clock>,
    state: Mutex<SessionState>,
}

impl SessionBuffer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let started_ms = clock.now().0;
        Self {
            clock,
            state: Mutex::new(SessionState {
                id: session_id_for(started_ms),
                last_id_ms: started_ms,
                records: Vec::new(),
            }),
        }
    }

    pub fn start_session(&self) -> Result<String, SessionError> {
        let now_ms = self.clock.now().0;
        let mut state = self.lock()?;

        // ids stay unique even when two starts land in the same millisecond
        let id_ms = now_ms.max(state.last_id_ms + 1);
        state.last_id_ms = id_ms;
        state.id = session_id_for(id_ms);
        state.records.clear();

        Ok(state.id.clone())
    }

    pub fn append_records(&self, records: &[SensorRecord]) -> Result<AppendReceipt, SessionError> {
        let mut state = self.lock()?;
        state.records.extend_from_slice(records);

        Ok(AppendReceipt {
            session_id: state.id.clone(),
            accepted: records.len(),
            total_points: state.records.len(),
        })
    }

    pub fn count(&self) -> Result<usize, SessionError> {
        Ok(self.lock()?.records.len())
    }

    pub fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let state = self.lock()?;
        Ok(SessionSnapshot {
            session_id: state.id.clone(),
            point_count: state.records.len(),
        })
    }

    /// Ending a session only reports its state; the buffer is kept until the
    /// next `start_session`.
    pub fn stop_session(&self) -> Result<SessionSnapshot, SessionError> {
        self.snapshot()
    }

    pub fn export_csv(&self) -> Result<CsvExport, SessionError> {
        let (session_id, records) = {
            let state = self.lock()?;
            (state.id.clone(), state.records.clone())
        };

        if records.is_empty() {
            return Err(SessionError::Empty);
        }

        Ok(CsvExport {
            session_id,
            body: render_csv(records)?,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, SessionState>, SessionError> {
        self.state.lock().map_err(|_| SessionError::LockPoisoned)
    }
}

fn session_id_for(millis: i64) -> String {
    format!("session_{millis}")
}

fn render_csv(mut records: Vec<SensorRecord>) -> Result<Vec<u8>, SessionError> {
    // sort_by_key is stable: equal timestamps keep submission order
    records.sort_by_key(|record| record.timestamp);
    let start = records.first().map_or(0, |record| record.timestamp);

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(CSV_COLUMNS)
        .map_err(|error| SessionError::Csv(error.to_string()))?;

    for record in &records {
        let elapsed_ms = i128::from(record.timestamp) - i128::from(start);
        let elapsed_seconds = elapsed_ms as f64 / 1000.0;
        let row = [
            record.timestamp.to_string(),
            TimestampMs(record.timestamp)
                .to_iso8601()
                .unwrap_or_default(),
            format!("{elapsed_seconds:.3}"),
            optional_cell(record.latitude),
            optional_cell(record.longitude),
            optional_cell(record.altitude),
            optional_cell(record.speed),
            optional_cell(record.accuracy),
            optional_cell(record.heading),
            optional_cell(record.accel_x),
            optional_cell(record.accel_y),
            optional_cell(record.accel_z),
            optional_cell(record.accel_magnitude),
        ];
        writer
            .write_record(&row)
            .map_err(|error| SessionError::Csv(error.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|error| SessionError::Csv(error.to_string()))
}

fn optional_cell(value: Option<f64>) -> String {
    value.map(|value| value.to_string()).unwrap_or_default()
}
