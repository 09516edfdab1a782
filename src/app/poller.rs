use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use actix_web::web;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::adapters::jcdecaux::{FetchError, StationSource};
use crate::app::batch::{BatchCommitter, CommitResult};
use crate::app::services::SinkError;
use crate::domain::clock::Clock;
use crate::domain::models::FetchStats;
use crate::domain::station::{normalize_station, stamp_fetch};

pub const STATION_COLLECTION: &str = "dublin_bikes";

#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("commit failed after {committed_chunks} chunk(s): {source}")]
    Commit {
        committed_chunks: usize,
        #[source]
        source: SinkError,
    },
    #[error("commit task failed: {0}")]
    Blocking(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOutcome {
    pub stations_count: usize,
}

/// Pulls station availability and commits it under [`STATION_COLLECTION`].
/// Fetch episodes are serialized: a trigger that arrives while one is in
/// flight waits for it to finish and then runs its own.
pub struct StationPoller {
    source: Arc<dyn StationSource>,
    committer: Arc<BatchCommitter>,
    clock: Arc<dyn Clock>,
    stats: Mutex<FetchStats>,
    in_flight: tokio::sync::Mutex<()>,
}

impl StationPoller {
    pub fn new(
        source: Arc<dyn StationSource>,
        committer: Arc<BatchCommitter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            committer,
            clock,
            stats: Mutex::new(FetchStats::default()),
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    pub fn stats(&self) -> FetchStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_configured(&self) -> bool {
        self.source.is_configured()
    }

    pub async fn trigger_manual_fetch(&self) -> Result<FetchOutcome, PollError> {
        tracing::info!("manual station fetch requested");
        self.run_fetch().await
    }

    pub async fn run_fetch(&self) -> Result<FetchOutcome, PollError> {
        let _guard = self.in_flight.lock().await;

        let result = self.fetch_and_commit().await;
        self.record_outcome(&result);
        result
    }

    async fn fetch_and_commit(&self) -> Result<FetchOutcome, PollError> {
        let upstream = self.source.fetch_stations().await?;

        let records = upstream.into_iter().map(normalize_station).collect();
        let documents = stamp_fetch(records, self.clock.now());
        let stations_count = documents.len();

        let committer = Arc::clone(&self.committer);
        let result = web::block(move || committer.commit(STATION_COLLECTION, &documents))
            .await
            .map_err(|error| PollError::Blocking(error.to_string()))?;

        match result {
            CommitResult::Committed { batches, .. } => {
                tracing::debug!(stations_count, batches, "station snapshot committed");
                Ok(FetchOutcome { stations_count })
            }
            CommitResult::Failed {
                committed_chunks,
                error,
            } => Err(PollError::Commit {
                committed_chunks,
                source: error,
            }),
        }
    }

    fn record_outcome(&self, result: &Result<FetchOutcome, PollError>) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);

        match result {
            Ok(outcome) => {
                stats.fetch_count += 1;
                stats.last_fetch_time = self.clock.now().to_iso8601();
                stats.last_fetch_status =
                    format!("Success: {} stations saved", outcome.stations_count);
                tracing::info!(
                    stations_count = outcome.stations_count,
                    fetch_count = stats.fetch_count,
                    "station fetch completed"
                );
            }
            Err(error) => {
                stats.last_fetch_status = format!("Error: {error}");
                tracing::warn!(error = %error, "station fetch failed");
            }
        }
    }
}

/// Runs one fetch immediately and then one per `period` for as long as the
/// actix system lives. Failures are recorded in the stats and never end the
/// loop.
pub fn start_poller(poller: Arc<StationPoller>, period: Duration) -> JoinHandle<()> {
    actix_web::rt::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            // outcome already logged and recorded in stats
            let _ = poller.run_fetch().await;
        }
    })
}
