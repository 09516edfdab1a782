use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{App, HttpServer, web};

use crate::adapters::api::{ApiState, configure_routes};
use crate::adapters::db::{open_connection, run_migrations};
use crate::adapters::jcdecaux::JcDecauxClient;
use crate::app::batch::BatchCommitter;
use crate::app::config::AppConfig;
use crate::app::error::AppError;
use crate::app::ingestion::IngestionService;
use crate::app::poller::{StationPoller, start_poller};
use crate::app::services::SqliteSink;
use crate::domain::clock::{Clock, SystemClock};
use crate::domain::session_buffer::SessionBuffer;

const JSON_BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

struct Components {
    committer: Arc<BatchCommitter>,
    poller: Arc<StationPoller>,
    clock: Arc<dyn Clock>,
}

fn build_components(config: &AppConfig) -> Result<Components, AppError> {
    if let Some(parent) = Path::new(&config.db_path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(AppError::database_init)?;
    }

    let mut connection = open_connection(&config.db_path).map_err(AppError::database_init)?;
    run_migrations(&mut connection).map_err(AppError::database_init)?;

    let sink = SqliteSink::new(Arc::new(Mutex::new(connection)));
    let committer = Arc::new(BatchCommitter::new(Arc::new(sink)));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let source = JcDecauxClient::new(
        &config.station_api_url,
        &config.station_contract,
        config.api_key.clone(),
        Duration::from_secs(config.upstream_timeout_secs),
    )
    .map_err(AppError::runtime)?;
    let poller = Arc::new(StationPoller::new(
        Arc::new(source),
        Arc::clone(&committer),
        Arc::clone(&clock),
    ));

    Ok(Components {
        committer,
        poller,
        clock,
    })
}

pub fn run(config: AppConfig) -> Result<(), AppError> {
    let Components {
        committer,
        poller,
        clock,
    } = build_components(&config)?;

    let api_state = ApiState {
        service: Arc::new(IngestionService::new(
            SessionBuffer::new(clock),
            committer,
            Arc::clone(&poller),
        )),
    };
    let poll_interval = Duration::from_secs(config.station_poll_interval_secs);
    let bind = (config.http_host.clone(), config.port);

    tracing::info!(host = %bind.0, port = bind.1, "http server starting");

    actix_web::rt::System::new().block_on(async move {
        let poller_handle = start_poller(poller, poll_interval);

        let server_result = HttpServer::new(move || {
            App::new()
                .wrap(Cors::permissive())
                .app_data(web::JsonConfig::default().limit(JSON_BODY_LIMIT_BYTES))
                .app_data(web::Data::new(api_state.clone()))
                .configure(configure_routes)
        })
        .bind(bind)
        .map_err(AppError::runtime)?
        .run()
        .await;

        poller_handle.abort();
        tracing::info!("http server stopped");

        server_result.map_err(AppError::runtime)
    })
}

pub fn run_station_fetch(config: AppConfig) -> Result<(), AppError> {
    let Components { poller, .. } = build_components(&config)?;

    actix_web::rt::System::new().block_on(async move {
        let result = poller.trigger_manual_fetch().await;
        let stats = poller.stats();

        tracing::info!(
            fetch_count = stats.fetch_count,
            last_fetch_status = %stats.last_fetch_status,
            "station fetch finished"
        );

        result
            .map(|outcome| {
                println!("saved {} stations", outcome.stations_count);
            })
            .map_err(AppError::runtime)
    })
}
