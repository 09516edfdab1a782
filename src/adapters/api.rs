use std::sync::Arc;

use actix_web::http::header;
use actix_web::{HttpResponse, Responder, get, post, web};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::app::ingestion::{IngestError, IngestionService, SENSOR_COLLECTION, normalize_limit};
use crate::app::poller::STATION_COLLECTION;
use crate::domain::session_buffer::SessionError;

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<IngestionService>,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlags {
    pub in_memory_buffer: bool,
    pub csv_export: bool,
    pub durable_store: bool,
    pub station_polling: bool,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: String,
    pub features: FeatureFlags,
    pub in_memory_points: usize,
    pub session_id: String,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartResponse {
    pub success: bool,
    pub session_id: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub success: bool,
    pub total_points: usize,
    pub message: String,
    pub stored_to_cloud: bool,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CountResponse {
    pub count: usize,
    pub session_id: String,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionStopResponse {
    pub success: bool,
    pub message: String,
    pub data_points: usize,
    pub session_id: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct DocumentsResponse {
    pub success: bool,
    pub data: Vec<Value>,
    pub count: usize,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StationFetchResponse {
    pub success: bool,
    pub message: String,
    pub stations_count: usize,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(root_status)
        .service(health)
        .service(start_session_endpoint)
        .service(ingest_endpoint)
        .service(count_endpoint)
        .service(download_endpoint)
        .service(stop_session_endpoint)
        .service(recent_sensor_data_endpoint)
        .service(recent_station_data_endpoint)
        .service(station_stats_endpoint)
        .service(station_fetch_endpoint);
}

#[get("/")]
async fn root_status(state: web::Data<ApiState>) -> impl Responder {
    match state.service.snapshot() {
        Ok(snapshot) => HttpResponse::Ok().json(StatusResponse {
            status: "Server is running".to_string(),
            features: FeatureFlags {
                in_memory_buffer: true,
                csv_export: true,
                durable_store: true,
                station_polling: state.service.station_polling_enabled(),
            },
            in_memory_points: snapshot.point_count,
            session_id: snapshot.session_id,
        }),
        Err(error) => ingest_error_response(error),
    }
}

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

#[post("/api/session/start")]
async fn start_session_endpoint(state: web::Data<ApiState>) -> impl Responder {
    match state.service.start_session() {
        Ok(session_id) => HttpResponse::Ok().json(SessionStartResponse {
            success: true,
            session_id,
            message: "New session started".to_string(),
        }),
        Err(error) => ingest_error_response(error),
    }
}

#[post("/api/data")]
async fn ingest_endpoint(state: web::Data<ApiState>, body: web::Json<Value>) -> impl Responder {
    match state.service.ingest(body.get("data")).await {
        Ok(receipt) => HttpResponse::Ok().json(IngestResponse {
            success: true,
            total_points: receipt.total_points,
            message: format!("Received {} data points", receipt.accepted),
            stored_to_cloud: receipt.stored_to_cloud,
        }),
        Err(error) => ingest_error_response(error),
    }
}

#[get("/api/data/count")]
async fn count_endpoint(state: web::Data<ApiState>) -> impl Responder {
    match state.service.snapshot() {
        Ok(snapshot) => HttpResponse::Ok().json(CountResponse {
            count: snapshot.point_count,
            session_id: snapshot.session_id,
        }),
        Err(error) => ingest_error_response(error),
    }
}

#[get("/api/data/download")]
async fn download_endpoint(state: web::Data<ApiState>) -> impl Responder {
    match state.service.export_csv() {
        Ok(export) => HttpResponse::Ok()
            .content_type("text/csv")
            .insert_header((
                header::CONTENT_DISPOSITION,
                format!(
                    "attachment; filename=sensor_data_{}.csv",
                    export.session_id
                ),
            ))
            .body(export.body),
        Err(error) => ingest_error_response(error),
    }
}

#[post("/api/session/stop")]
async fn stop_session_endpoint(state: web::Data<ApiState>) -> impl Responder {
    match state.service.stop_session() {
        Ok(snapshot) => HttpResponse::Ok().json(SessionStopResponse {
            success: true,
            message: "Session stopped".to_string(),
            data_points: snapshot.point_count,
            session_id: snapshot.session_id,
        }),
        Err(error) => ingest_error_response(error),
    }
}

#[get("/api/firestore/sensor-data")]
async fn recent_sensor_data_endpoint(
    state: web::Data<ApiState>,
    query: web::Query<LimitQuery>,
) -> impl Responder {
    recent_documents_response(&state, SENSOR_COLLECTION, &query).await
}

#[get("/api/firestore/dublin-bikes")]
async fn recent_station_data_endpoint(
    state: web::Data<ApiState>,
    query: web::Query<LimitQuery>,
) -> impl Responder {
    recent_documents_response(&state, STATION_COLLECTION, &query).await
}

async fn recent_documents_response(
    state: &ApiState,
    collection: &'static str,
    query: &LimitQuery,
) -> HttpResponse {
    let limit = normalize_limit(query.limit.as_deref());

    match state.service.recent_documents(collection, limit).await {
        Ok(data) => HttpResponse::Ok().json(DocumentsResponse {
            success: true,
            count: data.len(),
            data,
        }),
        Err(error) => {
            tracing::warn!(collection, error = %error, "recent document query failed");
            ingest_error_response(error)
        }
    }
}

#[get("/api/dublin-bikes/stats")]
async fn station_stats_endpoint(state: web::Data<ApiState>) -> impl Responder {
    HttpResponse::Ok().json(state.service.station_stats())
}

#[post("/api/dublin-bikes/fetch")]
async fn station_fetch_endpoint(state: web::Data<ApiState>) -> impl Responder {
    match state.service.trigger_station_fetch().await {
        Ok(outcome) => HttpResponse::Ok().json(StationFetchResponse {
            success: true,
            message: format!("Fetched and saved {} stations", outcome.stations_count),
            stations_count: outcome.stations_count,
        }),
        Err(error) => HttpResponse::InternalServerError().json(serde_json::json!({
            "success": false,
            "message": "Station fetch failed",
            "error": error.to_string(),
        })),
    }
}

fn ingest_error_response(error: IngestError) -> HttpResponse {
    match error {
        IngestError::Validation(message) => HttpResponse::BadRequest().json(serde_json::json!({
            "success": false,
            "error": message
        })),
        IngestError::Session(SessionError::Empty) => {
            HttpResponse::NotFound().json(serde_json::json!({
                "success": false,
                "error": "No data available for download"
            }))
        }
        other => HttpResponse::InternalServerError().json(serde_json::json!({
            "success": false,
            "error": other.to_string()
        })),
    }
}
