// src/api/mod.rs

pub mod cache;

pub use cache::ResultCache;

use chrono::Local;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::{convert::Infallible, sync::Arc};
use tracing::{error, info, warn};
use warp::{
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        Response, StatusCode,
    },
    reply::{self, Reply},
    Filter, Rejection,
};

use crate::{
    error::{ErrorKind, ExtractionError},
    export,
    extract::{ExtractionResult, Extractor},
    fetch::Fetch,
};

/// Everything a request handler needs: the extractor and the caller-owned
/// result cache.
pub struct AppState<F> {
    pub extractor: Arc<Extractor<F>>,
    pub cache: ResultCache,
}

impl<F> AppState<F> {
    pub fn new(extractor: Extractor<F>, cache: ResultCache) -> Self {
        Self {
            extractor: Arc::new(extractor),
            cache,
        }
    }
}

impl<F> Clone for AppState<F> {
    fn clone(&self) -> Self {
        Self {
            extractor: Arc::clone(&self.extractor),
            cache: self.cache.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FetchMultipleRequest {
    #[serde(default)]
    banks: Vec<String>,
}

/// All service routes, without CORS.
pub fn routes<F: Fetch + 'static>(
    state: AppState<F>,
) -> impl Filter<Extract = (reply::Response,), Error = Rejection> + Clone {
    let index = warp::path::end().and(warp::get()).and_then(index);
    let health = warp::path!("health").and(warp::get()).and_then(health);

    let banks = warp::path!("api" / "banks")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(list_banks);

    let fetch_one = warp::path!("api" / "fetch" / String)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(fetch_one);

    let fetch_multiple = warp::path!("api" / "fetch-multiple")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(fetch_multiple);

    let export = warp::path!("api" / "export")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(export_workbook);

    let status = warp::path!("api" / "status")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(status);

    let clear = warp::path!("api" / "clear")
        .and(warp::delete())
        .and(with_state(state))
        .and_then(clear);

    index
        .or(health)
        .unify()
        .or(banks)
        .unify()
        .or(fetch_one)
        .unify()
        .or(fetch_multiple)
        .unify()
        .or(export)
        .unify()
        .or(status)
        .unify()
        .or(clear)
        .unify()
}

/// CORS policy for the browser front end.
pub fn cors(origins: &[String]) -> warp::cors::Builder {
    warp::cors()
        .allow_origins(origins.iter().map(String::as_str))
        .allow_methods(vec!["GET", "POST", "DELETE"])
        .allow_headers(vec!["content-type"])
}

fn with_state<F: Fetch + 'static>(
    state: AppState<F>,
) -> impl Filter<Extract = (AppState<F>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn json_response(status: StatusCode, body: &Value) -> reply::Response {
    reply::with_status(reply::json(body), status).into_response()
}

fn error_status(err: &ExtractionError) -> StatusCode {
    match err.kind {
        ErrorKind::UnknownSource => StatusCode::NOT_FOUND,
        ErrorKind::Fetch(_) => StatusCode::BAD_GATEWAY,
        ErrorKind::NotFound { .. } | ErrorKind::Parse(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn outcome_body(
    source_id: &str,
    outcome: &Result<ExtractionResult, ExtractionError>,
) -> (StatusCode, Value) {
    match outcome {
        Ok(result) => (
            StatusCode::OK,
            json!({
                "bank": source_id,
                "status": "success",
                "message": format!("Successfully fetched {} records", result.records.len()),
                "columns": result.columns,
                "data": result.records,
                "timestamp": result.fetched_at.to_rfc3339(),
            }),
        ),
        Err(err) => (
            error_status(err),
            json!({
                "bank": source_id,
                "status": "error",
                "stage": err.stage,
                "message": err.to_string(),
                "retryable": err.is_retryable(),
            }),
        ),
    }
}

async fn index() -> Result<reply::Response, Infallible> {
    Ok(json_response(
        StatusCode::OK,
        &json!({
            "message": "Bank FD Rates API",
            "endpoints": {
                "/api/banks": "Get list of available banks",
                "/api/fetch/<bank_name>": "Fetch data for a specific bank",
                "/api/fetch-multiple": "Fetch data for multiple banks",
                "/api/export": "Export all fetched data to Excel",
                "/api/status": "Get current fetch status",
                "/api/clear": "Clear all data",
            }
        }),
    ))
}

async fn health() -> Result<reply::Response, Infallible> {
    Ok(json_response(
        StatusCode::OK,
        &json!({"status": "healthy", "service": "ratescraper"}),
    ))
}

async fn list_banks<F: Fetch>(state: AppState<F>) -> Result<reply::Response, Infallible> {
    let registry = state.extractor.registry();
    let configurations: Map<String, Value> = registry
        .iter()
        .map(|s| (s.id.clone(), json!(s)))
        .collect();
    Ok(json_response(
        StatusCode::OK,
        &json!({
            "banks": registry.ids().collect::<Vec<_>>(),
            "configurations": configurations,
        }),
    ))
}

async fn fetch_one<F: Fetch>(
    source_id: String,
    state: AppState<F>,
) -> Result<reply::Response, Infallible> {
    let outcome = state.extractor.extract(&source_id).await;
    if let Ok(result) = &outcome {
        state.cache.insert(result.clone()).await;
    }
    let (status, body) = outcome_body(&source_id, &outcome);
    Ok(json_response(status, &body))
}

async fn fetch_multiple<F: Fetch>(
    req: FetchMultipleRequest,
    state: AppState<F>,
) -> Result<reply::Response, Infallible> {
    let requested = req.banks.len();
    let registry = state.extractor.registry();
    let (known, unknown): (Vec<String>, Vec<String>) =
        req.banks.into_iter().partition(|id| registry.contains(id));
    if !unknown.is_empty() {
        warn!(?unknown, "skipping unknown sources");
    }

    let outcomes = state.extractor.extract_batch(known).await;

    let mut results = Map::new();
    let (mut successful, mut failed) = (0usize, 0usize);
    for (id, outcome) in outcomes {
        match &outcome {
            Ok(result) => {
                successful += 1;
                state.cache.insert(result.clone()).await;
            }
            Err(_) => failed += 1,
        }
        let (_, body) = outcome_body(&id, &outcome);
        results.insert(id, body);
    }
    info!(requested, successful, failed, "batch fetch done");

    Ok(json_response(
        StatusCode::OK,
        &json!({
            "results": results,
            "summary": {
                "requested": requested,
                "successful": successful,
                "failed": failed,
            }
        }),
    ))
}

async fn export_workbook<F: Fetch>(state: AppState<F>) -> Result<reply::Response, Infallible> {
    let snapshot = state.cache.snapshot().await;
    if snapshot.iter().all(|r| r.records.is_empty()) {
        return Ok(json_response(
            StatusCode::BAD_REQUEST,
            &json!({
                "status": "error",
                "message": "No data to export. Fetch some banks first.",
            }),
        ));
    }

    let filename = export::export_filename(&Local::now());
    let built = export::write_workbook(&snapshot).and_then(|bytes| {
        Response::builder()
            .header(CONTENT_TYPE, export::XLSX_MIME)
            .header(
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            )
            .body(bytes)
            .map_err(anyhow::Error::from)
    });

    match built {
        Ok(resp) => {
            info!(file = %filename, sheets = snapshot.len(), "exported workbook");
            Ok(resp.into_response())
        }
        Err(e) => {
            error!(error = %e, "export failed");
            Ok(json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({
                    "status": "error",
                    "message": format!("Error creating Excel file: {}", e),
                }),
            ))
        }
    }
}

async fn status<F: Fetch>(state: AppState<F>) -> Result<reply::Response, Infallible> {
    let registry = state.extractor.registry();
    let mut per_source = Map::new();
    let mut fetched_banks = 0usize;
    for id in registry.ids() {
        let entry = match state.cache.info(id).await {
            Some(info) => {
                fetched_banks += 1;
                json!({
                    "fetched": true,
                    "timestamp": info.fetched_at.to_rfc3339(),
                    "record_count": info.record_count,
                })
            }
            None => json!({"fetched": false, "timestamp": null, "record_count": 0}),
        };
        per_source.insert(id.to_string(), entry);
    }

    Ok(json_response(
        StatusCode::OK,
        &json!({
            "status": per_source,
            "total_banks": registry.len(),
            "fetched_banks": fetched_banks,
        }),
    ))
}

async fn clear<F: Fetch>(state: AppState<F>) -> Result<reply::Response, Infallible> {
    state.cache.clear().await;
    info!("cache cleared");
    Ok(json_response(
        StatusCode::OK,
        &json!({"status": "success", "message": "All fetched data cleared"}),
    ))
}
