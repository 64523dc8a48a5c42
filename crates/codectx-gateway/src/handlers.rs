use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use codectx_index::{FileOutcome, QueryHit};
use codectx_store::{Row, Select};

use crate::error::ApiError;
use crate::server::AppState;

/// Records returned by the debug listing at most.
const LIST_LIMIT: usize = 1000;

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IngestRequest {
    pub file_path: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub(crate) struct IngestResponse {
    message: &'static str,
    count: usize,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QueryRequest {
    pub query: Option<String>,
    pub current_file_path: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub(crate) struct QueryResponse {
    results: Vec<QueryHit>,
}

#[derive(Debug, serde::Serialize)]
pub(crate) struct ListResponse {
    count: usize,
    records: Vec<Row>,
}

#[derive(Debug, serde::Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    initialized: bool,
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

pub(crate) async fn ingest_handler(
    State(state): State<AppState>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<Json<IngestResponse>, ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::rejected(&e))?;
    let (Some(file_path), Some(code)) = (required(payload.file_path), required(payload.code))
    else {
        return Err(ApiError::MissingInput("filePath and code are required"));
    };

    let ctx = state.context()?;
    let outcome = ctx
        .indexer
        .ingest_source(&file_path, &code)
        .await
        .map_err(|e| ApiError::internal("Failed to ingest context", e))?;
    let count = match outcome {
        FileOutcome::Indexed { records, .. } => records,
        _ => 0,
    };
    tracing::info!(path = %file_path, count, "context ingested");

    Ok(Json(IngestResponse {
        message: "Context ingested successfully",
        count,
    }))
}

pub(crate) async fn query_handler(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::rejected(&e))?;
    let Some(query) = required(payload.query) else {
        return Err(ApiError::MissingInput("query is required"));
    };

    let ctx = state.context()?;
    let results = ctx
        .query
        .search(&query, payload.current_file_path.as_deref())
        .await
        .map_err(|e| ApiError::internal("Failed to query context", e))?;

    Ok(Json(QueryResponse { results }))
}

pub(crate) async fn list_handler(
    State(state): State<AppState>,
) -> Result<Json<ListResponse>, ApiError> {
    let ctx = state.context()?;
    let records = ctx
        .index
        .select(Select::all().limit(LIST_LIMIT))
        .await
        .map_err(|e| ApiError::internal("Failed to list context", e))?;

    Ok(Json(ListResponse {
        count: records.len(),
        records,
    }))
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.started_at.elapsed().as_secs(),
        initialized: state.context.get().is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_response_serializes() {
        let resp = HealthResponse {
            status: "ok",
            uptime_secs: 42,
            initialized: false,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(json.contains("\"initialized\":false"));
    }

    #[test]
    fn ingest_request_uses_camel_case() {
        let json = r#"{"filePath":"/p/a.js","code":"const a = 1;"}"#;
        let req: IngestRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.file_path.as_deref(), Some("/p/a.js"));
        assert_eq!(req.code.as_deref(), Some("const a = 1;"));
    }

    #[test]
    fn query_request_current_file_is_optional() {
        let req: QueryRequest = serde_json::from_str(r#"{"query":"parse"}"#).unwrap();
        assert_eq!(req.query.as_deref(), Some("parse"));
        assert!(req.current_file_path.is_none());
    }

    #[test]
    fn empty_strings_count_as_missing() {
        assert_eq!(required(Some(String::new())), None);
        assert_eq!(required(Some("x".into())).as_deref(), Some("x"));
        assert_eq!(required(None), None);
    }
}
