use crate::config::Config;
use crate::errors::AppError;
use crate::models::{
    ApplicationStatus, CreditApplication, CustomerSummary, ListQueryParams, OverviewStats,
    ProductStats, SearchParams, StatusStats, StatusUpdateRequest,
};
use crate::query::{self, ListFilter, SqlValue, KEY_COLUMN};
use crate::store::ApplicationStore;
use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Per-request store access.
    pub store: ApplicationStore,
    /// Application configuration.
    pub config: Config,
}

impl AppState {
    fn table(&self) -> String {
        self.config.qualified_table()
    }
}

/// Health check endpoint.
///
/// Liveness only; never touches the store.
pub async fn health() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "status": "healthy",
            "service": "credit-apps-api",
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": Utc::now(),
        })),
    )
}

/// GET /api/db2/test
///
/// Connectivity probe: checks a connection out, runs `SELECT 1`, reports the
/// redacted target.
pub async fn db_test(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    state.store.ping().await?;
    Ok(Json(json!({
        "success": true,
        "message": "store connection OK",
        "target": state.config.redacted_database_url(),
    })))
}

/// GET /api/db2/info
///
/// Row count plus target identity. The reported target never carries
/// credentials.
pub async fn db_info(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let sql = query::count_query(&state.table());
    let (row_count,): (i64,) = state.store.fetch_one(&sql, Vec::new()).await?;

    Ok(Json(json!({
        "success": true,
        "row_count": row_count,
        "target": state.config.redacted_database_url(),
        "schema": state.config.db_schema,
        "table": state.config.table_name,
    })))
}

/// GET /api/applications
///
/// Filtered, paginated list. Each present filter contributes one predicate;
/// validation failures are reported before any store round trip.
pub async fn list_applications(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListQueryParams>,
) -> Result<Json<Value>, AppError> {
    tracing::info!("GET /api/applications - params: {:?}", params);

    let filter = ListFilter::from_params(&params)?;
    let (sql, binds) = query::build_list_query(&state.table(), &filter);
    let applications: Vec<CreditApplication> = state.store.fetch_all(&sql, binds).await?;

    Ok(Json(json!({
        "success": true,
        "count": applications.len(),
        "limit": filter.limit,
        "offset": filter.offset,
        "applications": applications,
    })))
}

/// GET /api/application/:app_ref
pub async fn get_application(
    State(state): State<Arc<AppState>>,
    Path(app_ref): Path<String>,
) -> Result<Json<Value>, AppError> {
    tracing::info!("GET /api/application/{}", app_ref);

    let sql = query::get_query(&state.table());
    let application: CreditApplication = state
        .store
        .fetch_optional(&sql, vec![SqlValue::Text(app_ref.clone())])
        .await?
        .ok_or_else(|| AppError::NotFound(format!("application '{}' not found", app_ref)))?;

    Ok(Json(json!({ "success": true, "application": application })))
}

/// GET /api/customer/:cis_number/applications
///
/// All applications owned by one customer, newest first. The customer number
/// is a case-insensitive lookup key.
pub async fn customer_applications(
    State(state): State<Arc<AppState>>,
    Path(cis_number): Path<String>,
) -> Result<Json<Value>, AppError> {
    let cis = cis_number.trim().to_uppercase();
    tracing::info!("GET /api/customer/{}/applications", cis);

    let (sql, binds) = query::build_customer_query(&state.table(), &cis);
    let applications: Vec<CreditApplication> = state.store.fetch_all(&sql, binds).await?;

    if applications.is_empty() {
        return Err(AppError::NotFound(format!(
            "no applications for customer '{}'",
            cis
        )));
    }

    Ok(Json(json!({
        "success": true,
        "cis_customer_number": cis,
        "count": applications.len(),
        "applications": applications,
    })))
}

/// GET /api/customer/:cis_number/summary
pub async fn customer_summary(
    State(state): State<Arc<AppState>>,
    Path(cis_number): Path<String>,
) -> Result<Json<Value>, AppError> {
    let cis = cis_number.trim().to_uppercase();
    tracing::info!("GET /api/customer/{}/summary", cis);

    let sql = query::customer_summary_query(&state.table());
    let summary: CustomerSummary = state
        .store
        .fetch_one(&sql, vec![SqlValue::Text(cis.clone())])
        .await?;

    if summary.total_applications == 0 {
        return Err(AppError::NotFound(format!(
            "no applications for customer '{}'",
            cis
        )));
    }

    Ok(Json(json!({
        "success": true,
        "cis_customer_number": cis,
        "summary": summary,
    })))
}

/// GET /api/search?query=
///
/// Case-insensitive substring search across name, email, customer number and
/// application reference. Terms shorter than two characters are a client
/// error, not an empty result.
pub async fn search_applications(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>, AppError> {
    let term = params.query.as_deref().unwrap_or("");
    tracing::info!("GET /api/search - query: '{}'", term);

    let (sql, binds) = query::build_search_query(&state.table(), term)?;
    let results: Vec<CreditApplication> = state.store.fetch_all(&sql, binds).await?;

    Ok(Json(json!({
        "success": true,
        "query": term.trim().to_uppercase(),
        "count": results.len(),
        "results": results,
    })))
}

/// POST /api/application
///
/// Creates one record. The existence pre-check gives callers an early 409;
/// the table's unique constraint stays the authoritative guard, so a
/// concurrent duplicate surfacing as SQLSTATE 23505 maps to the same
/// conflict.
pub async fn create_application(
    State(state): State<Arc<AppState>>,
    Json(mut body): Json<CreditApplication>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let app_ref = body.app_ref.trim().to_string();
    if app_ref.is_empty() {
        return Err(AppError::BadRequest("app_ref is required".to_string()));
    }
    body.app_ref = app_ref.clone();
    tracing::info!("POST /api/application - app_ref: {}", app_ref);

    let cis = body
        .cis_customer_number
        .as_deref()
        .map(str::trim)
        .unwrap_or("");
    if cis.is_empty() {
        return Err(AppError::BadRequest(
            "cis_customer_number is required".to_string(),
        ));
    }
    body.cis_customer_number = Some(cis.to_uppercase());

    if let Some(raw) = &body.app_status {
        let status = ApplicationStatus::parse(raw).ok_or_else(|| {
            AppError::BadRequest(format!(
                "app_status must be one of {}",
                ApplicationStatus::allowed_values()
            ))
        })?;
        body.app_status = Some(status.as_str().to_string());
    }

    if application_exists(&state, &app_ref).await? {
        return Err(AppError::Conflict(format!(
            "application '{}' already exists",
            app_ref
        )));
    }

    let (sql, binds) = query::build_insert(&state.table(), &body, Utc::now());
    match state.store.execute(&sql, binds).await {
        Ok(_) => {}
        Err(e) if e.is_unique_violation() => {
            return Err(AppError::Conflict(format!(
                "application '{}' already exists",
                app_ref
            )))
        }
        Err(e) => return Err(e),
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "app_ref": app_ref })),
    ))
}

/// PATCH /api/application/:app_ref/status
///
/// Status transition within the fixed enumeration. A reason supplied with a
/// REJECTED status is persisted in the same statement.
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(app_ref): Path<String>,
    Json(body): Json<StatusUpdateRequest>,
) -> Result<Json<Value>, AppError> {
    tracing::info!("PATCH /api/application/{}/status", app_ref);

    let status = ApplicationStatus::parse(body.status.as_deref().unwrap_or("")).ok_or_else(
        || {
            AppError::BadRequest(format!(
                "status must be one of {}",
                ApplicationStatus::allowed_values()
            ))
        },
    )?;

    if !application_exists(&state, &app_ref).await? {
        return Err(AppError::NotFound(format!(
            "application '{}' not found",
            app_ref
        )));
    }

    let (sql, binds) =
        query::build_status_update(&state.table(), &app_ref, status, body.reason.as_deref());
    state.store.execute(&sql, binds).await?;

    Ok(Json(json!({
        "success": true,
        "app_ref": app_ref,
        "status": status.as_str(),
    })))
}

/// PUT /api/application/:app_ref
///
/// Partial field update from a column→value payload. The payload is checked
/// against the column allow-list before any store round trip; the key column
/// itself is never updatable.
pub async fn update_application(
    State(state): State<Arc<AppState>>,
    Path(app_ref): Path<String>,
    Json(body): Json<serde_json::Map<String, Value>>,
) -> Result<Json<Value>, AppError> {
    tracing::info!("PUT /api/application/{} - {} fields", app_ref, body.len());

    let (sql, binds) = query::build_update_query(&state.table(), &app_ref, &body)?;

    if !application_exists(&state, &app_ref).await? {
        return Err(AppError::NotFound(format!(
            "application '{}' not found",
            app_ref
        )));
    }

    state.store.execute(&sql, binds).await?;

    let updated_columns: Vec<String> = body
        .keys()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| k != KEY_COLUMN)
        .collect();

    Ok(Json(json!({
        "success": true,
        "app_ref": app_ref,
        "updated_columns": updated_columns,
    })))
}

/// DELETE /api/application/:app_ref
pub async fn delete_application(
    State(state): State<Arc<AppState>>,
    Path(app_ref): Path<String>,
) -> Result<Json<Value>, AppError> {
    tracing::info!("DELETE /api/application/{}", app_ref);

    if !application_exists(&state, &app_ref).await? {
        return Err(AppError::NotFound(format!(
            "application '{}' not found",
            app_ref
        )));
    }

    let sql = query::delete_query(&state.table());
    state
        .store
        .execute(&sql, vec![SqlValue::Text(app_ref.clone())])
        .await?;

    Ok(Json(json!({
        "success": true,
        "app_ref": app_ref,
        "deleted": true,
    })))
}

/// GET /api/stats/overview
pub async fn stats_overview(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let sql = query::overview_stats_query(&state.table());
    let stats: OverviewStats = state.store.fetch_one(&sql, Vec::new()).await?;
    Ok(Json(json!({ "success": true, "stats": stats })))
}

/// GET /api/stats/by-status
pub async fn stats_by_status(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let sql = query::status_stats_query(&state.table());
    let stats: Vec<StatusStats> = state.store.fetch_all(&sql, Vec::new()).await?;
    Ok(Json(json!({ "success": true, "stats": stats })))
}

/// GET /api/stats/by-product
pub async fn stats_by_product(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, AppError> {
    let sql = query::product_stats_query(&state.table());
    let stats: Vec<ProductStats> = state.store.fetch_all(&sql, Vec::new()).await?;
    Ok(Json(json!({ "success": true, "stats": stats })))
}

/// Fallback for unmatched routes: structured JSON instead of a bare 404.
pub async fn not_found_fallback(uri: Uri) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "error": format!("no route for {}", uri.path()),
        })),
    )
}

/// Key-existence probe shared by create/update/delete. One round trip; the
/// mutation that follows is a second, unsynchronized one.
async fn application_exists(state: &AppState, app_ref: &str) -> Result<bool, AppError> {
    let sql = query::exists_query(&state.table());
    let row: Option<(String,)> = state
        .store
        .fetch_optional(&sql, vec![SqlValue::Text(app_ref.to_string())])
        .await?;
    Ok(row.is_some())
}
