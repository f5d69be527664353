use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    errors::ApiError,
    handlers::common::{map_service_error, success_response},
    models::{Month, SummaryStatus},
    services::summaries::SummaryFilter,
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct GenerateSummaryBody {
    pub staff_id: Uuid,
    pub branch_id: Uuid,
    pub month: Month,
}

#[derive(Debug, Deserialize)]
pub struct MonthBody {
    pub month: Month,
    pub approved_by: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApproveSummaryBody {
    pub approved_by: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct BulkTransitionResponse {
    pub month: Month,
    pub affected: u64,
}

// Pagination fields are inlined rather than flattened: serde_urlencoded
// cannot deserialize flattened numeric fields.
#[derive(Debug, Deserialize)]
pub struct ListSummariesQuery {
    pub staff_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub status: Option<String>,
    pub month: Option<Month>,
    #[serde(default = "crate::handlers::common::default_page")]
    pub page: u64,
    #[serde(default = "crate::handlers::common::default_per_page")]
    pub per_page: u64,
}

/// POST /summaries/generate
pub async fn generate_summary(
    State(state): State<AppState>,
    Json(body): Json<GenerateSummaryBody>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .services
        .summaries
        .generate_summary(body.staff_id, body.branch_id, body.month)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(summary))
}

/// POST /summaries/generate-month
pub async fn generate_summaries_for_month(
    State(state): State<AppState>,
    Json(body): Json<MonthBody>,
) -> Result<impl IntoResponse, ApiError> {
    let summaries = state
        .services
        .summaries
        .generate_summaries_for_month(body.month)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(summaries))
}

/// GET /summaries
pub async fn list_summaries(
    State(state): State<AppState>,
    Query(query): Query<ListSummariesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(|s| {
            s.parse::<SummaryStatus>()
                .map_err(|_| ApiError::BadRequest(format!("unknown status '{}'", s)))
        })
        .transpose()?;
    let filter = SummaryFilter {
        staff_id: query.staff_id,
        branch_id: query.branch_id,
        status,
        month: query.month,
    };
    let list = state
        .services
        .summaries
        .list_summaries(filter, query.page, query.per_page)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(list))
}

/// GET /summaries/:id
pub async fn get_summary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .services
        .summaries
        .get_summary(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(summary))
}

/// POST /summaries/:id/approve
pub async fn approve_summary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<ApproveSummaryBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let summary = state
        .services
        .summaries
        .approve_summary(id, body.approved_by)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(summary))
}

/// POST /summaries/:id/lock
pub async fn lock_summary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .services
        .summaries
        .lock_summary(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(summary))
}

/// POST /summaries/approve-month
pub async fn approve_summaries_for_month(
    State(state): State<AppState>,
    Json(body): Json<MonthBody>,
) -> Result<impl IntoResponse, ApiError> {
    let affected = state
        .services
        .summaries
        .approve_all_for_month(body.month, body.approved_by)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(BulkTransitionResponse {
        month: body.month,
        affected,
    }))
}

/// POST /summaries/lock-month
pub async fn lock_summaries_for_month(
    State(state): State<AppState>,
    Json(body): Json<MonthBody>,
) -> Result<impl IntoResponse, ApiError> {
    let affected = state
        .services
        .summaries
        .lock_all_for_month(body.month)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(BulkTransitionResponse {
        month: body.month,
        affected,
    }))
}
