use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    errors::ApiError,
    handlers::common::{created_response, map_service_error, success_response, PaginationParams},
    models::CommissionStatus,
    services::commissions::{AdjustCommissionRequest, CommissionFilter, CreateCommissionRequest},
    AppState,
};

// Pagination fields are inlined rather than flattened: serde_urlencoded
// cannot deserialize flattened numeric fields.
#[derive(Debug, Deserialize)]
pub struct ListCommissionsQuery {
    pub staff_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub status: Option<String>,
    pub calculated_from: Option<DateTime<Utc>>,
    pub calculated_to: Option<DateTime<Utc>>,
    #[serde(default = "crate::handlers::common::default_page")]
    pub page: u64,
    #[serde(default = "crate::handlers::common::default_per_page")]
    pub per_page: u64,
}

impl ListCommissionsQuery {
    fn into_filter(self) -> Result<(CommissionFilter, u64, u64), ApiError> {
        let status = self
            .status
            .as_deref()
            .map(|s| {
                s.parse::<CommissionStatus>()
                    .map_err(|_| ApiError::BadRequest(format!("unknown status '{}'", s)))
            })
            .transpose()?;
        Ok((
            CommissionFilter {
                staff_id: self.staff_id,
                branch_id: self.branch_id,
                status,
                calculated_from: self.calculated_from,
                calculated_to: self.calculated_to,
            },
            self.page,
            self.per_page,
        ))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ApproveCommissionBody {
    pub approved_by: Option<Uuid>,
    pub version: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LockCommissionBody {
    pub version: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReverseCommissionBody {
    pub reason: Option<String>,
    pub version: Option<i32>,
}

/// POST /commissions
pub async fn create_commission(
    State(state): State<AppState>,
    Json(request): Json<CreateCommissionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let commission = state
        .services
        .commissions
        .create_commission(request)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(commission))
}

/// GET /commissions
pub async fn list_commissions(
    State(state): State<AppState>,
    Query(query): Query<ListCommissionsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (filter, page, per_page) = query.into_filter()?;
    let list = state
        .services
        .commissions
        .list_commissions(filter, page, per_page)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(list))
}

/// GET /commissions/pending
pub async fn list_pending_commissions(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = CommissionFilter {
        status: Some(CommissionStatus::Pending),
        ..Default::default()
    };
    let list = state
        .services
        .commissions
        .list_commissions(filter, pagination.page, pagination.per_page)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(list))
}

/// GET /commissions/:id
pub async fn get_commission(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let commission = state
        .services
        .commissions
        .get_commission(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(commission))
}

/// GET /commissions/:id/adjustments
pub async fn get_adjustment_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let trail = state
        .services
        .commissions
        .adjustment_history(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(trail))
}

/// POST /commissions/:id/approve
pub async fn approve_commission(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<ApproveCommissionBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let commission = state
        .services
        .commissions
        .approve_commission(id, body.approved_by, body.version)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(commission))
}

/// POST /commissions/:id/lock
pub async fn lock_commission(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<LockCommissionBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let commission = state
        .services
        .commissions
        .lock_commission(id, body.version)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(commission))
}

/// POST /commissions/:id/reverse
pub async fn reverse_commission(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<ReverseCommissionBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let commission = state
        .services
        .commissions
        .reverse_commission(id, body.reason, body.version)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(commission))
}

/// POST /commissions/:id/adjust
pub async fn adjust_commission(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AdjustCommissionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let commission = state
        .services
        .commissions
        .adjust_commission(id, request)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(commission))
}
