use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    errors::ApiError,
    handlers::common::{map_service_error, success_response},
    models::Month,
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    /// Report month as `YYYY-MM`; defaults to the current month.
    pub month: Option<Month>,
}

#[derive(Debug, Deserialize)]
pub struct QuarterQuery {
    pub year: i32,
    pub quarter: u32,
}

#[derive(Debug, Deserialize)]
pub struct YearQuery {
    pub year: i32,
}

/// GET /reports/dashboard
pub async fn dashboard(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let report = state
        .services
        .reports
        .dashboard()
        .await
        .map_err(map_service_error)?;
    Ok(success_response(report))
}

/// GET /reports/branch-wise
pub async fn branch_wise(
    State(state): State<AppState>,
    Query(query): Query<MonthQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let month = query.month.unwrap_or_else(Month::current);
    let report = state
        .services
        .reports
        .branch_wise(month)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(report))
}

/// GET /reports/staff-wise
pub async fn staff_wise(
    State(state): State<AppState>,
    Query(query): Query<MonthQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let month = query.month.unwrap_or_else(Month::current);
    let report = state
        .services
        .reports
        .staff_wise(month)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(report))
}

/// GET /reports/monthly-trend
pub async fn monthly_trend(
    State(state): State<AppState>,
    Query(query): Query<YearQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state
        .services
        .reports
        .monthly_trend(query.year)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(report))
}

/// GET /reports/quarterly
pub async fn quarterly(
    State(state): State<AppState>,
    Query(query): Query<QuarterQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state
        .services
        .reports
        .quarterly(query.year, query.quarter)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(report))
}

/// GET /reports/year-end
pub async fn year_end(
    State(state): State<AppState>,
    Query(query): Query<YearQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state
        .services
        .reports
        .year_end(query.year)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(report))
}
