//! Read-only reporting over the commission ledger.
//!
//! Every report is computed from ledger rows at request time; nothing here
//! mutates state. Reversed commissions are excluded from all figures.
//! Aggregation happens in Rust over the fetched scope rather than in SQL, so
//! the decimal arithmetic is identical across database backends.

use crate::{
    db::DbPool,
    entities::commission::{self, Entity as Commission, Model as CommissionModel},
    errors::ServiceError,
    models::{parse_stored, CommissionStatus, Month},
};
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// A report selector, dispatched by [`ReportService::generate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportRequest {
    Dashboard,
    BranchWise(Month),
    StaffWise(Month),
    MonthlyTrend { year: i32 },
    Quarterly { year: i32, quarter: u32 },
    YearEnd { year: i32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Report {
    Dashboard(DashboardReport),
    BranchWise(BranchWiseReport),
    StaffWise(StaffWiseReport),
    MonthlyTrend(MonthlyTrendReport),
    Quarterly(QuarterlyReport),
    YearEnd(YearEndReport),
}

/// Per-staff rollup line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffRow {
    pub staff_id: Uuid,
    pub total_services: i32,
    pub total_commission: Decimal,
    pub average_commission: Decimal,
}

/// Per-branch rollup line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchRow {
    pub branch_id: Uuid,
    pub total_services: i32,
    pub total_commission: Decimal,
    pub average_commission: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardReport {
    pub month: Month,
    pub total_commission: Decimal,
    pub pending_approval_count: u64,
    pub approved_unpaid_total: Decimal,
    pub top_staff: Vec<StaffRow>,
    pub branch_comparison: Vec<BranchRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchWiseReport {
    pub month: Month,
    pub branches: Vec<BranchRow>,
    pub grand_total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffWiseReport {
    pub month: Month,
    pub staff: Vec<StaffRow>,
    pub grand_total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendPoint {
    pub month: Month,
    pub total_services: i32,
    pub total_commission: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyTrendReport {
    pub year: i32,
    pub points: Vec<TrendPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarterlyReport {
    pub year: i32,
    pub quarter: u32,
    pub months: Vec<TrendPoint>,
    pub total_services: i32,
    pub total_commission: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearEndReport {
    pub year: i32,
    pub months: Vec<TrendPoint>,
    pub total_services: i32,
    pub total_commission: Decimal,
    pub best_month: Option<Month>,
}

#[derive(Clone)]
pub struct ReportService {
    db_pool: Arc<DbPool>,
    top_staff_limit: usize,
}

impl ReportService {
    pub fn new(db_pool: Arc<DbPool>, top_staff_limit: usize) -> Self {
        Self {
            db_pool,
            top_staff_limit,
        }
    }

    /// Dispatches a report request to the matching builder.
    pub async fn generate(&self, request: ReportRequest) -> Result<Report, ServiceError> {
        match request {
            ReportRequest::Dashboard => self.dashboard().await.map(Report::Dashboard),
            ReportRequest::BranchWise(month) => {
                self.branch_wise(month).await.map(Report::BranchWise)
            }
            ReportRequest::StaffWise(month) => self.staff_wise(month).await.map(Report::StaffWise),
            ReportRequest::MonthlyTrend { year } => {
                self.monthly_trend(year).await.map(Report::MonthlyTrend)
            }
            ReportRequest::Quarterly { year, quarter } => self
                .quarterly(year, quarter)
                .await
                .map(Report::Quarterly),
            ReportRequest::YearEnd { year } => self.year_end(year).await.map(Report::YearEnd),
        }
    }

    /// Current-month overview: totals, approval backlog, top earners and a
    /// branch comparison.
    #[instrument(skip(self))]
    pub async fn dashboard(&self) -> Result<DashboardReport, ServiceError> {
        let month = Month::current();
        let rows = self.month_rows(month).await?;

        // "Pending approval" is the payroll backlog: everything not yet
        // frozen, so PENDING and APPROVED both count.
        let mut pending_approval_count = 0u64;
        let mut approved_unpaid_total = Decimal::ZERO;
        for row in &rows {
            match parse_stored::<CommissionStatus>("status", &row.status)? {
                CommissionStatus::Pending => pending_approval_count += 1,
                CommissionStatus::Approved => {
                    pending_approval_count += 1;
                    approved_unpaid_total += row.amount;
                }
                _ => {}
            }
        }

        let mut top_staff = fold_by_staff(&rows);
        top_staff.truncate(self.top_staff_limit);

        Ok(DashboardReport {
            month,
            total_commission: rows.iter().map(|r| r.amount).sum(),
            pending_approval_count,
            approved_unpaid_total,
            top_staff,
            branch_comparison: fold_by_branch(&rows),
        })
    }

    /// One line per branch active in the month, highest total first.
    #[instrument(skip(self), fields(month = %month))]
    pub async fn branch_wise(&self, month: Month) -> Result<BranchWiseReport, ServiceError> {
        let rows = self.month_rows(month).await?;
        let branches = fold_by_branch(&rows);
        let grand_total = branches.iter().map(|b| b.total_commission).sum();
        Ok(BranchWiseReport {
            month,
            branches,
            grand_total,
        })
    }

    /// One line per staff member active in the month, highest total first.
    #[instrument(skip(self), fields(month = %month))]
    pub async fn staff_wise(&self, month: Month) -> Result<StaffWiseReport, ServiceError> {
        let rows = self.month_rows(month).await?;
        let staff = fold_by_staff(&rows);
        let grand_total = staff.iter().map(|s| s.total_commission).sum();
        Ok(StaffWiseReport {
            month,
            staff,
            grand_total,
        })
    }

    /// One point per calendar month of the named year, January first.
    #[instrument(skip(self))]
    pub async fn monthly_trend(&self, year: i32) -> Result<MonthlyTrendReport, ServiceError> {
        let mut points = Vec::with_capacity(12);
        for month in Month::year_months(year)? {
            points.push(self.month_point(month).await?);
        }
        Ok(MonthlyTrendReport { year, points })
    }

    /// The three months of a calendar quarter plus quarter totals.
    #[instrument(skip(self))]
    pub async fn quarterly(&self, year: i32, quarter: u32) -> Result<QuarterlyReport, ServiceError> {
        let mut months = Vec::with_capacity(3);
        for month in Month::quarter_months(year, quarter)? {
            months.push(self.month_point(month).await?);
        }
        let total_services = months.iter().map(|p| p.total_services).sum();
        let total_commission = months.iter().map(|p| p.total_commission).sum();
        Ok(QuarterlyReport {
            year,
            quarter,
            months,
            total_services,
            total_commission,
        })
    }

    /// Twelve monthly points plus year totals and the strongest month.
    #[instrument(skip(self))]
    pub async fn year_end(&self, year: i32) -> Result<YearEndReport, ServiceError> {
        let mut months = Vec::with_capacity(12);
        for month in Month::year_months(year)? {
            months.push(self.month_point(month).await?);
        }
        let total_services = months.iter().map(|p| p.total_services).sum();
        let total_commission: Decimal = months.iter().map(|p| p.total_commission).sum();
        let best_month = months
            .iter()
            .filter(|p| p.total_commission > Decimal::ZERO)
            .max_by_key(|p| p.total_commission)
            .map(|p| p.month);
        Ok(YearEndReport {
            year,
            months,
            total_services,
            total_commission,
            best_month,
        })
    }

    /// Non-reversed ledger rows whose calculation instant falls in the month.
    async fn month_rows(&self, month: Month) -> Result<Vec<CommissionModel>, ServiceError> {
        let db = &*self.db_pool;
        let rows = Commission::find()
            .filter(commission::Column::CalculatedOn.gte(month.start()))
            .filter(commission::Column::CalculatedOn.lt(month.end()))
            .filter(commission::Column::Status.ne(CommissionStatus::Reversed.to_string()))
            .all(db)
            .await?;
        Ok(rows)
    }

    async fn month_point(&self, month: Month) -> Result<TrendPoint, ServiceError> {
        let rows = self.month_rows(month).await?;
        Ok(TrendPoint {
            month,
            total_services: rows.len() as i32,
            total_commission: rows.iter().map(|r| r.amount).sum(),
        })
    }
}

fn rounded_average(total: Decimal, count: i32) -> Decimal {
    if count == 0 {
        Decimal::ZERO
    } else {
        (total / Decimal::from(count))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }
}

fn fold_by_staff(rows: &[CommissionModel]) -> Vec<StaffRow> {
    let mut acc: BTreeMap<Uuid, (i32, Decimal)> = BTreeMap::new();
    for row in rows {
        let entry = acc.entry(row.staff_id).or_insert((0, Decimal::ZERO));
        entry.0 += 1;
        entry.1 += row.amount;
    }
    let mut out: Vec<StaffRow> = acc
        .into_iter()
        .map(|(staff_id, (count, total))| StaffRow {
            staff_id,
            total_services: count,
            total_commission: total,
            average_commission: rounded_average(total, count),
        })
        .collect();
    out.sort_by(|a, b| b.total_commission.cmp(&a.total_commission));
    out
}

fn fold_by_branch(rows: &[CommissionModel]) -> Vec<BranchRow> {
    let mut acc: BTreeMap<Uuid, (i32, Decimal)> = BTreeMap::new();
    for row in rows {
        let entry = acc.entry(row.branch_id).or_insert((0, Decimal::ZERO));
        entry.0 += 1;
        entry.1 += row.amount;
    }
    let mut out: Vec<BranchRow> = acc
        .into_iter()
        .map(|(branch_id, (count, total))| BranchRow {
            branch_id,
            total_services: count,
            total_commission: total,
            average_commission: rounded_average(total, count),
        })
        .collect();
    out.sort_by(|a, b| b.total_commission.cmp(&a.total_commission));
    out
}
