use crate::{
    db::DbPool,
    entities::commission::{self, Entity as Commission, Model as CommissionModel},
    entities::commission_summary::{
        self, ActiveModel as SummaryActiveModel, Entity as CommissionSummary,
        Model as SummaryModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    models::{parse_stored, CommissionStatus, Month, SummaryStatus},
};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub id: Uuid,
    pub staff_id: Uuid,
    pub branch_id: Uuid,
    pub month: Month,
    pub total_services: i32,
    pub total_commission: Decimal,
    pub average_commission_per_service: Decimal,
    pub status: SummaryStatus,
    pub generated_at: DateTime<Utc>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub locked_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryListResponse {
    pub summaries: Vec<SummaryResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Optional filters for summary listing.
#[derive(Debug, Clone, Default)]
pub struct SummaryFilter {
    pub staff_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub status: Option<SummaryStatus>,
    pub month: Option<Month>,
}

/// Totals derived from a scope snapshot. A pure function of the rows, so
/// regeneration over an unchanged scope is byte-identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScopeTotals {
    pub total_services: i32,
    pub total_commission: Decimal,
    pub average_commission: Decimal,
}

pub(crate) fn compute_totals(scope: &[CommissionModel]) -> ScopeTotals {
    let total_services = scope.len() as i32;
    let total_commission: Decimal = scope.iter().map(|c| c.amount).sum();
    let average_commission = if total_services == 0 {
        Decimal::ZERO
    } else {
        (total_commission / Decimal::from(total_services))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    };
    ScopeTotals {
        total_services,
        total_commission,
        average_commission,
    }
}

/// Aggregation engine: materializes per-(staff, branch, month) rollups and
/// drives their independent approval lifecycle.
#[derive(Clone)]
pub struct CommissionSummaryService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl CommissionSummaryService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Generates (or regenerates) the summary for one scope.
    ///
    /// Runs in a single transaction: the scope snapshot and the upsert commit
    /// together, and no per-commission locks are held. Regenerating a LOCKED
    /// summary is refused; regenerating a PENDING or APPROVED one overwrites
    /// the totals and resets the row to PENDING, since the new aggregate has
    /// not been re-approved.
    #[instrument(skip(self), fields(staff_id = %staff_id, branch_id = %branch_id, month = %month))]
    pub async fn generate_summary(
        &self,
        staff_id: Uuid,
        branch_id: Uuid,
        month: Month,
    ) -> Result<SummaryResponse, ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await?;

        let scope = Commission::find()
            .filter(commission::Column::StaffId.eq(staff_id))
            .filter(commission::Column::BranchId.eq(branch_id))
            .filter(commission::Column::CalculatedOn.gte(month.start()))
            .filter(commission::Column::CalculatedOn.lt(month.end()))
            .filter(commission::Column::Status.ne(CommissionStatus::Reversed.to_string()))
            .all(&txn)
            .await?;
        let totals = compute_totals(&scope);

        let existing = CommissionSummary::find()
            .filter(commission_summary::Column::StaffId.eq(staff_id))
            .filter(commission_summary::Column::BranchId.eq(branch_id))
            .filter(commission_summary::Column::Month.eq(month.to_string()))
            .one(&txn)
            .await?;

        let now = Utc::now();
        let model = match existing {
            Some(current) => {
                let status: SummaryStatus = parse_stored("status", &current.status)?;
                if status.is_terminal() {
                    return Err(ServiceError::InvalidStateTransition(format!(
                        "summary for {}/{} in {} is locked and cannot be regenerated",
                        staff_id, branch_id, month
                    )));
                }
                let summary_id = current.id;
                let version = current.version;
                // Compare-and-swap on the version read above: a row that
                // moved underneath us (approved or regenerated on another
                // connection) must not be silently overwritten.
                let updated = CommissionSummary::update_many()
                    .col_expr(
                        commission_summary::Column::TotalServices,
                        Expr::value(totals.total_services),
                    )
                    .col_expr(
                        commission_summary::Column::TotalCommission,
                        Expr::value(totals.total_commission),
                    )
                    .col_expr(
                        commission_summary::Column::AverageCommission,
                        Expr::value(totals.average_commission),
                    )
                    .col_expr(
                        commission_summary::Column::Status,
                        Expr::value(SummaryStatus::Pending.to_string()),
                    )
                    .col_expr(commission_summary::Column::GeneratedAt, Expr::value(now))
                    .col_expr(
                        commission_summary::Column::ApprovedBy,
                        Expr::value(Option::<Uuid>::None),
                    )
                    .col_expr(
                        commission_summary::Column::ApprovedAt,
                        Expr::value(Option::<DateTime<Utc>>::None),
                    )
                    .col_expr(commission_summary::Column::Version, Expr::value(version + 1))
                    .filter(commission_summary::Column::Id.eq(summary_id))
                    .filter(commission_summary::Column::Version.eq(version))
                    .exec(&txn)
                    .await?;
                if updated.rows_affected == 0 {
                    return Err(ServiceError::ConcurrentModification(summary_id));
                }
                CommissionSummary::find_by_id(summary_id)
                    .one(&txn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::InternalError(format!(
                            "summary {} vanished mid-update",
                            summary_id
                        ))
                    })?
            }
            None => {
                let active = SummaryActiveModel {
                    id: Set(Uuid::new_v4()),
                    staff_id: Set(staff_id),
                    branch_id: Set(branch_id),
                    month: Set(month.to_string()),
                    total_services: Set(totals.total_services),
                    total_commission: Set(totals.total_commission),
                    average_commission: Set(totals.average_commission),
                    status: Set(SummaryStatus::Pending.to_string()),
                    generated_at: Set(now),
                    approved_by: Set(None),
                    approved_at: Set(None),
                    locked_at: Set(None),
                    created_at: Set(now),
                    version: Set(1),
                };
                active.insert(&txn).await?
            }
        };

        txn.commit().await?;

        info!(
            summary_id = %model.id,
            total_services = totals.total_services,
            total_commission = %totals.total_commission,
            "summary generated"
        );

        self.emit(Event::SummaryGenerated {
            summary_id: model.id,
            staff_id,
            branch_id,
            month: month.to_string(),
            total_commission: totals.total_commission,
        })
        .await;

        model_to_response(model)
    }

    /// Generates summaries for every (staff, branch) scope with ledger
    /// activity in the month. Returns the generated summaries.
    #[instrument(skip(self), fields(month = %month))]
    pub async fn generate_summaries_for_month(
        &self,
        month: Month,
    ) -> Result<Vec<SummaryResponse>, ServiceError> {
        let db = &*self.db_pool;

        let scopes: Vec<(Uuid, Uuid)> = Commission::find()
            .select_only()
            .column(commission::Column::StaffId)
            .column(commission::Column::BranchId)
            .distinct()
            .filter(commission::Column::CalculatedOn.gte(month.start()))
            .filter(commission::Column::CalculatedOn.lt(month.end()))
            .into_tuple()
            .all(db)
            .await?;

        let mut summaries = Vec::with_capacity(scopes.len());
        for (staff_id, branch_id) in scopes {
            match self.generate_summary(staff_id, branch_id, month).await {
                Ok(summary) => summaries.push(summary),
                // A locked summary stays as-is; month-wide generation skips it.
                Err(ServiceError::InvalidStateTransition(msg)) => {
                    warn!(staff_id = %staff_id, branch_id = %branch_id, "{}", msg);
                }
                Err(other) => return Err(other),
            }
        }

        info!(month = %month, generated = summaries.len(), "month-wide summary generation complete");
        Ok(summaries)
    }

    /// Retrieves a summary by id.
    #[instrument(skip(self), fields(summary_id = %summary_id))]
    pub async fn get_summary(&self, summary_id: Uuid) -> Result<SummaryResponse, ServiceError> {
        let db = &*self.db_pool;
        let model = CommissionSummary::find_by_id(summary_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("summary {} not found", summary_id)))?;
        model_to_response(model)
    }

    /// Lists summaries matching the filter.
    #[instrument(skip(self, filter))]
    pub async fn list_summaries(
        &self,
        filter: SummaryFilter,
        page: u64,
        per_page: u64,
    ) -> Result<SummaryListResponse, ServiceError> {
        let db = &*self.db_pool;

        let mut query = CommissionSummary::find();
        if let Some(staff_id) = filter.staff_id {
            query = query.filter(commission_summary::Column::StaffId.eq(staff_id));
        }
        if let Some(branch_id) = filter.branch_id {
            query = query.filter(commission_summary::Column::BranchId.eq(branch_id));
        }
        if let Some(status) = filter.status {
            query = query.filter(commission_summary::Column::Status.eq(status.to_string()));
        }
        if let Some(month) = filter.month {
            query = query.filter(commission_summary::Column::Month.eq(month.to_string()));
        }

        let paginator = query
            .order_by_desc(commission_summary::Column::Month)
            .paginate(db, per_page.max(1));
        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(page.saturating_sub(1)).await?;

        let summaries = models
            .into_iter()
            .map(model_to_response)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SummaryListResponse {
            summaries,
            total,
            page,
            per_page,
        })
    }

    /// Approves a PENDING summary.
    #[instrument(skip(self), fields(summary_id = %summary_id))]
    pub async fn approve_summary(
        &self,
        summary_id: Uuid,
        approved_by: Option<Uuid>,
    ) -> Result<SummaryResponse, ServiceError> {
        self.transition_summary(summary_id, "approve", SummaryStatus::Approved, approved_by)
            .await
    }

    /// Locks an APPROVED summary. Constituent commissions are not affected:
    /// summary locking is a business decision, not a cascading one.
    #[instrument(skip(self), fields(summary_id = %summary_id))]
    pub async fn lock_summary(&self, summary_id: Uuid) -> Result<SummaryResponse, ServiceError> {
        self.transition_summary(summary_id, "lock", SummaryStatus::Locked, None)
            .await
    }

    /// Approves every PENDING summary for the month. Returns how many rows
    /// were approved.
    #[instrument(skip(self), fields(month = %month))]
    pub async fn approve_all_for_month(
        &self,
        month: Month,
        approved_by: Option<Uuid>,
    ) -> Result<u64, ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await?;

        let pending = CommissionSummary::find()
            .filter(commission_summary::Column::Month.eq(month.to_string()))
            .filter(commission_summary::Column::Status.eq(SummaryStatus::Pending.to_string()))
            .all(&txn)
            .await?;

        let now = Utc::now();
        let mut approved = 0u64;
        for model in pending {
            let version = model.version;
            let mut active: SummaryActiveModel = model.into();
            active.status = Set(SummaryStatus::Approved.to_string());
            active.approved_by = Set(approved_by);
            active.approved_at = Set(Some(now));
            active.version = Set(version + 1);
            active.update(&txn).await?;
            approved += 1;
        }

        txn.commit().await?;
        info!(month = %month, approved, "approved all pending summaries for month");
        Ok(approved)
    }

    /// Locks every APPROVED summary for the month; PENDING rows are left
    /// untouched. Returns how many rows were locked.
    #[instrument(skip(self), fields(month = %month))]
    pub async fn lock_all_for_month(&self, month: Month) -> Result<u64, ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await?;

        let approved = CommissionSummary::find()
            .filter(commission_summary::Column::Month.eq(month.to_string()))
            .filter(commission_summary::Column::Status.eq(SummaryStatus::Approved.to_string()))
            .all(&txn)
            .await?;

        let now = Utc::now();
        let mut locked = 0u64;
        for model in approved {
            let version = model.version;
            let mut active: SummaryActiveModel = model.into();
            active.status = Set(SummaryStatus::Locked.to_string());
            active.locked_at = Set(Some(now));
            active.version = Set(version + 1);
            active.update(&txn).await?;
            locked += 1;
        }

        txn.commit().await?;
        info!(month = %month, locked, "locked all approved summaries for month");
        Ok(locked)
    }

    async fn transition_summary(
        &self,
        summary_id: Uuid,
        command: &'static str,
        target: SummaryStatus,
        approved_by: Option<Uuid>,
    ) -> Result<SummaryResponse, ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await?;

        let model = CommissionSummary::find_by_id(summary_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("summary {} not found", summary_id)))?;

        let status: SummaryStatus = parse_stored("status", &model.status)?;
        if !status.can_transition_to(target) {
            return Err(ServiceError::InvalidStateTransition(format!(
                "cannot {} summary {} in status {}",
                command, summary_id, status
            )));
        }

        let now = Utc::now();
        let version = model.version;
        let mut update = CommissionSummary::update_many()
            .col_expr(commission_summary::Column::Status, Expr::value(target.to_string()))
            .col_expr(commission_summary::Column::Version, Expr::value(version + 1));
        match target {
            SummaryStatus::Approved => {
                update = update
                    .col_expr(commission_summary::Column::ApprovedBy, Expr::value(approved_by))
                    .col_expr(commission_summary::Column::ApprovedAt, Expr::value(Some(now)));
            }
            SummaryStatus::Locked => {
                update = update
                    .col_expr(commission_summary::Column::LockedAt, Expr::value(Some(now)));
            }
            SummaryStatus::Pending => {}
        }
        // Version compare guards against a regeneration or competing
        // transition committing between the read above and this write.
        let result = update
            .filter(commission_summary::Column::Id.eq(summary_id))
            .filter(commission_summary::Column::Version.eq(version))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(summary_id));
        }
        let updated = CommissionSummary::find_by_id(summary_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!("summary {} vanished mid-update", summary_id))
            })?;

        txn.commit().await?;

        info!(summary_id = %summary_id, from = %status, to = %target, "summary state transition");

        let event = match target {
            SummaryStatus::Approved => Some(Event::SummaryApproved(summary_id)),
            SummaryStatus::Locked => Some(Event::SummaryLocked(summary_id)),
            SummaryStatus::Pending => None,
        };
        if let Some(event) = event {
            self.emit(event).await;
        }

        model_to_response(updated)
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, "failed to send summary event");
            }
        }
    }
}

fn model_to_response(model: SummaryModel) -> Result<SummaryResponse, ServiceError> {
    let month: Month = model
        .month
        .parse()
        .map_err(|_| ServiceError::InternalError(format!("corrupt month value '{}'", model.month)))?;
    Ok(SummaryResponse {
        id: model.id,
        staff_id: model.staff_id,
        branch_id: model.branch_id,
        month,
        total_services: model.total_services,
        total_commission: model.total_commission,
        average_commission_per_service: model.average_commission,
        status: parse_stored("status", &model.status)?,
        generated_at: model.generated_at,
        approved_by: model.approved_by,
        approved_at: model.approved_at,
        locked_at: model.locked_at,
        version: model.version,
    })
}
