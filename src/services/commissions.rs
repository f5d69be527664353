use crate::{
    db::DbPool,
    entities::commission::{
        self, ActiveModel as CommissionActiveModel, Entity as Commission, Model as CommissionModel,
    },
    entities::commission_adjustment::{
        self, ActiveModel as AdjustmentActiveModel, Entity as CommissionAdjustment,
        Model as AdjustmentModel,
    },
    entities::commission_summary::{self, Entity as CommissionSummary},
    errors::ServiceError,
    events::{Event, EventSender},
    models::{parse_stored, AdjustmentType, CommissionStatus, CommissionType, Month, SummaryStatus},
    services::locks::CommissionLockRegistry,
};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

lazy_static! {
    static ref COMMISSIONS_CREATED: IntCounter = prometheus::register_int_counter!(
        "commission_created_total",
        "Total number of commissions created"
    )
    .expect("metric can be registered");
    static ref COMMISSION_TRANSITIONS: IntCounterVec = prometheus::register_int_counter_vec!(
        "commission_transitions_total",
        "Total number of successful commission state transitions",
        &["command"]
    )
    .expect("metric can be registered");
    static ref COMMISSION_TRANSITION_FAILURES: IntCounterVec =
        prometheus::register_int_counter_vec!(
            "commission_transition_failures_total",
            "Total number of failed commission state transitions",
            &["command", "error_type"]
        )
        .expect("metric can be registered");
    static ref COMMISSION_ADJUSTMENTS: IntCounter = prometheus::register_int_counter!(
        "commission_adjustments_total",
        "Total number of commission amount adjustments"
    )
    .expect("metric can be registered");
}

/// Appointment/billing completion event payload that opens a commission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCommissionRequest {
    pub staff_id: Uuid,
    pub branch_id: Uuid,
    pub appointment_id: Uuid,
    pub service_id: Uuid,
    pub base_amount: Decimal,
    pub rate: Decimal,
    pub commission_type: CommissionType,
}

impl CreateCommissionRequest {
    fn validate(&self) -> Result<(), ServiceError> {
        if self.base_amount < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "base_amount must not be negative".to_string(),
            ));
        }
        if self.rate < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "rate must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Amount adjustment command.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AdjustCommissionRequest {
    pub new_amount: Decimal,
    #[validate(length(min = 1, message = "reason must not be empty"))]
    pub reason: String,
    pub adjustment_type: AdjustmentType,
    pub applied_by: Uuid,
    /// Optional optimistic version check; mismatch fails with
    /// `ConcurrentModification`.
    pub version: Option<i32>,
}

impl AdjustCommissionRequest {
    fn check(&self) -> Result<(), ServiceError> {
        Validate::validate(self)?;
        if self.new_amount < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "new_amount must not be negative".to_string(),
            ));
        }
        if self.reason.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "reason must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionResponse {
    pub id: Uuid,
    pub staff_id: Uuid,
    pub branch_id: Uuid,
    pub appointment_id: Uuid,
    pub service_id: Uuid,
    pub commission_type: CommissionType,
    pub rate: Decimal,
    pub base_amount: Decimal,
    pub amount: Decimal,
    pub status: CommissionStatus,
    pub calculated_on: DateTime<Utc>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub locked_at: Option<DateTime<Utc>>,
    pub reversed_at: Option<DateTime<Utc>>,
    pub is_manual: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommissionListResponse {
    pub commissions: Vec<CommissionResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentResponse {
    pub id: Uuid,
    pub commission_id: Uuid,
    pub sequence: i32,
    pub previous_amount: Decimal,
    pub new_amount: Decimal,
    pub reason: String,
    pub adjustment_type: AdjustmentType,
    pub applied_by: Uuid,
    pub applied_at: DateTime<Utc>,
}

/// Optional filters for commission listing.
#[derive(Debug, Clone, Default)]
pub struct CommissionFilter {
    pub staff_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub status: Option<CommissionStatus>,
    pub calculated_from: Option<DateTime<Utc>>,
    pub calculated_to: Option<DateTime<Utc>>,
}

/// Ledger service: creation, lifecycle transitions and audited adjustments.
#[derive(Clone)]
pub struct CommissionService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    locks: Arc<CommissionLockRegistry>,
    lock_wait: Duration,
}

impl CommissionService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Option<Arc<EventSender>>,
        locks: Arc<CommissionLockRegistry>,
        lock_wait: Duration,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            locks,
            lock_wait,
        }
    }

    /// Creates a PENDING commission from a completed service.
    #[instrument(skip(self, request), fields(staff_id = %request.staff_id, branch_id = %request.branch_id))]
    pub async fn create_commission(
        &self,
        request: CreateCommissionRequest,
    ) -> Result<CommissionResponse, ServiceError> {
        request.validate()?;

        let db = &*self.db_pool;
        let now = Utc::now();
        let commission_id = Uuid::new_v4();
        let amount = request
            .commission_type
            .compute_amount(request.base_amount, request.rate);

        let active = CommissionActiveModel {
            id: Set(commission_id),
            staff_id: Set(request.staff_id),
            branch_id: Set(request.branch_id),
            appointment_id: Set(request.appointment_id),
            service_id: Set(request.service_id),
            commission_type: Set(request.commission_type.to_string()),
            rate: Set(request.rate),
            base_amount: Set(request.base_amount),
            amount: Set(amount),
            status: Set(CommissionStatus::Pending.to_string()),
            calculated_on: Set(now),
            approved_by: Set(None),
            approved_at: Set(None),
            locked_at: Set(None),
            reversed_at: Set(None),
            is_manual: Set(false),
            created_at: Set(now),
            updated_at: Set(Some(now)),
            version: Set(1),
        };

        let model = active.insert(db).await.map_err(|e| {
            error!(error = %e, commission_id = %commission_id, "failed to insert commission");
            ServiceError::DatabaseError(e)
        })?;

        COMMISSIONS_CREATED.inc();
        info!(commission_id = %commission_id, amount = %amount, "commission created");

        self.emit(Event::CommissionCreated {
            commission_id,
            staff_id: request.staff_id,
            branch_id: request.branch_id,
            amount,
        })
        .await;

        model_to_response(model)
    }

    /// Retrieves a commission by id.
    #[instrument(skip(self), fields(commission_id = %commission_id))]
    pub async fn get_commission(
        &self,
        commission_id: Uuid,
    ) -> Result<CommissionResponse, ServiceError> {
        let db = &*self.db_pool;
        let model = Commission::find_by_id(commission_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("commission {} not found", commission_id))
            })?;
        model_to_response(model)
    }

    /// Lists commissions matching the filter, newest first.
    #[instrument(skip(self, filter))]
    pub async fn list_commissions(
        &self,
        filter: CommissionFilter,
        page: u64,
        per_page: u64,
    ) -> Result<CommissionListResponse, ServiceError> {
        let db = &*self.db_pool;

        let mut query = Commission::find();
        if let Some(staff_id) = filter.staff_id {
            query = query.filter(commission::Column::StaffId.eq(staff_id));
        }
        if let Some(branch_id) = filter.branch_id {
            query = query.filter(commission::Column::BranchId.eq(branch_id));
        }
        if let Some(status) = filter.status {
            query = query.filter(commission::Column::Status.eq(status.to_string()));
        }
        if let Some(from) = filter.calculated_from {
            query = query.filter(commission::Column::CalculatedOn.gte(from));
        }
        if let Some(to) = filter.calculated_to {
            query = query.filter(commission::Column::CalculatedOn.lt(to));
        }

        let paginator = query
            .order_by_desc(commission::Column::CalculatedOn)
            .paginate(db, per_page.max(1));
        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(page.saturating_sub(1)).await?;

        let commissions = models
            .into_iter()
            .map(model_to_response)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CommissionListResponse {
            commissions,
            total,
            page,
            per_page,
        })
    }

    /// Approves a PENDING commission. The amount is not changed.
    #[instrument(skip(self), fields(commission_id = %commission_id))]
    pub async fn approve_commission(
        &self,
        commission_id: Uuid,
        approved_by: Option<Uuid>,
        expected_version: Option<i32>,
    ) -> Result<CommissionResponse, ServiceError> {
        self.transition(
            commission_id,
            "approve",
            CommissionStatus::Approved,
            approved_by,
            expected_version,
        )
        .await
    }

    /// Locks an APPROVED commission for payroll; the amount is frozen.
    #[instrument(skip(self), fields(commission_id = %commission_id))]
    pub async fn lock_commission(
        &self,
        commission_id: Uuid,
        expected_version: Option<i32>,
    ) -> Result<CommissionResponse, ServiceError> {
        self.transition(
            commission_id,
            "lock",
            CommissionStatus::Locked,
            None,
            expected_version,
        )
        .await
    }

    /// Reverses a PENDING or APPROVED commission. The record stays queryable
    /// for audit but is excluded from all future summary totals.
    #[instrument(skip(self, reason), fields(commission_id = %commission_id))]
    pub async fn reverse_commission(
        &self,
        commission_id: Uuid,
        reason: Option<String>,
        expected_version: Option<i32>,
    ) -> Result<CommissionResponse, ServiceError> {
        if let Some(reason) = &reason {
            info!(commission_id = %commission_id, reason = %reason, "commission reversal requested");
        }
        self.transition(
            commission_id,
            "reverse",
            CommissionStatus::Reversed,
            None,
            expected_version,
        )
        .await
    }

    /// Applies an audited amount adjustment. Approval state is not changed:
    /// adjustment and approval are orthogonal.
    #[instrument(skip(self, request), fields(commission_id = %commission_id, new_amount = %request.new_amount))]
    pub async fn adjust_commission(
        &self,
        commission_id: Uuid,
        request: AdjustCommissionRequest,
    ) -> Result<CommissionResponse, ServiceError> {
        // Input validation happens before any state is touched.
        request.check()?;

        let _guard = self.locks.acquire(commission_id, self.lock_wait).await?;
        let db = &*self.db_pool;
        let txn = db.begin().await?;

        let model = Commission::find_by_id(commission_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("commission {} not found", commission_id))
            })?;

        if let Some(expected) = request.version {
            if model.version != expected {
                warn!(commission_id = %commission_id, "concurrent modification detected during adjust");
                return Err(ServiceError::ConcurrentModification(commission_id));
            }
        }

        let status: CommissionStatus = parse_stored("status", &model.status)?;
        if !status.is_adjustable() {
            COMMISSION_TRANSITION_FAILURES
                .with_label_values(&["adjust", "state"])
                .inc();
            return Err(ServiceError::AdjustmentRejected(format!(
                "commission {} is {} and cannot be adjusted",
                commission_id, status
            )));
        }

        let now = Utc::now();
        let previous_amount = model.amount;
        let sequence = CommissionAdjustment::find()
            .filter(commission_adjustment::Column::CommissionId.eq(commission_id))
            .count(&txn)
            .await? as i32
            + 1;

        let adjustment = AdjustmentActiveModel {
            id: Set(Uuid::new_v4()),
            commission_id: Set(commission_id),
            sequence: Set(sequence),
            previous_amount: Set(previous_amount),
            new_amount: Set(request.new_amount),
            reason: Set(request.reason.clone()),
            adjustment_type: Set(request.adjustment_type.to_string()),
            applied_by: Set(request.applied_by),
            applied_at: Set(now),
        };
        adjustment.insert(&txn).await?;

        let staff_id = model.staff_id;
        let branch_id = model.branch_id;
        let calculated_on = model.calculated_on;
        let version = model.version;

        let mut active: CommissionActiveModel = model.into();
        active.amount = Set(request.new_amount);
        active.is_manual = Set(true);
        active.updated_at = Set(Some(now));
        active.version = Set(version + 1);
        let updated = active.update(&txn).await?;

        invalidate_summary(&txn, staff_id, branch_id, calculated_on).await?;

        txn.commit().await?;

        COMMISSION_ADJUSTMENTS.inc();
        info!(
            commission_id = %commission_id,
            previous_amount = %previous_amount,
            new_amount = %request.new_amount,
            adjustment_type = %request.adjustment_type,
            "commission adjusted"
        );

        self.emit(Event::CommissionAdjusted {
            commission_id,
            previous_amount,
            new_amount: request.new_amount,
        })
        .await;

        model_to_response(updated)
    }

    /// Returns the ordered adjustment trail for a commission.
    #[instrument(skip(self), fields(commission_id = %commission_id))]
    pub async fn adjustment_history(
        &self,
        commission_id: Uuid,
    ) -> Result<Vec<AdjustmentResponse>, ServiceError> {
        let db = &*self.db_pool;

        // Distinguish "no adjustments" from "no such commission".
        Commission::find_by_id(commission_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("commission {} not found", commission_id))
            })?;

        let entries = CommissionAdjustment::find()
            .filter(commission_adjustment::Column::CommissionId.eq(commission_id))
            .order_by_asc(commission_adjustment::Column::Sequence)
            .all(db)
            .await?;

        entries.into_iter().map(adjustment_to_response).collect()
    }

    async fn transition(
        &self,
        commission_id: Uuid,
        command: &'static str,
        target: CommissionStatus,
        approved_by: Option<Uuid>,
        expected_version: Option<i32>,
    ) -> Result<CommissionResponse, ServiceError> {
        let _guard = self.locks.acquire(commission_id, self.lock_wait).await?;
        let db = &*self.db_pool;
        let txn = db.begin().await?;

        let model = Commission::find_by_id(commission_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("commission {} not found", commission_id))
            })?;

        if let Some(expected) = expected_version {
            if model.version != expected {
                COMMISSION_TRANSITION_FAILURES
                    .with_label_values(&[command, "concurrent_modification"])
                    .inc();
                warn!(commission_id = %commission_id, "concurrent modification detected during {}", command);
                return Err(ServiceError::ConcurrentModification(commission_id));
            }
        }

        let status: CommissionStatus = parse_stored("status", &model.status)?;
        if !status.can_transition_to(target) {
            COMMISSION_TRANSITION_FAILURES
                .with_label_values(&[command, "invalid_state"])
                .inc();
            return Err(ServiceError::InvalidStateTransition(format!(
                "cannot {} commission {} in status {}",
                command, commission_id, status
            )));
        }

        let now = Utc::now();
        let staff_id = model.staff_id;
        let branch_id = model.branch_id;
        let calculated_on = model.calculated_on;
        let version = model.version;

        let mut active: CommissionActiveModel = model.into();
        active.status = Set(target.to_string());
        active.updated_at = Set(Some(now));
        active.version = Set(version + 1);
        match target {
            CommissionStatus::Approved => {
                active.approved_by = Set(approved_by);
                active.approved_at = Set(Some(now));
            }
            CommissionStatus::Locked => {
                active.locked_at = Set(Some(now));
            }
            CommissionStatus::Reversed => {
                active.reversed_at = Set(Some(now));
            }
            CommissionStatus::Pending => {}
        }
        let updated = active.update(&txn).await?;

        // A reversal changes the scope's payable total, so any summary that
        // is not yet locked over this scope is stale.
        if target == CommissionStatus::Reversed {
            invalidate_summary(&txn, staff_id, branch_id, calculated_on).await?;
        }

        txn.commit().await?;

        COMMISSION_TRANSITIONS.with_label_values(&[command]).inc();
        info!(
            commission_id = %commission_id,
            from = %status,
            to = %target,
            "commission state transition"
        );

        let event = match target {
            CommissionStatus::Approved => Some(Event::CommissionApproved(commission_id)),
            CommissionStatus::Locked => Some(Event::CommissionLocked(commission_id)),
            CommissionStatus::Reversed => Some(Event::CommissionReversed(commission_id)),
            CommissionStatus::Pending => None,
        };
        if let Some(event) = event {
            self.emit(event).await;
        }

        model_to_response(updated)
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, "failed to send commission event");
            }
        }
    }
}

/// Deletes the not-yet-locked summary covering the commission's scope.
/// Runs inside the mutating transaction so ledger change and cache
/// invalidation commit atomically.
async fn invalidate_summary<C: ConnectionTrait>(
    txn: &C,
    staff_id: Uuid,
    branch_id: Uuid,
    calculated_on: DateTime<Utc>,
) -> Result<(), ServiceError> {
    let month = Month::of(calculated_on).to_string();
    CommissionSummary::delete_many()
        .filter(commission_summary::Column::StaffId.eq(staff_id))
        .filter(commission_summary::Column::BranchId.eq(branch_id))
        .filter(commission_summary::Column::Month.eq(month))
        .filter(commission_summary::Column::Status.ne(SummaryStatus::Locked.to_string()))
        .exec(txn)
        .await?;
    Ok(())
}

fn model_to_response(model: CommissionModel) -> Result<CommissionResponse, ServiceError> {
    Ok(CommissionResponse {
        id: model.id,
        staff_id: model.staff_id,
        branch_id: model.branch_id,
        appointment_id: model.appointment_id,
        service_id: model.service_id,
        commission_type: parse_stored("commission_type", &model.commission_type)?,
        rate: model.rate,
        base_amount: model.base_amount,
        amount: model.amount,
        status: parse_stored("status", &model.status)?,
        calculated_on: model.calculated_on,
        approved_by: model.approved_by,
        approved_at: model.approved_at,
        locked_at: model.locked_at,
        reversed_at: model.reversed_at,
        is_manual: model.is_manual,
        created_at: model.created_at,
        updated_at: model.updated_at,
        version: model.version,
    })
}

fn adjustment_to_response(model: AdjustmentModel) -> Result<AdjustmentResponse, ServiceError> {
    Ok(AdjustmentResponse {
        id: model.id,
        commission_id: model.commission_id,
        sequence: model.sequence,
        previous_amount: model.previous_amount,
        new_amount: model.new_amount,
        reason: model.reason,
        adjustment_type: parse_stored("adjustment_type", &model.adjustment_type)?,
        applied_by: model.applied_by,
        applied_at: model.applied_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn sample_model(status: &str) -> CommissionModel {
        let now = Utc::now();
        CommissionModel {
            id: Uuid::new_v4(),
            staff_id: Uuid::new_v4(),
            branch_id: Uuid::new_v4(),
            appointment_id: Uuid::new_v4(),
            service_id: Uuid::new_v4(),
            commission_type: "PERCENTAGE".to_string(),
            rate: dec!(10),
            base_amount: dec!(1000),
            amount: dec!(100.00),
            status: status.to_string(),
            calculated_on: now,
            approved_by: None,
            approved_at: None,
            locked_at: None,
            reversed_at: None,
            is_manual: false,
            created_at: now,
            updated_at: Some(now),
            version: 1,
        }
    }

    #[test]
    fn model_to_response_parses_closed_enums() {
        let response = model_to_response(sample_model("PENDING")).unwrap();
        assert_eq!(response.status, CommissionStatus::Pending);
        assert_eq!(response.commission_type, CommissionType::Percentage);
        assert_eq!(response.amount, dec!(100.00));
    }

    #[test]
    fn corrupt_status_surfaces_internal_error() {
        let err = model_to_response(sample_model("PAID")).unwrap_err();
        assert_matches!(err, ServiceError::InternalError(_));
    }

    #[test]
    fn create_request_rejects_negative_amounts() {
        let request = CreateCommissionRequest {
            staff_id: Uuid::new_v4(),
            branch_id: Uuid::new_v4(),
            appointment_id: Uuid::new_v4(),
            service_id: Uuid::new_v4(),
            base_amount: dec!(-1),
            rate: dec!(10),
            commission_type: CommissionType::Percentage,
        };
        assert_matches!(request.validate(), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn adjust_request_rejects_blank_reason() {
        let request = AdjustCommissionRequest {
            new_amount: dec!(50),
            reason: "   ".to_string(),
            adjustment_type: AdjustmentType::Correction,
            applied_by: Uuid::new_v4(),
            version: None,
        };
        assert_matches!(request.check(), Err(ServiceError::ValidationError(_)));

        let empty = AdjustCommissionRequest {
            reason: String::new(),
            ..request
        };
        assert_matches!(empty.check(), Err(ServiceError::ValidationError(_)));
    }
}
