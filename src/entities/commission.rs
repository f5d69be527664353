use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One ledger row per (appointment, service, staff) triple. The identity and
/// calculation-time fields are immutable after insert; `amount`, `status` and
/// the audit timestamps change only through the commission service.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "commission")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub staff_id: Uuid,
    pub branch_id: Uuid,
    pub appointment_id: Uuid,
    pub service_id: Uuid,

    /// Wire form of `models::CommissionType`.
    pub commission_type: String,
    pub rate: Decimal,
    /// Service price / eligible amount captured at calculation time.
    pub base_amount: Decimal,
    /// Current effective payable amount.
    pub amount: Decimal,

    /// Wire form of `models::CommissionStatus`.
    pub status: String,
    pub calculated_on: DateTime<Utc>,

    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub locked_at: Option<DateTime<Utc>>,
    pub reversed_at: Option<DateTime<Utc>>,
    /// Set once the amount has been manually adjusted.
    pub is_manual: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::commission_adjustment::Entity")]
    Adjustments,
}

impl Related<super::commission_adjustment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Adjustments.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {}
