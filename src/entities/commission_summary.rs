use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Materialized monthly rollup for one (staff, branch, month) scope.
/// Derived and regenerable; the commission ledger remains the source of
/// truth. Unique on (staff_id, branch_id, month).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "commission_summary")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub staff_id: Uuid,
    pub branch_id: Uuid,
    /// Calendar month scope, `YYYY-MM`.
    pub month: String,

    pub total_services: i32,
    pub total_commission: Decimal,
    /// `total_commission / total_services`; zero for an empty scope.
    pub average_commission: Decimal,

    /// Wire form of `models::SummaryStatus`.
    pub status: String,
    pub generated_at: DateTime<Utc>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub locked_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {}
