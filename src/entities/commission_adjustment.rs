use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable audit entry for one amount change. Rows are append-only: never
/// updated, never deleted. `sequence` is assigned under the per-commission
/// lock, so replaying entries in sequence order from the originally calculated
/// amount reconstructs the current amount exactly.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "commission_adjustment")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub commission_id: Uuid,
    /// 1-based position in the commission's adjustment trail.
    pub sequence: i32,

    pub previous_amount: Decimal,
    pub new_amount: Decimal,
    pub reason: String,
    /// Wire form of `models::AdjustmentType`.
    pub adjustment_type: String,

    pub applied_by: Uuid,
    pub applied_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::commission::Entity",
        from = "Column::CommissionId",
        to = "super::commission::Column::Id"
    )]
    Commission,
}

impl Related<super::commission::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Commission.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {}
