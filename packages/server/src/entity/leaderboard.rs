use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Describes which metrics a leaderboard displays.
///
/// `schema` holds `{"labels": [..], "default_order_by": ".."}`.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "leaderboard")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(column_type = "JsonBinary")]
    pub schema: Json,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
