use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// An email address on file for a user. Only verified addresses satisfy the
/// verified-email gate.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "email_address")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub user_id: i32,
    #[sea_orm(belongs_to, from = "user_id", to = "id")]
    pub user: HasOne<super::user::Entity>,

    #[sea_orm(unique)]
    pub email: String,

    #[sea_orm(default_value = false)]
    pub verified: bool,
    #[sea_orm(default_value = false)]
    pub is_primary: bool,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
