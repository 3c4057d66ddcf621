use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Membership status of the user who created the team.
pub const STATUS_SELF: &str = "self";
pub const STATUS_ACCEPTED: &str = "accepted";

/// Hosts with this permission may manage the team's members.
pub const PERMISSION_ADMIN: &str = "admin";
pub const PERMISSION_WRITE: &str = "write";

/// Membership of a user in a challenge host team.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "challenge_host")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique_key = "host_membership")]
    pub user_id: i32,
    #[sea_orm(belongs_to, from = "user_id", to = "id")]
    pub user: HasOne<super::user::Entity>,

    #[sea_orm(unique_key = "host_membership")]
    pub team_id: i32,
    #[sea_orm(belongs_to, from = "team_id", to = "id")]
    pub team: HasOne<super::challenge_host_team::Entity>,

    pub status: String,
    pub permissions: String,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
