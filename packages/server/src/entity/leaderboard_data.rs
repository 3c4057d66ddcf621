use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Metrics a submission earned on one phase split.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "leaderboard_data")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique_key = "split_submission")]
    pub challenge_phase_split_id: i32,
    #[sea_orm(belongs_to, from = "challenge_phase_split_id", to = "id")]
    pub challenge_phase_split: HasOne<super::challenge_phase_split::Entity>,

    #[sea_orm(unique_key = "split_submission")]
    pub submission_id: i32,
    #[sea_orm(belongs_to, from = "submission_id", to = "id")]
    pub submission: HasOne<super::submission::Entity>,

    pub leaderboard_id: i32,
    #[sea_orm(belongs_to, from = "leaderboard_id", to = "id")]
    pub leaderboard: HasOne<super::leaderboard::Entity>,

    #[sea_orm(column_type = "JsonBinary")]
    pub result: Json,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub error: Option<Json>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
