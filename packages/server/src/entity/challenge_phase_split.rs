use common::Visibility;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub const DEFAULT_DECIMAL_PRECISION: i32 = 2;
pub const MAX_DECIMAL_PRECISION: i32 = 20;

/// Pairs a phase with a dataset split and the leaderboard that ranks it.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "challenge_phase_split")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub challenge_phase_id: i32,
    #[sea_orm(belongs_to, from = "challenge_phase_id", to = "id")]
    pub challenge_phase: HasOne<super::challenge_phase::Entity>,

    pub dataset_split_id: i32,
    #[sea_orm(belongs_to, from = "dataset_split_id", to = "id")]
    pub dataset_split: HasOne<super::dataset_split::Entity>,

    pub leaderboard_id: i32,
    #[sea_orm(belongs_to, from = "leaderboard_id", to = "id")]
    pub leaderboard: HasOne<super::leaderboard::Entity>,

    pub visibility: Visibility,
    pub leaderboard_decimal_precision: i32,
    #[sea_orm(default_value = true)]
    pub is_leaderboard_order_descending: bool,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
