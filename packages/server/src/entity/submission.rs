use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub const STATUS_SUBMITTED: &str = "submitted";
pub const STATUS_FINISHED: &str = "finished";
pub const STATUS_FAILED: &str = "failed";

/// A participant team's entry to one phase.
///
/// Evaluation happens outside this service; only the status and the reported
/// results live here.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "submission")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub challenge_phase_id: i32,
    #[sea_orm(belongs_to, from = "challenge_phase_id", to = "id")]
    pub challenge_phase: HasOne<super::challenge_phase::Entity>,

    #[sea_orm(indexed)]
    pub participant_team_id: i32,
    #[sea_orm(belongs_to, from = "participant_team_id", to = "id")]
    pub participant_team: HasOne<super::participant_team::Entity>,

    pub created_by: i32,
    #[sea_orm(belongs_to, from = "created_by", to = "id")]
    pub creator: HasOne<super::user::Entity>,

    pub status: String,
    /// Content hash of the uploaded prediction file.
    pub input_file: String,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
