use chrono::Utc;
use sea_orm::ActiveValue;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SUBMISSION_CAP: i32 = 100_000;
pub const DEFAULT_MAX_CONCURRENT: i32 = 3;

/// A scored stage of a challenge.
///
/// `max_concurrent_submissions_allowed` never exceeds `max_submissions_per_day`
/// once saved.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "challenge_phase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    #[sea_orm(default_value = false)]
    pub leaderboard_public: bool,
    pub start_date: Option<DateTimeUtc>,
    pub end_date: Option<DateTimeUtc>,

    #[sea_orm(unique_key = "phase_codename")]
    pub challenge_id: i32,
    #[sea_orm(belongs_to, from = "challenge_id", to = "id")]
    pub challenge: HasOne<super::challenge::Entity>,

    #[sea_orm(default_value = false)]
    pub is_public: bool,
    #[sea_orm(default_value = false)]
    pub is_submission_public: bool,

    /// Content hash of the ground-truth file in the blob store.
    pub test_annotation: Option<String>,

    pub max_submissions_per_day: i32,
    pub max_submissions_per_month: i32,
    pub max_submissions: i32,
    pub max_concurrent_submissions_allowed: i32,

    #[sea_orm(unique_key = "phase_codename")]
    pub codename: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub allowed_email_ids: Json,

    #[sea_orm(unique)]
    pub slug: Option<String>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

/// Lower `concurrent` to `per_day` when it is larger.
pub fn clamp_concurrent(per_day: i32, concurrent: i32) -> i32 {
    concurrent.min(per_day)
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let clamped = match (
            self.max_submissions_per_day.try_as_ref(),
            self.max_concurrent_submissions_allowed.try_as_ref(),
        ) {
            (Some(per_day), Some(concurrent)) if concurrent > per_day => {
                Some(clamp_concurrent(*per_day, *concurrent))
            }
            _ => None,
        };
        if let Some(value) = clamped {
            self.max_concurrent_submissions_allowed = ActiveValue::Set(value);
        }
        self.updated_at = ActiveValue::Set(Utc::now());
        Ok(self)
    }
}
