use chrono::Utc;
use sea_orm::ActiveValue;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::utils::naming::challenge_slug;

/// Default cap on submissions evaluated in parallel for one challenge.
pub const DEFAULT_MAX_CONCURRENT_EVALUATION: i32 = 100_000;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "challenge")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub title: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub short_description: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub terms_and_conditions: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub submission_guidelines: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub evaluation_details: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub leaderboard_description: Option<String>,

    /// Content hash of the logo image in the blob store.
    pub image: Option<String>,
    pub start_date: Option<DateTimeUtc>,
    pub end_date: Option<DateTimeUtc>,

    #[sea_orm(indexed)]
    pub creator_id: i32,
    #[sea_orm(belongs_to, from = "creator_id", to = "id")]
    pub creator: HasOne<super::challenge_host_team::Entity>,

    #[sea_orm(default_value = false)]
    pub published: bool,
    #[sea_orm(default_value = true)]
    pub is_registration_open: bool,
    #[sea_orm(default_value = true)]
    pub enable_forum: bool,
    pub forum_url: Option<String>,
    #[sea_orm(default_value = false)]
    pub anonymous_leaderboard: bool,
    #[sea_orm(default_value = false)]
    pub is_disabled: bool,
    #[sea_orm(default_value = false)]
    pub approved_by_admin: bool,
    #[sea_orm(default_value = false)]
    pub featured: bool,
    #[sea_orm(default_value = false)]
    pub remote_evaluation: bool,
    #[sea_orm(default_value = false)]
    pub is_docker_based: bool,

    /// Content hash of the evaluation script in the blob store.
    pub evaluation_script: String,

    #[sea_orm(column_type = "JsonBinary")]
    pub allowed_email_domains: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub blocked_email_domains: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub banned_email_ids: Json,

    #[sea_orm(indexed)]
    pub queue: Option<String>,
    #[sea_orm(unique)]
    pub slug: Option<String>,
    pub max_concurrent_submission_evaluation: i32,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        // The id only exists once the row has been inserted.
        if !insert {
            let slug = match (self.id.try_as_ref(), self.title.try_as_ref()) {
                (Some(id), Some(title)) => Some(challenge_slug(title, *id)),
                _ => None,
            };
            if let Some(slug) = slug {
                self.slug = ActiveValue::Set(Some(slug));
            }
        }
        self.updated_at = ActiveValue::Set(Utc::now());
        Ok(self)
    }
}
