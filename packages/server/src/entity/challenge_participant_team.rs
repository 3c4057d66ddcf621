use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "challenge_participant_team")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub challenge_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub participant_team_id: i32,
    #[sea_orm(belongs_to, from = "challenge_id", to = "id")]
    pub challenge: HasOne<super::challenge::Entity>,
    #[sea_orm(belongs_to, from = "participant_team_id", to = "id")]
    pub participant_team: HasOne<super::participant_team::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
