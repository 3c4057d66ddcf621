use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{challenge_host, challenge_host_team};
use crate::error::AppError;
use crate::extractors::json::Validate;
use crate::models::shared::validate_name;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateHostTeamRequest {
    /// Unique team name (1-100 characters).
    #[schema(example = "G2Net")]
    pub team_name: String,
    #[schema(example = "https://g2net.eu")]
    pub team_url: Option<String>,
}

impl Validate for CreateHostTeamRequest {
    fn validate(&self) -> Result<(), AppError> {
        validate_name("Team name", &self.team_name, 100)
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct HostTeamResponse {
    pub id: i32,
    pub team_name: String,
    pub team_url: Option<String>,
    pub created_by: i32,
    pub created_at: DateTime<Utc>,
}

impl From<challenge_host_team::Model> for HostTeamResponse {
    fn from(m: challenge_host_team::Model) -> Self {
        Self {
            id: m.id,
            team_name: m.team_name,
            team_url: m.team_url,
            created_by: m.created_by,
            created_at: m.created_at,
        }
    }
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct AddHostRequest {
    /// Username of the user to add.
    #[schema(example = "bob")]
    pub username: String,
    /// `admin` or `write`. Defaults to `write`.
    #[schema(example = "write")]
    pub permissions: Option<String>,
}

impl Validate for AddHostRequest {
    fn validate(&self) -> Result<(), AppError> {
        if self.username.trim().is_empty() {
            return Err(AppError::Validation("Username must not be empty".into()));
        }
        match self.permissions.as_deref() {
            None | Some(challenge_host::PERMISSION_ADMIN) | Some(challenge_host::PERMISSION_WRITE) => {
                Ok(())
            }
            Some(other) => Err(AppError::Validation(format!(
                "Unknown host permission '{other}'"
            ))),
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct HostResponse {
    pub id: i32,
    pub user_id: i32,
    pub team_id: i32,
    #[schema(example = "accepted")]
    pub status: String,
    #[schema(example = "write")]
    pub permissions: String,
}

impl From<challenge_host::Model> for HostResponse {
    fn from(m: challenge_host::Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            team_id: m.team_id,
            status: m.status,
            permissions: m.permissions,
        }
    }
}
