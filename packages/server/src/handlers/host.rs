use axum::extract::{Path, State};
use axum::{Json, http::StatusCode, response::IntoResponse};
use sea_orm::*;
use tracing::instrument;

use crate::entity::{challenge_host, challenge_host_team, user};
use crate::error::{AppError, ErrorBody};
use crate::extractors::json::ValidJson;
use crate::extractors::verified_email::VerifiedUser;
use crate::models::host::{AddHostRequest, CreateHostTeamRequest, HostResponse, HostTeamResponse};
use crate::state::AppState;

pub async fn find_host_team<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<challenge_host_team::Model, AppError> {
    challenge_host_team::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Host team not found".into()))
}

pub async fn find_membership<C: ConnectionTrait>(
    db: &C,
    team_id: i32,
    user_id: i32,
) -> Result<Option<challenge_host::Model>, DbErr> {
    challenge_host::Entity::find()
        .filter(challenge_host::Column::TeamId.eq(team_id))
        .filter(challenge_host::Column::UserId.eq(user_id))
        .one(db)
        .await
}

/// Any member of the team may act on its challenges.
pub async fn require_team_host<C: ConnectionTrait>(
    db: &C,
    team_id: i32,
    user_id: i32,
) -> Result<challenge_host::Model, AppError> {
    find_membership(db, team_id, user_id)
        .await?
        .ok_or(AppError::PermissionDenied)
}

#[utoipa::path(
    post,
    path = "/teams",
    tag = "Hosts",
    operation_id = "createHostTeam",
    summary = "Create a challenge host team",
    description = "Creates a host team. The caller joins it as an admin host.",
    request_body = CreateHostTeamRequest,
    responses(
        (status = 201, description = "Team created", body = HostTeamResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Email not verified (EMAIL_NOT_VERIFIED)", body = ErrorBody),
        (status = 409, description = "Team name taken (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, user, payload), fields(user_id = user.user_id, team_name = %payload.team_name))]
pub async fn create_team(
    VerifiedUser(user): VerifiedUser,
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<CreateHostTeamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let now = chrono::Utc::now();
    let txn = state.db.begin().await?;

    let team = challenge_host_team::ActiveModel {
        team_name: Set(payload.team_name.trim().to_string()),
        team_url: Set(payload.team_url),
        created_by: Set(user.user_id),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict("Host team name is already taken".into())
        }
        _ => AppError::from(e),
    })?;

    challenge_host::ActiveModel {
        user_id: Set(user.user_id),
        team_id: Set(team.id),
        status: Set(challenge_host::STATUS_SELF.to_string()),
        permissions: Set(challenge_host::PERMISSION_ADMIN.to_string()),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    Ok((StatusCode::CREATED, Json(HostTeamResponse::from(team))))
}

#[utoipa::path(
    post,
    path = "/teams/{id}/members",
    tag = "Hosts",
    operation_id = "addHost",
    summary = "Add a host to a team",
    description = "Adds an existing user to the team. Only admin hosts of the team may add members.",
    params(("id" = i32, Path, description = "Host team ID")),
    request_body = AddHostRequest,
    responses(
        (status = 201, description = "Host added", body = HostResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED, EMAIL_NOT_VERIFIED)", body = ErrorBody),
        (status = 404, description = "Team or user not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Already a host (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, caller, payload), fields(user_id = caller.user_id, team_id))]
pub async fn add_member(
    VerifiedUser(caller): VerifiedUser,
    State(state): State<AppState>,
    Path(team_id): Path<i32>,
    ValidJson(payload): ValidJson<AddHostRequest>,
) -> Result<impl IntoResponse, AppError> {
    let team = find_host_team(&state.db, team_id).await?;
    let membership = require_team_host(&state.db, team.id, caller.user_id).await?;
    if membership.permissions != challenge_host::PERMISSION_ADMIN {
        return Err(AppError::PermissionDenied);
    }

    let member = user::Entity::find()
        .filter(user::Column::Username.eq(payload.username.trim()))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    let permissions = payload
        .permissions
        .unwrap_or_else(|| challenge_host::PERMISSION_WRITE.to_string());

    let host = challenge_host::ActiveModel {
        user_id: Set(member.id),
        team_id: Set(team.id),
        status: Set(challenge_host::STATUS_ACCEPTED.to_string()),
        permissions: Set(permissions),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await
    .map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict("User is already a host of this team".into())
        }
        _ => AppError::from(e),
    })?;

    Ok((StatusCode::CREATED, Json(HostResponse::from(host))))
}
