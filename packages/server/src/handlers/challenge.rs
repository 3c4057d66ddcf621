use axum::Json;
use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use common::storage::{BlobStore, ContentHash};
use sea_orm::*;
use tracing::{info, instrument};

use crate::entity::{challenge, challenge_phase};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::verified_email::{VerifiedUser, Viewer};
use crate::handlers::host::{find_host_team, require_team_host};
use crate::handlers::leaderboard::REPORT_RESULT_PERMISSION;
use crate::hooks::{ChallengeChange, WatchedFields};
use crate::leaderboard::{APPROVE_PERMISSION, is_challenge_host};
use crate::models::challenge::{ChallengeResponse, EvaluationScriptResponse, ImportResponse};
use crate::state::AppState;

/// Body limit for routes that accept uploaded bundles or scripts.
pub fn upload_body_limit(max: usize) -> DefaultBodyLimit {
    DefaultBodyLimit::max(max)
}

/// Read the `file` field of a multipart body.
async fn read_file_field(multipart: &mut Multipart) -> Result<Vec<u8>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        if field.name() == Some("file") {
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Failed to read file: {e}")))?;
            return Ok(data.to_vec());
        }
    }
    Err(AppError::Validation("Missing 'file' field".into()))
}

async fn find_challenge<C: ConnectionTrait>(db: &C, id: i32) -> Result<challenge::Model, AppError> {
    challenge::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Challenge not found".into()))
}

/// Hosts of the challenge and evaluation workers may fetch its files.
async fn require_file_access(
    state: &AppState,
    challenge: &challenge::Model,
    user: &AuthUser,
) -> Result<(), AppError> {
    if user.has_permission(REPORT_RESULT_PERMISSION)
        || is_challenge_host(&state.db, challenge, user).await?
    {
        Ok(())
    } else {
        Err(AppError::PermissionDenied)
    }
}

/// Serve a stored blob, honouring `If-None-Match` against its content hash.
async fn blob_response(
    blobs: &dyn BlobStore,
    hex: &str,
    filename: &str,
    headers: &HeaderMap,
) -> Result<Response, AppError> {
    let etag = format!("\"{hex}\"");
    if let Some(if_none_match) = headers.get(header::IF_NONE_MATCH)
        && let Ok(val) = if_none_match.to_str()
        && (val == etag || val == "*")
    {
        return Ok(StatusCode::NOT_MODIFIED.into_response());
    }

    let hash: ContentHash = hex.parse()?;
    let data = blobs.get(&hash).await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, data.len().to_string())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .header(header::ETAG, &etag)
        .body(Body::from(data))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))
}

async fn phases_of<C: ConnectionTrait>(
    db: &C,
    challenge_id: i32,
) -> Result<Vec<challenge_phase::Model>, DbErr> {
    challenge_phase::Entity::find()
        .filter(challenge_phase::Column::ChallengeId.eq(challenge_id))
        .order_by_asc(challenge_phase::Column::Id)
        .all(db)
        .await
}

#[utoipa::path(
    post,
    path = "/teams/{id}/challenges",
    tag = "Challenges",
    operation_id = "importChallenge",
    summary = "Create a challenge from a bundle",
    description = "Imports a zip bundle holding a YAML manifest and the files it references. The whole import runs in one transaction: any invalid field or dangling reference leaves nothing behind. Caller must be a host of the team.",
    params(("id" = i32, Path, description = "Host team ID")),
    request_body(content_type = "multipart/form-data", description = "Challenge bundle zip in the `file` field"),
    responses(
        (status = 201, description = "Challenge created", body = ImportResponse),
        (status = 400, description = "Invalid bundle (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED, EMAIL_NOT_VERIFIED)", body = ErrorBody),
        (status = 404, description = "Host team not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, user, multipart), fields(user_id = user.user_id, team_id))]
pub async fn import_challenge(
    VerifiedUser(user): VerifiedUser,
    State(state): State<AppState>,
    Path(team_id): Path<i32>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let team = find_host_team(&state.db, team_id).await?;
    require_team_host(&state.db, team.id, user.user_id).await?;

    let archive = read_file_field(&mut multipart).await?;
    let persisted = state.importer().import(&state.db, archive, &team).await?;

    Ok((StatusCode::CREATED, Json(ImportResponse::from(persisted))))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Challenges",
    operation_id = "getChallenge",
    summary = "Get a challenge with its phases",
    description = "Unpublished challenges are only visible to their hosts and admins.",
    params(("id" = i32, Path, description = "Challenge ID")),
    responses(
        (status = 200, description = "Challenge", body = ChallengeResponse),
        (status = 401, description = "Invalid token (TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Email not verified (EMAIL_NOT_VERIFIED)", body = ErrorBody),
        (status = 404, description = "Challenge not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, viewer))]
pub async fn get_challenge(
    Viewer(viewer): Viewer,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ChallengeResponse>, AppError> {
    let challenge = find_challenge(&state.db, id).await?;

    if !challenge.published {
        let is_host = match &viewer {
            Some(v) => is_challenge_host(&state.db, &challenge, v).await?,
            None => false,
        };
        if !is_host {
            return Err(AppError::NotFound("Challenge not found".into()));
        }
    }

    let phases = phases_of(&state.db, challenge.id).await?;
    Ok(Json(ChallengeResponse::new(challenge, phases)))
}

#[utoipa::path(
    put,
    path = "/{id}/evaluation-script",
    tag = "Challenges",
    operation_id = "replaceEvaluationScript",
    summary = "Replace the evaluation script",
    description = "Stores a new evaluation script for the challenge. Post-commit hooks are told the previous script hash so evaluation workers can reload.",
    params(("id" = i32, Path, description = "Challenge ID")),
    request_body(content_type = "multipart/form-data", description = "Script archive in the `file` field"),
    responses(
        (status = 200, description = "Script replaced", body = EvaluationScriptResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED, EMAIL_NOT_VERIFIED)", body = ErrorBody),
        (status = 404, description = "Challenge not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, user, multipart), fields(user_id = user.user_id, challenge_id = id))]
pub async fn replace_evaluation_script(
    VerifiedUser(user): VerifiedUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    mut multipart: Multipart,
) -> Result<Json<EvaluationScriptResponse>, AppError> {
    let challenge = find_challenge(&state.db, id).await?;
    require_team_host(&state.db, challenge.creator_id, user.user_id).await?;

    let script = read_file_field(&mut multipart).await?;
    if script.is_empty() {
        return Err(AppError::Validation("Evaluation script must not be empty".into()));
    }
    let hash = state.blobs.put(&script).await?.to_hex();

    let phases = phases_of(&state.db, challenge.id).await?;
    let prior = WatchedFields::capture(&challenge, &phases);
    let previous = challenge.evaluation_script.clone();

    let mut active: challenge::ActiveModel = challenge.into();
    active.evaluation_script = Set(hash);
    let updated = active.update(&state.db).await?;

    let change = ChallengeChange {
        challenge: updated,
        phases,
        prior: Some(prior),
    };
    let changed = change.evaluation_script_changed();
    info!(changed, "Replaced evaluation script");
    state.hooks.run(&change).await;

    Ok(Json(EvaluationScriptResponse {
        challenge_id: change.challenge.id,
        evaluation_script: change.challenge.evaluation_script,
        previous_evaluation_script: previous,
        changed,
    }))
}

#[utoipa::path(
    get,
    path = "/{id}/evaluation-script",
    tag = "Challenges",
    operation_id = "downloadEvaluationScript",
    summary = "Download the evaluation script",
    description = "Returns the stored script bytes. Available to hosts of the challenge and to holders of `submission:report_result`. Supports ETag caching via If-None-Match.",
    params(("id" = i32, Path, description = "Challenge ID")),
    responses(
        (status = 200, description = "Script content"),
        (status = 304, description = "Not Modified (ETag match)"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Challenge or blob not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, headers), fields(user_id = auth_user.user_id))]
pub async fn download_evaluation_script(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let challenge = find_challenge(&state.db, id).await?;
    require_file_access(&state, &challenge, &auth_user).await?;

    blob_response(
        &*state.blobs,
        &challenge.evaluation_script,
        "evaluation_script.zip",
        &headers,
    )
    .await
}

#[utoipa::path(
    get,
    path = "/{id}/phases/{phase_id}/annotation",
    tag = "Challenges",
    operation_id = "downloadTestAnnotation",
    summary = "Download a phase's test annotation file",
    description = "Returns the ground-truth file an evaluation worker scores the phase against. Same access rules as the evaluation script.",
    params(
        ("id" = i32, Path, description = "Challenge ID"),
        ("phase_id" = i32, Path, description = "Phase ID"),
    ),
    responses(
        (status = 200, description = "Annotation content"),
        (status = 304, description = "Not Modified (ETag match)"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Phase has no annotation file (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, headers), fields(user_id = auth_user.user_id))]
pub async fn download_annotation(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path((id, phase_id)): Path<(i32, i32)>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let challenge = find_challenge(&state.db, id).await?;
    require_file_access(&state, &challenge, &auth_user).await?;

    let phase = challenge_phase::Entity::find_by_id(phase_id)
        .filter(challenge_phase::Column::ChallengeId.eq(challenge.id))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Phase not found".into()))?;
    let annotation = phase
        .test_annotation
        .as_deref()
        .ok_or_else(|| AppError::NotFound("Phase has no test annotation file".into()))?;

    blob_response(&*state.blobs, annotation, "test_annotation", &headers).await
}

#[utoipa::path(
    post,
    path = "/{id}/approve",
    tag = "Challenges",
    operation_id = "approveChallenge",
    summary = "Approve a challenge",
    description = "Marks the challenge as approved by an admin. Requires `challenge:approve` permission.",
    params(("id" = i32, Path, description = "Challenge ID")),
    responses(
        (status = 200, description = "Challenge approved", body = ChallengeResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Challenge not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn approve_challenge(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ChallengeResponse>, AppError> {
    auth_user.require_permission(APPROVE_PERMISSION)?;

    let challenge = find_challenge(&state.db, id).await?;
    let mut active: challenge::ActiveModel = challenge.into();
    active.approved_by_admin = Set(true);
    let updated = active.update(&state.db).await?;

    let phases = phases_of(&state.db, updated.id).await?;
    Ok(Json(ChallengeResponse::new(updated, phases)))
}
