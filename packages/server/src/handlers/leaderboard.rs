use axum::Json;
use axum::extract::{Path, State};
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::ValidJson;
use crate::extractors::verified_email::Viewer;
use crate::leaderboard;
use crate::models::leaderboard::{LeaderboardResponse, ReportResultRequest, ReportResultResponse};
use crate::state::AppState;

pub const REPORT_RESULT_PERMISSION: &str = "submission:report_result";

#[utoipa::path(
    get,
    path = "/{id}/leaderboard",
    tag = "Leaderboards",
    operation_id = "getLeaderboard",
    summary = "Leaderboard of a phase split",
    description = "Public splits are visible to everyone. Owner-and-host splits show hosts every entry and other viewers only their own teams' entries. Host-only splits are restricted to hosts. Entries are ranked by the schema's ordering metric and rounded to the split's precision.",
    params(("id" = i32, Path, description = "Phase split ID")),
    responses(
        (status = 200, description = "Leaderboard", body = LeaderboardResponse),
        (status = 401, description = "Invalid token (TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED, EMAIL_NOT_VERIFIED)", body = ErrorBody),
        (status = 404, description = "Phase split not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, viewer))]
pub async fn get_leaderboard(
    Viewer(viewer): Viewer,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    let board = leaderboard::leaderboard_for(&state.db, id, viewer.as_ref()).await?;
    Ok(Json(board))
}

#[utoipa::path(
    post,
    path = "/{id}/result",
    tag = "Leaderboards",
    operation_id = "reportResult",
    summary = "Report an evaluation result",
    description = "Called by evaluation workers with the output of the challenge's evaluation script. Requires `submission:report_result` permission. Each result entry is keyed by dataset split codename and must carry every metric of that split's leaderboard schema.",
    params(("id" = i32, Path, description = "Submission ID")),
    request_body = ReportResultRequest,
    responses(
        (status = 200, description = "Result recorded", body = ReportResultResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Submission not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = auth_user.user_id))]
pub async fn report_result(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ValidJson(payload): ValidJson<ReportResultRequest>,
) -> Result<Json<ReportResultResponse>, AppError> {
    auth_user.require_permission(REPORT_RESULT_PERMISSION)?;
    let recorded = leaderboard::record_result(&state.db, id, &payload).await?;
    Ok(Json(recorded))
}
