//! Leaderboard reads filtered by visibility tier, and recording of
//! evaluation results reported by workers.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use chrono::Utc;
use common::{EvaluationOutput, MetricMap, Visibility};
use sea_orm::sea_query::OnConflict;
use sea_orm::*;
use tracing::{info, instrument};

use crate::entity::{
    challenge, challenge_host, challenge_phase, challenge_phase_split, dataset_split,
    leaderboard, leaderboard_data, participant, participant_team, submission,
};
use crate::error::AppError;
use crate::extractors::auth::AuthUser;
use crate::models::leaderboard::{
    LeaderboardEntry, LeaderboardResponse, ReportResultRequest, ReportResultResponse,
};

/// Admins see every leaderboard in full.
pub const APPROVE_PERMISSION: &str = "challenge:approve";

/// Which entries of a leaderboard a viewer may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    All,
    OwnTeams,
    Denied,
}

pub fn access_for(visibility: Visibility, is_host: bool) -> Access {
    match (visibility, is_host) {
        (_, true) | (Visibility::Public, false) => Access::All,
        (Visibility::OwnerAndHost, false) => Access::OwnTeams,
        (Visibility::Host, false) => Access::Denied,
    }
}

/// Parsed leaderboard schema document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub labels: Vec<String>,
    pub default_order_by: Option<String>,
}

impl Schema {
    pub fn parse(value: &serde_json::Value) -> Self {
        let labels = value
            .get("labels")
            .and_then(|l| l.as_array())
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(|l| l.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        let default_order_by = value
            .get("default_order_by")
            .and_then(|o| o.as_str())
            .map(str::to_string);
        Self {
            labels,
            default_order_by,
        }
    }

    /// The ranking metric: `default_order_by`, else the first label.
    pub fn order_by(&self) -> Option<&str> {
        self.default_order_by
            .as_deref()
            .or_else(|| self.labels.first().map(String::as_str))
    }

    pub fn missing_labels(&self, metrics: &MetricMap) -> Vec<&str> {
        self.labels
            .iter()
            .filter(|l| !metrics.contains_key(l.as_str()))
            .map(String::as_str)
            .collect()
    }
}

/// Round to `precision` decimals. Precisions too large to scale by are a no-op.
pub fn round_to(value: f64, precision: i32) -> f64 {
    let factor = 10f64.powi(precision);
    if !factor.is_finite() || factor == 0.0 {
        return value;
    }
    let scaled = (value * factor).round() / factor;
    if scaled.is_finite() { scaled } else { value }
}

/// Sort entries by their ranking score. Entries without one go last.
pub fn rank(entries: &mut [LeaderboardEntry], descending: bool) {
    entries.sort_by(|a, b| match (a.filtering_score, b.filtering_score) {
        (Some(x), Some(y)) => {
            let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            let ord = if descending { ord.reverse() } else { ord };
            ord.then(a.submitted_at.cmp(&b.submitted_at))
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.submitted_at.cmp(&b.submitted_at),
    });
}

/// Admins and members of the challenge's host team.
pub async fn is_challenge_host<C: ConnectionTrait>(
    db: &C,
    challenge: &challenge::Model,
    viewer: &AuthUser,
) -> Result<bool, DbErr> {
    if viewer.has_permission(APPROVE_PERMISSION) {
        return Ok(true);
    }
    let memberships = challenge_host::Entity::find()
        .filter(challenge_host::Column::TeamId.eq(challenge.creator_id))
        .filter(challenge_host::Column::UserId.eq(viewer.user_id))
        .count(db)
        .await?;
    Ok(memberships > 0)
}

#[instrument(skip(db, viewer), fields(viewer = viewer.map(|v| v.user_id)))]
pub async fn leaderboard_for(
    db: &DatabaseConnection,
    phase_split_id: i32,
    viewer: Option<&AuthUser>,
) -> Result<LeaderboardResponse, AppError> {
    let split = challenge_phase_split::Entity::find_by_id(phase_split_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Phase split not found".into()))?;
    let phase = challenge_phase::Entity::find_by_id(split.challenge_phase_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Challenge phase not found".into()))?;
    let challenge = challenge::Entity::find_by_id(phase.challenge_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Challenge not found".into()))?;

    let is_host = match viewer {
        Some(v) => is_challenge_host(db, &challenge, v).await?,
        None => false,
    };
    let access = access_for(split.visibility, is_host);
    if access == Access::Denied {
        return Err(AppError::PermissionDenied);
    }

    let schema = leaderboard::Entity::find_by_id(split.leaderboard_id)
        .one(db)
        .await?
        .map(|lb| Schema::parse(&lb.schema))
        .unwrap_or_default();

    let rows = leaderboard_data::Entity::find()
        .filter(leaderboard_data::Column::ChallengePhaseSplitId.eq(split.id))
        .all(db)
        .await?;

    let submission_ids: Vec<i32> = rows.iter().map(|r| r.submission_id).collect();
    let submissions: HashMap<i32, submission::Model> = submission::Entity::find()
        .filter(submission::Column::Id.is_in(submission_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|s| (s.id, s))
        .collect();

    let team_ids: HashSet<i32> = submissions.values().map(|s| s.participant_team_id).collect();
    let teams: HashMap<i32, String> = participant_team::Entity::find()
        .filter(participant_team::Column::Id.is_in(team_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|t| (t.id, t.team_name))
        .collect();

    let own_teams: HashSet<i32> = match (access, viewer) {
        (Access::OwnTeams, Some(v)) => participant::Entity::find()
            .filter(participant::Column::UserId.eq(v.user_id))
            .all(db)
            .await?
            .into_iter()
            .map(|p| p.team_id)
            .collect(),
        _ => HashSet::new(),
    };

    let order_by = schema.order_by().map(str::to_string);
    let precision = split.leaderboard_decimal_precision;
    let mut entries: Vec<LeaderboardEntry> = rows
        .into_iter()
        .filter_map(|row| {
            let sub = submissions.get(&row.submission_id)?;
            if access == Access::OwnTeams && !own_teams.contains(&sub.participant_team_id) {
                return None;
            }
            let metrics: MetricMap = serde_json::from_value(row.result).unwrap_or_default();
            let result: MetricMap = metrics
                .into_iter()
                .map(|(k, v)| (k, round_to(v, precision)))
                .collect();
            let filtering_score = order_by.as_deref().and_then(|o| result.get(o).copied());
            Some(LeaderboardEntry {
                submission_id: sub.id,
                participant_team_id: sub.participant_team_id,
                team_name: teams
                    .get(&sub.participant_team_id)
                    .cloned()
                    .unwrap_or_default(),
                result,
                filtering_score,
                submitted_at: sub.created_at,
            })
        })
        .collect();
    rank(&mut entries, split.is_leaderboard_order_descending);

    Ok(LeaderboardResponse {
        phase_split_id: split.id,
        visibility: split.visibility,
        labels: schema.labels,
        order_by,
        descending: split.is_leaderboard_order_descending,
        entries,
    })
}

/// Store a worker's evaluation output against the phase splits of the
/// submission's phase.
#[instrument(skip(db, report))]
pub async fn record_result(
    db: &DatabaseConnection,
    submission_id: i32,
    report: &ReportResultRequest,
) -> Result<ReportResultResponse, AppError> {
    let txn = db.begin().await?;

    let sub = submission::Entity::find_by_id(submission_id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Submission not found".into()))?;

    let output = report.output();
    let ids = if output.result.is_empty() {
        Vec::new()
    } else {
        write_rows(&txn, &sub, &output, report.error.clone()).await?
    };

    let status = if ids.is_empty() {
        submission::STATUS_FAILED
    } else {
        submission::STATUS_FINISHED
    };
    let mut active: submission::ActiveModel = sub.into();
    active.status = Set(status.to_string());
    active.update(&txn).await?;

    txn.commit().await?;

    info!(submission_id, status, rows = ids.len(), "Recorded evaluation result");
    Ok(ReportResultResponse {
        submission_id,
        status: status.to_string(),
        leaderboard_data_ids: ids,
    })
}

async fn write_rows<C: ConnectionTrait>(
    db: &C,
    sub: &submission::Model,
    output: &EvaluationOutput,
    error: Option<serde_json::Value>,
) -> Result<Vec<i32>, AppError> {
    let splits = challenge_phase_split::Entity::find()
        .filter(challenge_phase_split::Column::ChallengePhaseId.eq(sub.challenge_phase_id))
        .all(db)
        .await?;

    let split_ids: Vec<i32> = splits.iter().map(|s| s.dataset_split_id).collect();
    let codenames: HashMap<i32, String> = dataset_split::Entity::find()
        .filter(dataset_split::Column::Id.is_in(split_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|d| (d.id, d.codename))
        .collect();

    let leaderboard_ids: Vec<i32> = splits.iter().map(|s| s.leaderboard_id).collect();
    let schemas: HashMap<i32, Schema> = leaderboard::Entity::find()
        .filter(leaderboard::Column::Id.is_in(leaderboard_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|l| (l.id, Schema::parse(&l.schema)))
        .collect();

    let mut ids = Vec::new();
    for (codename, metrics) in output.splits() {
        let split = splits
            .iter()
            .find(|s| codenames.get(&s.dataset_split_id).map(String::as_str) == Some(codename))
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "Dataset split '{codename}' is not part of phase {}",
                    sub.challenge_phase_id
                ))
            })?;

        if let Some(schema) = schemas.get(&split.leaderboard_id) {
            let missing = schema.missing_labels(metrics);
            if !missing.is_empty() {
                return Err(AppError::Validation(format!(
                    "Result for split '{codename}' is missing metrics: {}",
                    missing.join(", ")
                )));
            }
        }

        let row = leaderboard_data::ActiveModel {
            challenge_phase_split_id: Set(split.id),
            submission_id: Set(sub.id),
            leaderboard_id: Set(split.leaderboard_id),
            result: Set(serde_json::json!(metrics)),
            error: Set(error.clone()),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        let inserted = leaderboard_data::Entity::insert(row)
            .on_conflict(
                OnConflict::columns([
                    leaderboard_data::Column::ChallengePhaseSplitId,
                    leaderboard_data::Column::SubmissionId,
                ])
                .update_columns([
                    leaderboard_data::Column::Result,
                    leaderboard_data::Column::Error,
                    leaderboard_data::Column::LeaderboardId,
                ])
                .to_owned(),
            )
            .exec(db)
            .await?;
        ids.push(inserted.last_insert_id);
    }
    Ok(ids)
}
