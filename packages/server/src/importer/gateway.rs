//! Writes an import plan to the database.
//!
//! Callers own the transaction: `persist` only issues statements on the
//! connection it is given, so a failure part-way leaves nothing behind once
//! the caller's transaction is dropped.

use std::collections::BTreeSet;

use chrono::Utc;
use common::storage::{BlobStore, ContentHash};
use rand::Rng;
use sea_orm::*;
use serde_json::json;
use tracing::{debug, info};

use crate::entity::{
    challenge, challenge_host, challenge_host_team, challenge_participant_team, challenge_phase,
    challenge_phase_split, dataset_split, email_address, leaderboard, participant,
    participant_team,
};
use crate::utils::naming;

use super::assembler::{IdMap, ImportPlan, LeaderboardIds, PhaseIds, SplitIds};
use super::error::ImportError;
use super::manifest::ResolvedBundle;

/// Blob hashes of the files a bundle carried.
#[derive(Debug, Clone)]
pub struct StoredFiles {
    pub evaluation_script: ContentHash,
    pub image: Option<ContentHash>,
    /// One entry per phase, in manifest order.
    pub annotations: Vec<Option<ContentHash>>,
}

/// Every row an import created.
#[derive(Debug, Clone)]
pub struct PersistedChallenge {
    pub challenge: challenge::Model,
    pub phases: Vec<challenge_phase::Model>,
    pub leaderboards: Vec<leaderboard::Model>,
    pub dataset_splits: Vec<dataset_split::Model>,
    pub phase_splits: Vec<challenge_phase_split::Model>,
    pub host_participant_team: Option<participant_team::Model>,
}

/// Put the bundle's files in the blob store.
///
/// Runs before the transaction opens. Blobs are content addressed, so a
/// failed import leaves at most unreferenced duplicates of identical uploads.
pub async fn store_files(
    blobs: &dyn BlobStore,
    bundle: &ResolvedBundle,
) -> Result<StoredFiles, ImportError> {
    let evaluation_script = blobs.put(&bundle.evaluation_script).await?;
    let image = match &bundle.image {
        Some(bytes) => Some(blobs.put(bytes).await?),
        None => None,
    };
    let mut annotations = Vec::with_capacity(bundle.phases.len());
    for phase in &bundle.phases {
        annotations.push(match &phase.annotation {
            Some(bytes) => Some(blobs.put(bytes).await?),
            None => None,
        });
    }
    Ok(StoredFiles {
        evaluation_script,
        image,
        annotations,
    })
}

pub async fn persist<C: ConnectionTrait>(
    db: &C,
    plan: &ImportPlan,
    files: &StoredFiles,
    host_team: &challenge_host_team::Model,
    environment: &str,
) -> Result<PersistedChallenge, ImportError> {
    let challenge = insert_challenge(db, plan, files, host_team, environment).await?;
    debug!(challenge_id = challenge.id, slug = ?challenge.slug, "Inserted challenge");

    let manifest = &plan.bundle.manifest;

    let mut leaderboard_ids: LeaderboardIds = IdMap::new("leaderboard");
    let mut leaderboards = Vec::with_capacity(manifest.leaderboard.len());
    for entry in &manifest.leaderboard {
        let model = leaderboard::ActiveModel {
            schema: Set(entry.schema.clone()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(|e| field_error("leaderboard", e))?;
        leaderboard_ids.insert(entry.id, model.id);
        leaderboards.push(model);
    }

    let mut phase_ids: PhaseIds = IdMap::new("challenge_phase");
    let mut phases = Vec::with_capacity(manifest.challenge_phases.len());
    let resolved = plan.bundle.phases.iter().zip(&files.annotations);
    for (entry, (resolved, annotation)) in manifest.challenge_phases.iter().zip(resolved) {
        let now = Utc::now();
        let model = challenge_phase::ActiveModel {
            name: Set(entry.name.trim().to_string()),
            description: Set(resolved.description.clone()),
            leaderboard_public: Set(entry.leaderboard_public),
            start_date: Set(entry.start_date),
            end_date: Set(entry.end_date),
            challenge_id: Set(challenge.id),
            is_public: Set(entry.is_public),
            is_submission_public: Set(entry.is_submission_public),
            test_annotation: Set(annotation.as_ref().map(ContentHash::to_hex)),
            max_submissions_per_day: Set(entry
                .max_submissions_per_day
                .unwrap_or(challenge_phase::DEFAULT_SUBMISSION_CAP)),
            max_submissions_per_month: Set(entry
                .max_submissions_per_month
                .unwrap_or(challenge_phase::DEFAULT_SUBMISSION_CAP)),
            max_submissions: Set(entry
                .max_submissions
                .unwrap_or(challenge_phase::DEFAULT_SUBMISSION_CAP)),
            max_concurrent_submissions_allowed: Set(entry
                .max_concurrent_submissions_allowed
                .unwrap_or(challenge_phase::DEFAULT_MAX_CONCURRENT)),
            codename: Set(entry.codename.clone()),
            allowed_email_ids: Set(json!(entry.allowed_email_ids)),
            slug: Set(Some(naming::phase_slug(
                &challenge.title,
                &entry.codename,
                challenge.id,
            ))),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(|e| field_error("challenge_phases", e))?;
        phase_ids.insert(entry.id, model.id);
        phases.push(model);
    }

    let mut split_ids: SplitIds = IdMap::new("dataset_split");
    let mut dataset_splits = Vec::with_capacity(manifest.dataset_splits.len());
    for entry in &manifest.dataset_splits {
        let model = dataset_split::ActiveModel {
            name: Set(entry.name.clone()),
            codename: Set(entry.codename.clone()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(|e| field_error("dataset_splits", e))?;
        split_ids.insert(entry.id, model.id);
        dataset_splits.push(model);
    }

    let mut phase_splits = Vec::with_capacity(plan.phase_splits.len());
    for entry in &plan.phase_splits {
        let model = challenge_phase_split::ActiveModel {
            challenge_phase_id: Set(phase_ids.resolve(entry.challenge_phase_id)?),
            dataset_split_id: Set(split_ids.resolve(entry.dataset_split_id)?),
            leaderboard_id: Set(leaderboard_ids.resolve(entry.leaderboard_id)?),
            visibility: Set(entry.visibility),
            leaderboard_decimal_precision: Set(entry.decimal_precision),
            is_leaderboard_order_descending: Set(entry.order_descending),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(|e| field_error("challenge_phase_splits", e))?;
        phase_splits.push(model);
    }

    let host_participant_team = if challenge.is_docker_based {
        None
    } else {
        Some(seed_host_participants(db, challenge.id, host_team).await?)
    };

    info!(
        challenge_id = challenge.id,
        phases = phases.len(),
        leaderboards = leaderboards.len(),
        dataset_splits = dataset_splits.len(),
        phase_splits = phase_splits.len(),
        "Persisted challenge bundle"
    );

    Ok(PersistedChallenge {
        challenge,
        phases,
        leaderboards,
        dataset_splits,
        phase_splits,
        host_participant_team,
    })
}

async fn insert_challenge<C: ConnectionTrait>(
    db: &C,
    plan: &ImportPlan,
    files: &StoredFiles,
    host_team: &challenge_host_team::Model,
    environment: &str,
) -> Result<challenge::Model, ImportError> {
    let bundle = &plan.bundle;
    let manifest = &bundle.manifest;
    let now = Utc::now();

    let inserted = challenge::ActiveModel {
        title: Set(plan.title().to_string()),
        short_description: Set(manifest.short_description.clone()),
        description: Set(bundle.description.clone()),
        terms_and_conditions: Set(bundle.terms_and_conditions.clone()),
        submission_guidelines: Set(bundle.submission_guidelines.clone()),
        evaluation_details: Set(bundle.evaluation_details.clone()),
        leaderboard_description: Set(manifest.leaderboard_description.clone()),
        image: Set(files.image.as_ref().map(ContentHash::to_hex)),
        start_date: Set(manifest.start_date),
        end_date: Set(manifest.end_date),
        creator_id: Set(host_team.id),
        published: Set(manifest.published),
        is_registration_open: Set(true),
        enable_forum: Set(true),
        forum_url: Set(None),
        anonymous_leaderboard: Set(manifest.anonymous_leaderboard),
        is_disabled: Set(false),
        approved_by_admin: Set(false),
        featured: Set(false),
        remote_evaluation: Set(manifest.remote_evaluation),
        is_docker_based: Set(manifest.is_docker_based),
        evaluation_script: Set(files.evaluation_script.to_hex()),
        allowed_email_domains: Set(json!(manifest.allowed_email_domains)),
        blocked_email_domains: Set(json!(manifest.blocked_email_domains)),
        banned_email_ids: Set(json!(manifest.banned_email_ids)),
        queue: Set(None),
        slug: Set(None),
        max_concurrent_submission_evaluation: Set(manifest
            .max_concurrent_submission_evaluation
            .unwrap_or(challenge::DEFAULT_MAX_CONCURRENT_EVALUATION)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|e| field_error("challenge", e))?;

    // The slug is derived from the id on this second save.
    let queue = naming::queue_name(&inserted.title, environment);
    let mut active: challenge::ActiveModel = inserted.into();
    active.queue = Set(Some(queue));
    active
        .update(db)
        .await
        .map_err(|e| field_error("challenge", e))
}

/// Enrol the host team's verified members in a fresh participant team so
/// hosts can submit to their own challenge.
async fn seed_host_participants<C: ConnectionTrait>(
    db: &C,
    challenge_id: i32,
    host_team: &challenge_host_team::Model,
) -> Result<participant_team::Model, ImportError> {
    let suffix: u32 = rand::rng().random_range(1..=100_000);
    let now = Utc::now();

    let team = participant_team::ActiveModel {
        team_name: Set(format!("Host_{suffix}_Team")),
        created_by: Set(host_team.created_by),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let host_user_ids: Vec<i32> = challenge_host::Entity::find()
        .filter(challenge_host::Column::TeamId.eq(host_team.id))
        .select_only()
        .column(challenge_host::Column::UserId)
        .into_tuple()
        .all(db)
        .await?;

    let verified: BTreeSet<i32> = if host_user_ids.is_empty() {
        BTreeSet::new()
    } else {
        email_address::Entity::find()
            .filter(email_address::Column::UserId.is_in(host_user_ids))
            .filter(email_address::Column::Verified.eq(true))
            .select_only()
            .column(email_address::Column::UserId)
            .into_tuple::<i32>()
            .all(db)
            .await?
            .into_iter()
            .collect()
    };

    for &user_id in &verified {
        participant::ActiveModel {
            user_id: Set(user_id),
            team_id: Set(team.id),
            status: Set(participant::STATUS_ACCEPTED.to_string()),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    challenge_participant_team::Entity::insert(challenge_participant_team::ActiveModel {
        challenge_id: Set(challenge_id),
        participant_team_id: Set(team.id),
    })
    .exec_without_returning(db)
    .await?;

    debug!(
        team = %team.team_name,
        members = verified.len(),
        "Enrolled hosts as participants"
    );
    Ok(team)
}

/// Unique violations are the bundle's fault; report them against `field`.
fn field_error(field: &str, err: DbErr) -> ImportError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => ImportError::validation(field, detail),
        _ => ImportError::Db(err),
    }
}
