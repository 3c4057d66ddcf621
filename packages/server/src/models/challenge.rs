use chrono::{DateTime, Utc};
use common::Visibility;
use serde::Serialize;

use crate::entity::{challenge, challenge_phase, challenge_phase_split};
use crate::importer::PersistedChallenge;

#[derive(Serialize, utoipa::ToSchema)]
pub struct PhaseResponse {
    pub id: i32,
    #[schema(example = "Dev Phase")]
    pub name: String,
    #[schema(example = "dev")]
    pub codename: String,
    /// HTML description.
    pub description: Option<String>,
    #[schema(example = "forest-dev-1")]
    pub slug: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub leaderboard_public: bool,
    pub is_public: bool,
    pub is_submission_public: bool,
    pub has_annotation: bool,
    pub max_submissions_per_day: i32,
    pub max_submissions_per_month: i32,
    pub max_submissions: i32,
    pub max_concurrent_submissions_allowed: i32,
}

impl From<challenge_phase::Model> for PhaseResponse {
    fn from(m: challenge_phase::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            codename: m.codename,
            description: m.description,
            slug: m.slug,
            start_date: m.start_date,
            end_date: m.end_date,
            leaderboard_public: m.leaderboard_public,
            is_public: m.is_public,
            is_submission_public: m.is_submission_public,
            has_annotation: m.test_annotation.is_some(),
            max_submissions_per_day: m.max_submissions_per_day,
            max_submissions_per_month: m.max_submissions_per_month,
            max_submissions: m.max_submissions,
            max_concurrent_submissions_allowed: m.max_concurrent_submissions_allowed,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct PhaseSplitResponse {
    pub id: i32,
    pub challenge_phase_id: i32,
    pub dataset_split_id: i32,
    pub leaderboard_id: i32,
    pub visibility: Visibility,
    pub leaderboard_decimal_precision: i32,
    pub is_leaderboard_order_descending: bool,
}

impl From<challenge_phase_split::Model> for PhaseSplitResponse {
    fn from(m: challenge_phase_split::Model) -> Self {
        Self {
            id: m.id,
            challenge_phase_id: m.challenge_phase_id,
            dataset_split_id: m.dataset_split_id,
            leaderboard_id: m.leaderboard_id,
            visibility: m.visibility,
            leaderboard_decimal_precision: m.leaderboard_decimal_precision,
            is_leaderboard_order_descending: m.is_leaderboard_order_descending,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ChallengeResponse {
    pub id: i32,
    #[schema(example = "Forest Cover Type")]
    pub title: String,
    #[schema(example = "forest-cover-type-1")]
    pub slug: Option<String>,
    pub short_description: Option<String>,
    pub description: Option<String>,
    pub terms_and_conditions: Option<String>,
    pub submission_guidelines: Option<String>,
    pub evaluation_details: Option<String>,
    pub leaderboard_description: Option<String>,
    /// Content hash of the logo image.
    pub image: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub creator_id: i32,
    pub published: bool,
    pub approved_by_admin: bool,
    pub is_registration_open: bool,
    pub anonymous_leaderboard: bool,
    pub is_docker_based: bool,
    pub remote_evaluation: bool,
    /// Content hash of the evaluation script.
    pub evaluation_script: String,
    pub queue: Option<String>,
    pub phases: Vec<PhaseResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChallengeResponse {
    pub fn new(m: challenge::Model, phases: Vec<challenge_phase::Model>) -> Self {
        Self {
            id: m.id,
            title: m.title,
            slug: m.slug,
            short_description: m.short_description,
            description: m.description,
            terms_and_conditions: m.terms_and_conditions,
            submission_guidelines: m.submission_guidelines,
            evaluation_details: m.evaluation_details,
            leaderboard_description: m.leaderboard_description,
            image: m.image,
            start_date: m.start_date,
            end_date: m.end_date,
            creator_id: m.creator_id,
            published: m.published,
            approved_by_admin: m.approved_by_admin,
            is_registration_open: m.is_registration_open,
            anonymous_leaderboard: m.anonymous_leaderboard,
            is_docker_based: m.is_docker_based,
            remote_evaluation: m.remote_evaluation,
            evaluation_script: m.evaluation_script,
            queue: m.queue,
            phases: phases.into_iter().map(PhaseResponse::from).collect(),
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Everything a bundle import created.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ImportResponse {
    pub challenge: ChallengeResponse,
    pub phase_splits: Vec<PhaseSplitResponse>,
    pub leaderboard_ids: Vec<i32>,
    pub dataset_split_ids: Vec<i32>,
    /// Participant team created for the hosts, absent for docker-based challenges.
    pub host_participant_team_id: Option<i32>,
}

impl From<PersistedChallenge> for ImportResponse {
    fn from(p: PersistedChallenge) -> Self {
        Self {
            challenge: ChallengeResponse::new(p.challenge, p.phases),
            phase_splits: p.phase_splits.into_iter().map(Into::into).collect(),
            leaderboard_ids: p.leaderboards.iter().map(|l| l.id).collect(),
            dataset_split_ids: p.dataset_splits.iter().map(|s| s.id).collect(),
            host_participant_team_id: p.host_participant_team.map(|t| t.id),
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct EvaluationScriptResponse {
    pub challenge_id: i32,
    /// Hash of the script now in effect.
    pub evaluation_script: String,
    /// Hash of the script it replaced.
    pub previous_evaluation_script: String,
    pub changed: bool,
}
