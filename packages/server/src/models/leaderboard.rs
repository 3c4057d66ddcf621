use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::{EvaluationOutput, MetricMap, Visibility};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::extractors::json::Validate;

#[derive(Serialize, utoipa::ToSchema, Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub submission_id: i32,
    pub participant_team_id: i32,
    pub team_name: String,
    /// Metric values rounded to the split's precision.
    pub result: BTreeMap<String, f64>,
    /// Value of the ranking metric, if the entry has it.
    pub filtering_score: Option<f64>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct LeaderboardResponse {
    pub phase_split_id: i32,
    pub visibility: Visibility,
    #[schema(example = json!(["Accuracy", "F1-Score"]))]
    pub labels: Vec<String>,
    #[schema(example = "Accuracy")]
    pub order_by: Option<String>,
    pub descending: bool,
    pub entries: Vec<LeaderboardEntry>,
}

/// Output reported by an evaluation worker for one submission.
///
/// A successful run carries `result` (one grouping per dataset split) and
/// optionally `submission_result`; a failed run carries `error`.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct ReportResultRequest {
    #[serde(default)]
    pub result: Vec<BTreeMap<String, MetricMap>>,
    #[serde(default)]
    pub submission_result: MetricMap,
    /// Error document when evaluation failed.
    #[schema(value_type = Option<Object>)]
    pub error: Option<serde_json::Value>,
}

impl ReportResultRequest {
    pub fn output(&self) -> EvaluationOutput {
        EvaluationOutput {
            result: self.result.clone(),
            submission_result: self.submission_result.clone(),
        }
    }
}

impl Validate for ReportResultRequest {
    fn validate(&self) -> Result<(), AppError> {
        if self.result.is_empty() && self.error.is_none() {
            return Err(AppError::Validation(
                "Either an evaluation output or an error is required".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ReportResultResponse {
    pub submission_id: i32,
    #[schema(example = "finished")]
    pub status: String,
    /// Ids of the leaderboard rows written.
    pub leaderboard_data_ids: Vec<i32>,
}
