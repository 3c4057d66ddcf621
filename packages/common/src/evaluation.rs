use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Metric name to value, e.g. `{"Accuracy": 0.91}`.
pub type MetricMap = BTreeMap<String, f64>;

/// Document returned by a challenge evaluation script.
///
/// `result` holds one grouping per dataset split, keyed by the split codename.
/// `submission_result` holds the metrics shown to the participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct EvaluationOutput {
    pub result: Vec<BTreeMap<String, MetricMap>>,
    pub submission_result: MetricMap,
}

impl EvaluationOutput {
    /// Output for a phase scored on a single split, where the participant sees
    /// the same metrics as the leaderboard.
    pub fn single_split(split_codename: &str, metrics: MetricMap) -> Self {
        let mut grouping = BTreeMap::new();
        grouping.insert(split_codename.to_string(), metrics.clone());
        Self {
            result: vec![grouping],
            submission_result: metrics,
        }
    }

    /// Iterate over `(split codename, metrics)` pairs across all groupings.
    pub fn splits(&self) -> impl Iterator<Item = (&str, &MetricMap)> {
        self.result
            .iter()
            .flat_map(|grouping| grouping.iter().map(|(k, v)| (k.as_str(), v)))
    }
}

/// Submission details handed to an evaluation script alongside the two files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmissionMetadata {
    pub id: i32,
    pub status: String,
    pub challenge_phase: i32,
    pub participant_team: i32,
    #[serde(default)]
    pub participant_team_name: String,
    #[serde(default)]
    pub created_by: String,
    pub input_file: Option<String>,
    pub method_name: Option<String>,
    pub method_description: Option<String>,
    pub project_url: Option<String>,
    pub publication_url: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    pub submitted_at: Option<String>,
}
