//! Sample evaluation script for classification challenges.
//!
//! Both CSV files carry a header row and two columns: a row ID and a label.
//! Predictions are left-joined onto the ground truth by ID, then scored with
//! accuracy and support-weighted precision, recall and F1.

pub mod error;
pub mod metrics;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use common::{EvaluationOutput, MetricMap, SubmissionMetadata};
use tracing::{debug, info};

pub use error::EvaluationError;
pub use metrics::{ClassificationReport, classification_report};

/// Phase codename scored by the sample script, and the split it reports on.
pub const DEFAULT_PHASE: &str = "challenge";

/// Which dataset split each phase reports its metrics under.
#[derive(Debug, Clone)]
pub struct Evaluator {
    splits: BTreeMap<String, String>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new().with_phase(DEFAULT_PHASE, DEFAULT_PHASE)
    }
}

impl Evaluator {
    /// An evaluator that scores no phases until some are registered.
    pub fn new() -> Self {
        Self {
            splits: BTreeMap::new(),
        }
    }

    pub fn with_phase(mut self, phase_codename: &str, split_codename: &str) -> Self {
        self.splits
            .insert(phase_codename.to_string(), split_codename.to_string());
        self
    }

    /// Score `submission_file` against `annotation_file` for one phase.
    pub fn evaluate(
        &self,
        annotation_file: &Path,
        submission_file: &Path,
        phase_codename: &str,
        metadata: &SubmissionMetadata,
    ) -> Result<EvaluationOutput, EvaluationError> {
        let split = self
            .splits
            .get(phase_codename)
            .ok_or_else(|| EvaluationError::UnknownPhase(phase_codename.to_string()))?;

        info!(
            submission_id = metadata.id,
            participant_team = metadata.participant_team,
            phase = phase_codename,
            "Starting evaluation"
        );
        debug!(?metadata, "Submission metadata");

        let truth = read_labels(annotation_file)?;
        if truth.is_empty() {
            return Err(EvaluationError::EmptyGroundTruth(
                annotation_file.to_path_buf(),
            ));
        }
        let submitted = read_labels(submission_file)?;
        let predictions = index_predictions(submission_file, &submitted)?;

        let joined: Vec<(String, Option<String>)> = truth
            .into_iter()
            .map(|(id, label)| {
                let predicted = predictions.get(id.as_str()).map(|p| p.to_string());
                (label, predicted)
            })
            .collect();

        let missing = joined.iter().filter(|(_, p)| p.is_none()).count();
        let truth_labels: HashSet<&str> = joined.iter().map(|(t, _)| t.as_str()).collect();
        let predicted_labels: HashSet<&str> = predictions.values().copied().collect();
        info!(
            missing,
            labels_identical = truth_labels == predicted_labels,
            "Joined predictions onto ground truth"
        );

        let report = classification_report(&joined);
        info!(
            accuracy = report.accuracy,
            precision = report.precision,
            recall = report.recall,
            f1 = report.f1,
            "Completed evaluation"
        );

        Ok(EvaluationOutput::single_split(split, report_metrics(&report)))
    }
}

/// Metric names as they appear on the leaderboard schema.
pub fn report_metrics(report: &ClassificationReport) -> MetricMap {
    let mut metrics = MetricMap::new();
    metrics.insert("Accuracy".into(), report.accuracy);
    metrics.insert("Precision".into(), report.precision);
    metrics.insert("Recall".into(), report.recall);
    metrics.insert("F1-Score".into(), report.f1);
    metrics
}

/// Read `(id, label)` rows from the first two columns of a CSV file.
fn read_labels(path: &Path) -> Result<Vec<(String, String)>, EvaluationError> {
    let csv_err = |source| EvaluationError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b',')
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(csv_err)?;
        match (record.get(0), record.get(1)) {
            (Some(id), Some(label)) => rows.push((id.to_string(), label.to_string())),
            _ => {
                return Err(EvaluationError::MissingColumn {
                    path: path.to_path_buf(),
                    row: index + 2,
                    found: record.len(),
                });
            }
        }
    }
    Ok(rows)
}

fn index_predictions<'a>(
    path: &Path,
    rows: &'a [(String, String)],
) -> Result<HashMap<&'a str, &'a str>, EvaluationError> {
    let mut index = HashMap::with_capacity(rows.len());
    for (id, label) in rows {
        if index.insert(id.as_str(), label.as_str()).is_some() {
            return Err(EvaluationError::DuplicateId {
                path: path.to_path_buf(),
                id: id.clone(),
            });
        }
    }
    Ok(index)
}
