//! Classification metrics over paired label sequences.
//!
//! Weighted averages follow the usual definition: per-label scores weighted by
//! the label's support in the ground truth. A label that is never predicted
//! has precision 0. A missing prediction (`None`) never matches.

use std::collections::BTreeMap;

#[derive(Debug, Default, Clone, Copy)]
struct LabelCounts {
    true_positive: usize,
    predicted: usize,
    support: usize,
}

/// Scores for one evaluation run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationReport {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

pub fn classification_report(pairs: &[(String, Option<String>)]) -> ClassificationReport {
    if pairs.is_empty() {
        return ClassificationReport {
            accuracy: 0.0,
            precision: 0.0,
            recall: 0.0,
            f1: 0.0,
        };
    }

    let mut counts: BTreeMap<&str, LabelCounts> = BTreeMap::new();
    let mut correct = 0usize;

    for (truth, prediction) in pairs {
        counts.entry(truth.as_str()).or_default().support += 1;
        if let Some(pred) = prediction {
            let entry = counts.entry(pred.as_str()).or_default();
            entry.predicted += 1;
            if pred == truth {
                entry.true_positive += 1;
                correct += 1;
            }
        }
    }

    let total = pairs.len() as f64;
    let (mut precision, mut recall, mut f1) = (0.0, 0.0, 0.0);

    for c in counts.values().filter(|c| c.support > 0) {
        let weight = c.support as f64 / total;
        let p = ratio(c.true_positive, c.predicted);
        let r = ratio(c.true_positive, c.support);
        let f = if p + r > 0.0 { 2.0 * p * r / (p + r) } else { 0.0 };
        precision += weight * p;
        recall += weight * r;
        f1 += weight * f;
    }

    ClassificationReport {
        accuracy: correct as f64 / total,
        precision,
        recall,
        f1,
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}
