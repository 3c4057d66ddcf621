pub mod evaluation;
pub mod storage;
pub mod visibility;

pub use evaluation::{EvaluationOutput, MetricMap, SubmissionMetadata};
pub use visibility::Visibility;
