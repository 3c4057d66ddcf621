//! Validation of a resolved bundle and the id tables that link its records.

use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;

use common::Visibility;

use crate::entity::{challenge_phase, challenge_phase_split, dataset_split, leaderboard};

use super::error::ImportError;
use super::manifest::ResolvedBundle;

pub const TITLE_MAX_LEN: usize = 100;

/// Manifest-local id to persisted id, for one entity type.
pub struct IdMap<E> {
    kind: &'static str,
    ids: HashMap<i64, i32>,
    _entity: PhantomData<E>,
}

impl<E> IdMap<E> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            ids: HashMap::new(),
            _entity: PhantomData,
        }
    }

    pub fn insert(&mut self, manifest_id: i64, persisted_id: i32) {
        self.ids.insert(manifest_id, persisted_id);
    }

    pub fn resolve(&self, manifest_id: i64) -> Result<i32, ImportError> {
        self.ids
            .get(&manifest_id)
            .copied()
            .ok_or(ImportError::UnknownReference {
                kind: self.kind,
                id: manifest_id,
            })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

pub type LeaderboardIds = IdMap<leaderboard::Entity>;
pub type PhaseIds = IdMap<challenge_phase::Entity>;
pub type SplitIds = IdMap<dataset_split::Entity>;

/// One phase-split row before its references are translated.
#[derive(Debug, Clone)]
pub struct PhaseSplitPlan {
    pub challenge_phase_id: i64,
    pub leaderboard_id: i64,
    pub dataset_split_id: i64,
    pub visibility: Visibility,
    pub decimal_precision: i32,
    pub order_descending: bool,
}

/// A bundle that passed validation and is ready to persist.
#[derive(Debug, Clone)]
pub struct ImportPlan {
    pub bundle: ResolvedBundle,
    pub phase_splits: Vec<PhaseSplitPlan>,
}

impl ImportPlan {
    pub fn title(&self) -> &str {
        self.bundle.manifest.title.trim()
    }
}

/// Check everything that can be checked without touching the database.
///
/// Every phase-split reference is verified against the ids the manifest
/// declares, so persistence never fails halfway on a dangling reference.
pub fn assemble(bundle: ResolvedBundle) -> Result<ImportPlan, ImportError> {
    let manifest = &bundle.manifest;

    let title = manifest.title.trim();
    if title.is_empty() || title.chars().count() > TITLE_MAX_LEN {
        return Err(ImportError::validation(
            "title",
            format!("Title must be 1-{TITLE_MAX_LEN} characters"),
        ));
    }
    if let (Some(start), Some(end)) = (manifest.start_date, manifest.end_date)
        && start > end
    {
        return Err(ImportError::validation(
            "end_date",
            "End date must not precede start date",
        ));
    }

    let leaderboard_ids = unique_ids(
        "leaderboard",
        manifest.leaderboard.iter().map(|l| l.id),
    )?;
    for lb in &manifest.leaderboard {
        validate_schema(lb.id, &lb.schema)?;
    }

    let phase_ids = unique_ids(
        "challenge_phases",
        manifest.challenge_phases.iter().map(|p| p.id),
    )?;
    let mut codenames = HashSet::new();
    for phase in &manifest.challenge_phases {
        if phase.name.trim().is_empty() {
            return Err(ImportError::validation(
                "challenge_phases.name",
                format!("Phase {} has an empty name", phase.id),
            ));
        }
        if phase.codename.trim().is_empty() {
            return Err(ImportError::validation(
                "challenge_phases.codename",
                format!("Phase {} has an empty codename", phase.id),
            ));
        }
        if !codenames.insert(phase.codename.as_str()) {
            return Err(ImportError::validation(
                "challenge_phases.codename",
                format!("Duplicate phase codename '{}'", phase.codename),
            ));
        }
        let caps = [
            phase.max_submissions_per_day,
            phase.max_submissions_per_month,
            phase.max_submissions,
            phase.max_concurrent_submissions_allowed,
        ];
        if caps.iter().flatten().any(|cap| *cap < 0) {
            return Err(ImportError::validation(
                "challenge_phases",
                format!("Phase {} has a negative submission cap", phase.id),
            ));
        }
    }

    let split_ids = unique_ids(
        "dataset_splits",
        manifest.dataset_splits.iter().map(|s| s.id),
    )?;
    let mut split_names = HashSet::new();
    for split in &manifest.dataset_splits {
        if !split_names.insert(split.name.as_str()) {
            return Err(ImportError::validation(
                "dataset_splits.name",
                format!("dataset split with this name '{}' already exists", split.name),
            ));
        }
    }

    let mut phase_splits = Vec::with_capacity(manifest.challenge_phase_splits.len());
    for entry in &manifest.challenge_phase_splits {
        check_reference(&phase_ids, "challenge_phase", entry.challenge_phase_id)?;
        check_reference(&leaderboard_ids, "leaderboard", entry.leaderboard_id)?;
        check_reference(&split_ids, "dataset_split", entry.dataset_split_id)?;

        let visibility = Visibility::from_code(entry.visibility).ok_or_else(|| {
            ImportError::validation(
                "challenge_phase_splits.visibility",
                format!("\"{}\" is not a valid choice", entry.visibility),
            )
        })?;
        let decimal_precision = entry
            .leaderboard_decimal_precision
            .unwrap_or(challenge_phase_split::DEFAULT_DECIMAL_PRECISION);
        if !(0..=challenge_phase_split::MAX_DECIMAL_PRECISION).contains(&decimal_precision) {
            return Err(ImportError::validation(
                "challenge_phase_splits.leaderboard_decimal_precision",
                format!(
                    "Precision must be between 0 and {}",
                    challenge_phase_split::MAX_DECIMAL_PRECISION
                ),
            ));
        }

        phase_splits.push(PhaseSplitPlan {
            challenge_phase_id: entry.challenge_phase_id,
            leaderboard_id: entry.leaderboard_id,
            dataset_split_id: entry.dataset_split_id,
            visibility,
            decimal_precision,
            order_descending: entry.is_leaderboard_order_descending.unwrap_or(true),
        });
    }

    Ok(ImportPlan {
        bundle,
        phase_splits,
    })
}

fn unique_ids(
    field: &str,
    ids: impl Iterator<Item = i64>,
) -> Result<HashSet<i64>, ImportError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ImportError::validation(
                format!("{field}.id"),
                format!("Duplicate id {id}"),
            ));
        }
    }
    Ok(seen)
}

fn check_reference(ids: &HashSet<i64>, kind: &'static str, id: i64) -> Result<(), ImportError> {
    if ids.contains(&id) {
        Ok(())
    } else {
        Err(ImportError::UnknownReference { kind, id })
    }
}

/// A leaderboard schema lists its metric labels and optionally the one to
/// rank by, which must be among them.
fn validate_schema(id: i64, schema: &serde_json::Value) -> Result<(), ImportError> {
    let invalid = |message: &str| {
        ImportError::validation(format!("leaderboard.{id}.schema"), message.to_string())
    };

    let labels = schema
        .get("labels")
        .and_then(|l| l.as_array())
        .ok_or_else(|| invalid("Schema must contain a 'labels' list"))?;
    if labels.is_empty() || !labels.iter().all(|l| l.is_string()) {
        return Err(invalid("'labels' must be a non-empty list of strings"));
    }
    if let Some(order_by) = schema.get("default_order_by") {
        let known = order_by
            .as_str()
            .is_some_and(|o| labels.iter().any(|l| l.as_str() == Some(o)));
        if !known {
            return Err(invalid("'default_order_by' must be one of the labels"));
        }
    }
    Ok(())
}
