//! The YAML manifest at the heart of a challenge bundle, and resolution of
//! the files it references.

use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use tracing::debug;

use super::archive::ExtractedBundle;
use super::error::ImportError;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

#[derive(Debug, Clone, Deserialize)]
pub struct ChallengeManifest {
    pub title: String,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub evaluation_details: Option<String>,
    #[serde(default)]
    pub terms_and_conditions: Option<String>,
    #[serde(default)]
    pub submission_guidelines: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    pub evaluation_script: String,
    #[serde(default, deserialize_with = "optional_datetime")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "optional_datetime")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub remote_evaluation: bool,
    #[serde(default)]
    pub is_docker_based: bool,
    #[serde(default)]
    pub leaderboard_description: Option<String>,
    #[serde(default)]
    pub anonymous_leaderboard: bool,
    #[serde(default)]
    pub allowed_email_domains: Vec<String>,
    #[serde(default)]
    pub blocked_email_domains: Vec<String>,
    #[serde(default)]
    pub banned_email_ids: Vec<String>,
    #[serde(default)]
    pub max_concurrent_submission_evaluation: Option<i32>,
    #[serde(default)]
    pub challenge_phases: Vec<PhaseManifest>,
    #[serde(default)]
    pub leaderboard: Vec<LeaderboardManifest>,
    #[serde(default)]
    pub dataset_splits: Vec<DatasetSplitManifest>,
    #[serde(default)]
    pub challenge_phase_splits: Vec<PhaseSplitManifest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhaseManifest {
    pub id: i64,
    pub name: String,
    pub codename: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub test_annotation_file: Option<String>,
    #[serde(default, deserialize_with = "optional_datetime")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "optional_datetime")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub leaderboard_public: bool,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub is_submission_public: bool,
    #[serde(default)]
    pub max_submissions_per_day: Option<i32>,
    #[serde(default)]
    pub max_submissions_per_month: Option<i32>,
    #[serde(default)]
    pub max_submissions: Option<i32>,
    #[serde(default)]
    pub max_concurrent_submissions_allowed: Option<i32>,
    #[serde(default)]
    pub allowed_email_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeaderboardManifest {
    pub id: i64,
    pub schema: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetSplitManifest {
    pub id: i64,
    pub name: String,
    pub codename: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhaseSplitManifest {
    pub challenge_phase_id: i64,
    pub leaderboard_id: i64,
    pub dataset_split_id: i64,
    #[serde(default = "default_visibility")]
    pub visibility: i64,
    #[serde(default)]
    pub leaderboard_decimal_precision: Option<i32>,
    #[serde(default)]
    pub is_leaderboard_order_descending: Option<bool>,
}

fn default_visibility() -> i64 {
    common::Visibility::Public.code().into()
}

/// Accept RFC 3339 or `YYYY-MM-DD HH:MM:SS` (read as UTC).
fn optional_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_datetime(s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date '{s}'"))),
    }
}

pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Phase description and annotation contents, in manifest order.
#[derive(Debug, Clone)]
pub struct ResolvedPhase {
    pub description: Option<String>,
    pub annotation: Option<Vec<u8>>,
}

/// A manifest with every referenced file loaded into memory.
///
/// Long-form text fields hold HTML content, or `None` when the manifest value
/// did not name an existing `.html` file.
#[derive(Debug, Clone)]
pub struct ResolvedBundle {
    pub manifest: ChallengeManifest,
    pub description: Option<String>,
    pub evaluation_details: Option<String>,
    pub terms_and_conditions: Option<String>,
    pub submission_guidelines: Option<String>,
    pub image: Option<Vec<u8>>,
    pub evaluation_script: Vec<u8>,
    pub phases: Vec<ResolvedPhase>,
}

/// Parse the manifest and load its files on the blocking pool.
pub async fn load(bundle: &ExtractedBundle) -> Result<ResolvedBundle, ImportError> {
    let manifest_path = bundle.manifest_path();
    let base = bundle.manifest_dir();
    tokio::task::spawn_blocking(move || load_blocking(&manifest_path, &base))
        .await
        .map_err(|e| ImportError::Io(std::io::Error::other(e)))?
}

pub fn load_blocking(manifest_path: &Path, base: &Path) -> Result<ResolvedBundle, ImportError> {
    let raw = std::fs::read_to_string(manifest_path)?;
    let manifest: ChallengeManifest = serde_yaml::from_str(&raw)?;
    resolve(manifest, base)
}

fn resolve(manifest: ChallengeManifest, base: &Path) -> Result<ResolvedBundle, ImportError> {
    let evaluation_script = read_required(base, &manifest.evaluation_script)?;

    let image = manifest
        .image
        .as_deref()
        .filter(|name| has_extension(name, IMAGE_EXTENSIONS))
        .and_then(|name| existing_file(base, name))
        .map(std::fs::read)
        .transpose()?;

    let mut phases = Vec::with_capacity(manifest.challenge_phases.len());
    for phase in &manifest.challenge_phases {
        let annotation = match phase.test_annotation_file.as_deref() {
            Some(name) if !name.trim().is_empty() => Some(read_required(base, name)?),
            _ => None,
        };
        phases.push(ResolvedPhase {
            description: read_html(base, phase.description.as_deref())?,
            annotation,
        });
    }

    Ok(ResolvedBundle {
        description: read_html(base, manifest.description.as_deref())?,
        evaluation_details: read_html(base, manifest.evaluation_details.as_deref())?,
        terms_and_conditions: read_html(base, manifest.terms_and_conditions.as_deref())?,
        submission_guidelines: read_html(base, manifest.submission_guidelines.as_deref())?,
        image,
        evaluation_script,
        phases,
        manifest,
    })
}

/// Content of the `.html` file `value` names, if it exists.
fn read_html(base: &Path, value: Option<&str>) -> Result<Option<String>, ImportError> {
    let Some(path) = value
        .filter(|v| has_extension(v, &["html"]))
        .and_then(|v| existing_file(base, v))
    else {
        return Ok(None);
    };
    let bytes = std::fs::read(&path)?;
    String::from_utf8(bytes).map(Some).map_err(|_| {
        ImportError::validation(
            value.unwrap_or_default(),
            "HTML file is not valid UTF-8",
        )
    })
}

fn read_required(base: &Path, name: &str) -> Result<Vec<u8>, ImportError> {
    let path = existing_file(base, name).ok_or_else(|| ImportError::MissingFile(name.to_string()))?;
    debug!(file = name, "Loading bundle file");
    Ok(std::fs::read(path)?)
}

/// `base/name` if it is a regular file inside `base`.
fn existing_file(base: &Path, name: &str) -> Option<PathBuf> {
    let relative = Path::new(name.trim());
    let contained = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !contained {
        return None;
    }
    let path = base.join(relative);
    path.is_file().then_some(path)
}

fn has_extension(name: &str, extensions: &[&str]) -> bool {
    Path::new(name.trim())
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
}
