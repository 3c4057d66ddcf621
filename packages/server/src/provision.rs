//! One-shot provisioning of a host account and its challenge.
//!
//! Safe to re-run for the account: the user, its email address, the host
//! team and the membership are reused when they already exist. Each run
//! imports the bundle as a new challenge.

use std::path::{Path, PathBuf};

use chrono::Utc;
use sea_orm::*;
use thiserror::Error;
use tracing::{info, instrument};

use crate::entity::{challenge, challenge_host, challenge_host_team, email_address, role, user};
use crate::importer::{ChallengeImporter, ImportError, PersistedChallenge};
use crate::utils::hash;

/// Location of the bundle relative to the base directory.
pub const DEFAULT_ARCHIVE: &str = "g2net_challenge/challenge_config.zip";

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Failed to read bundle {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Email address {0} belongs to another account")]
    EmailTaken(String),
    #[error("Password hash error: {0}")]
    Password(String),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error("Database error: {0}")]
    Db(#[from] DbErr),
}

#[derive(Debug, Clone)]
pub struct ProvisionOptions {
    pub email: String,
    pub username: String,
    pub password: String,
    pub team_name: String,
    pub archive: PathBuf,
}

impl ProvisionOptions {
    pub fn with_base_dir(base_dir: impl AsRef<Path>) -> Self {
        Self {
            archive: base_dir.as_ref().join(DEFAULT_ARCHIVE),
            ..Self::default()
        }
    }
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            email: "hack@g2net.eu".into(),
            username: "g2net_hack".into(),
            password: "qwerty12345".into(),
            team_name: "g2net_hack".into(),
            archive: PathBuf::from(DEFAULT_ARCHIVE),
        }
    }
}

/// Rows the provisioning run created or reused.
#[derive(Debug)]
pub struct Provisioned {
    pub user: user::Model,
    pub host_team: challenge_host_team::Model,
    pub challenge: PersistedChallenge,
}

async fn ensure_user<C: ConnectionTrait>(
    db: &C,
    options: &ProvisionOptions,
) -> Result<user::Model, ProvisionError> {
    if let Some(existing) = user::Entity::find()
        .filter(user::Column::Username.eq(&options.username))
        .one(db)
        .await?
    {
        return Ok(existing);
    }

    let password = hash::hash_password(&options.password)
        .map_err(|e| ProvisionError::Password(e.to_string()))?;
    let created = user::ActiveModel {
        username: Set(options.username.clone()),
        password: Set(password),
        role: Set(role::ADMIN_ROLE.to_string()),
        is_staff: Set(true),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    info!(user_id = created.id, username = %created.username, "Created host user");
    Ok(created)
}

async fn ensure_verified_email<C: ConnectionTrait>(
    db: &C,
    user: &user::Model,
    email: &str,
) -> Result<(), ProvisionError> {
    let email = email.to_lowercase();
    let existing = email_address::Entity::find()
        .filter(email_address::Column::Email.eq(&email))
        .one(db)
        .await?;

    match existing {
        Some(address) if address.user_id != user.id => Err(ProvisionError::EmailTaken(email)),
        Some(address) if address.verified => Ok(()),
        Some(address) => {
            let mut active: email_address::ActiveModel = address.into();
            active.verified = Set(true);
            active.update(db).await?;
            Ok(())
        }
        None => {
            email_address::ActiveModel {
                user_id: Set(user.id),
                email: Set(email),
                verified: Set(true),
                is_primary: Set(true),
                created_at: Set(Utc::now()),
                ..Default::default()
            }
            .insert(db)
            .await?;
            Ok(())
        }
    }
}

async fn ensure_host_team<C: ConnectionTrait>(
    db: &C,
    user: &user::Model,
    team_name: &str,
) -> Result<challenge_host_team::Model, DbErr> {
    let team = match challenge_host_team::Entity::find()
        .filter(challenge_host_team::Column::TeamName.eq(team_name))
        .one(db)
        .await?
    {
        Some(team) => team,
        None => {
            challenge_host_team::ActiveModel {
                team_name: Set(team_name.to_string()),
                team_url: Set(None),
                created_by: Set(user.id),
                created_at: Set(Utc::now()),
                ..Default::default()
            }
            .insert(db)
            .await?
        }
    };

    let membership = challenge_host::Entity::find()
        .filter(challenge_host::Column::TeamId.eq(team.id))
        .filter(challenge_host::Column::UserId.eq(user.id))
        .count(db)
        .await?;
    if membership == 0 {
        challenge_host::ActiveModel {
            user_id: Set(user.id),
            team_id: Set(team.id),
            status: Set(challenge_host::STATUS_SELF.to_string()),
            permissions: Set(challenge_host::PERMISSION_ADMIN.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    Ok(team)
}

/// Create the host account and import its approved challenge in one
/// transaction.
#[instrument(skip(db, importer, options), fields(username = %options.username, archive = %options.archive.display()))]
pub async fn provision(
    db: &DatabaseConnection,
    importer: &ChallengeImporter,
    options: &ProvisionOptions,
) -> Result<Provisioned, ProvisionError> {
    let archive = tokio::fs::read(&options.archive)
        .await
        .map_err(|source| ProvisionError::Read {
            path: options.archive.clone(),
            source,
        })?;
    let prepared = importer.prepare(archive).await?;

    let txn = db.begin().await?;

    let user = ensure_user(&txn, options).await?;
    ensure_verified_email(&txn, &user, &options.email).await?;
    let host_team = ensure_host_team(&txn, &user, &options.team_name).await?;

    let mut persisted = importer.persist(&txn, &prepared, &host_team).await?;

    let mut active: challenge::ActiveModel = persisted.challenge.clone().into();
    active.approved_by_admin = Set(true);
    persisted.challenge = active.update(&txn).await?;

    txn.commit().await?;

    info!(
        challenge_id = persisted.challenge.id,
        host_team_id = host_team.id,
        "Provisioned challenge"
    );
    importer.notify(&persisted).await;

    Ok(Provisioned {
        user,
        host_team,
        challenge: persisted,
    })
}
