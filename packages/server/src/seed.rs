use sea_orm::*;
use sea_query::{Index, IndexCreateStatement, OnConflict, PostgresQueryBuilder};
use tracing::info;

use crate::entity::{role, role_permission, submission};

/// Default roles seeded on startup.
const DEFAULT_ROLES: &[&str] = &[role::ADMIN_ROLE, "evaluator", role::DEFAULT_ROLE];

/// Default role-permission mappings seeded on startup.
const DEFAULT_MAPPINGS: &[(&str, &str)] = &[
    // Admin: approves challenges and sees every leaderboard
    (role::ADMIN_ROLE, "challenge:approve"),
    (role::ADMIN_ROLE, "submission:report_result"),
    // Evaluation workers
    ("evaluator", "submission:report_result"),
];

/// Insert each model unless it conflicts on `conflict`, returning how many
/// rows were new.
async fn insert_missing<A>(
    db: &DatabaseConnection,
    models: impl IntoIterator<Item = A>,
    conflict: OnConflict,
) -> Result<u32, DbErr>
where
    A: ActiveModelTrait + Send,
    <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
{
    let mut inserted = 0u32;
    for model in models {
        match A::Entity::insert(model)
            .on_conflict(conflict.clone())
            .exec_without_returning(db)
            .await
        {
            Ok(_) => inserted += 1,
            Err(DbErr::RecordNotInserted) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(inserted)
}

/// Seed the `role` and `role_permission` tables with defaults.
pub async fn seed_role_permissions(db: &DatabaseConnection) -> Result<(), DbErr> {
    let roles = DEFAULT_ROLES.iter().map(|&name| role::ActiveModel {
        name: Set(name.to_string()),
    });
    let inserted = insert_missing(
        db,
        roles,
        OnConflict::column(role::Column::Name).do_nothing().to_owned(),
    )
    .await?;
    if inserted > 0 {
        info!("Seeded {} new roles", inserted);
    }

    let mappings = DEFAULT_MAPPINGS
        .iter()
        .map(|&(role, permission)| role_permission::ActiveModel {
            role: Set(role.to_string()),
            permission: Set(permission.to_string()),
        });
    let inserted = insert_missing(
        db,
        mappings,
        OnConflict::columns([
            role_permission::Column::Role,
            role_permission::Column::Permission,
        ])
        .do_nothing()
        .to_owned(),
    )
    .await?;
    if inserted > 0 {
        info!("Seeded {} new role-permission mappings", inserted);
    }

    Ok(())
}

async fn create_index(db: &DatabaseConnection, name: &str, stmt: &IndexCreateStatement) {
    match db.execute_unprepared(&stmt.to_string(PostgresQueryBuilder)).await {
        Ok(_) => info!("Ensured index {} exists", name),
        Err(e) => tracing::warn!("Failed to create index {}: {}", name, e),
    }
}

/// Ensure composite indexes that schema sync does not create.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Submission caps count a team's submissions to a phase.
    let name = "idx_submission_team_phase_created";
    let stmt = Index::create()
        .if_not_exists()
        .name(name)
        .table(submission::Entity)
        .col(submission::Column::ParticipantTeamId)
        .col(submission::Column::ChallengePhaseId)
        .col(submission::Column::CreatedAt)
        .to_owned();
    create_index(db, name, &stmt).await;

    Ok(())
}
