//! The verified-email gate.
//!
//! Anonymous requests pass; authentication is enforced by the extractors
//! that need it. An authenticated principal passes when the deployment does
//! not require verification, or when it owns at least one verified address.

use axum::{extract::FromRequestParts, http::request::Parts};
use sea_orm::*;

use crate::entity::email_address;
use crate::error::AppError;
use crate::extractors::auth::{AuthUser, MaybeAuthUser};
use crate::state::AppState;

/// Outcome of the gate for an authenticated principal.
pub fn gate_allows(email_required: bool, has_verified_email: bool) -> bool {
    !email_required || has_verified_email
}

pub async fn has_verified_email<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<bool, DbErr> {
    let count = email_address::Entity::find()
        .filter(email_address::Column::UserId.eq(user_id))
        .filter(email_address::Column::Verified.eq(true))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Apply the gate to `principal`; `None` is an anonymous request.
pub async fn check<C: ConnectionTrait>(
    db: &C,
    email_required: bool,
    principal: Option<&AuthUser>,
) -> Result<(), AppError> {
    let Some(user) = principal else {
        return Ok(());
    };
    // Skip the lookup when the answer cannot change it.
    if !email_required {
        return Ok(());
    }
    if gate_allows(email_required, has_verified_email(db, user.user_id).await?) {
        Ok(())
    } else {
        tracing::debug!(user_id = user.user_id, "Verified-email gate denied request");
        Err(AppError::EmailNotVerified)
    }
}

/// An authenticated user that passed the gate.
pub struct VerifiedUser(pub AuthUser);

impl FromRequestParts<AppState> for VerifiedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        check(&state.db, state.config.account.email_required, Some(&user)).await?;
        Ok(VerifiedUser(user))
    }
}

/// A possibly anonymous caller that passed the gate.
pub struct Viewer(pub Option<AuthUser>);

impl FromRequestParts<AppState> for Viewer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let MaybeAuthUser(user) = MaybeAuthUser::from_request_parts(parts, state).await?;
        check(&state.db, state.config.account.email_required, user.as_ref()).await?;
        Ok(Viewer(user))
    }
}
