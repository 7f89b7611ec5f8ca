//! Identity and reference data: departments, doctor profiles and patient
//! accounts.

pub mod departments;
pub mod doctors;
pub mod patients;

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::AccountStatus;
use crate::utils::error_chain_fmt;

#[derive(thiserror::Error)]
pub enum IdentityError {
    #[error("Username or email already exists")]
    Duplicate,
    #[error("{0}")]
    Invalid(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl std::fmt::Debug for IdentityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl From<sqlx::Error> for IdentityError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => IdentityError::Duplicate,
            e => IdentityError::UnexpectedError(
                anyhow::Error::new(e).context("Database query failed"),
            ),
        }
    }
}

/// Empty form fields are stored as NULL.
pub(crate) fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `ILIKE` pattern for a case-insensitive substring match.
pub(crate) fn contains_pattern(query: &str) -> String {
    format!("%{}%", query.trim())
}

pub(crate) fn required(field: &str, value: &str) -> Result<String, IdentityError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(IdentityError::Invalid(format!("{} is required.", field)));
    }
    Ok(value.to_string())
}

/// Moves a doctor or patient account through its lifecycle and returns the
/// resulting state.
#[tracing::instrument(name = "Changing account lifecycle", skip(pool, next))]
pub(crate) async fn transition_account(
    pool: &PgPool,
    table: &'static str,
    id: Uuid,
    next: impl FnOnce(AccountStatus) -> AccountStatus,
) -> Result<AccountStatus, IdentityError> {
    let current: Option<(bool,)> =
        sqlx::query_as(&format!("SELECT is_active FROM {table} WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?;
    let current = AccountStatus::from(current.ok_or(IdentityError::NotFound("Account"))?.0);
    let target = next(current);
    if target != current {
        sqlx::query(&format!("UPDATE {table} SET is_active = $1 WHERE id = $2"))
            .bind(target.is_active())
            .bind(id)
            .execute(pool)
            .await?;
        tracing::info!(from = ?current, to = ?target, "Account lifecycle changed");
    }
    Ok(target)
}
