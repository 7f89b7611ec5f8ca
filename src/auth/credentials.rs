use anyhow::Context;
use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use secrecy::{ExposeSecret, Secret};
use sqlx::{PgPool, Row};

use super::gate::{Principal, Role};
use crate::telemetry::spawn_blocking_with_tracing;

pub struct Credentials {
    pub username: String,
    pub password: Secret<String>,
    pub role: Role,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials(#[source] anyhow::Error),
    #[error("Your account has been deactivated")]
    Deactivated,
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

struct StoredCredentials {
    user_id: uuid::Uuid,
    username: String,
    password_hash: Secret<String>,
    is_active: bool,
}

#[tracing::instrument(name = "Validate credentials", skip(credentials, pool), fields(role = %credentials.role))]
pub async fn validate_credentials(
    credentials: Credentials,
    pool: &PgPool,
) -> Result<Principal, AuthError> {
    let mut stored = None;
    // Verify against a dummy hash when the user is unknown so both paths cost the same
    let mut expected_password_hash = Secret::new(
        "$argon2id$v=19$m=15000,t=2,p=1$\
        gZiV/M1gPc22ElAH/Jh1Hw$\
        CWOrkoo7oJBQ/iyh7uJ0LO2aLEfrHwTWllSAxT0zRno"
            .to_string(),
    );

    if let Some(found) =
        get_stored_credentials(&credentials.username, credentials.role, pool).await?
    {
        expected_password_hash = found.password_hash.clone();
        stored = Some(found);
    }

    // Hashing takes a few milliseconds of CPU, keep it off the async executor
    spawn_blocking_with_tracing(move || {
        verify_password_hash(expected_password_hash, credentials.password)
    })
    .await
    .context("Failed to spawn a blocking task")??;

    let stored = stored
        .ok_or_else(|| anyhow::anyhow!("Unknown username"))
        .map_err(AuthError::InvalidCredentials)?;

    if credentials.role.has_lifecycle() && !stored.is_active {
        return Err(AuthError::Deactivated);
    }

    Ok(Principal {
        id: stored.user_id,
        role: credentials.role,
        username: stored.username,
    })
}

#[tracing::instrument(
    name = "Verify password hash",
    skip(expected_password_hash, password_candidate)
)]
fn verify_password_hash(
    expected_password_hash: Secret<String>,
    password_candidate: Secret<String>,
) -> Result<(), AuthError> {
    let expected_password_hash = PasswordHash::new(expected_password_hash.expose_secret())
        .context("Failed to parse hash in PHC string format.")?;

    Argon2::default()
        .verify_password(
            password_candidate.expose_secret().as_bytes(),
            &expected_password_hash,
        )
        .context("Invalid password.")
        .map_err(AuthError::InvalidCredentials)
}

/// Salted argon2id hash in PHC string format.
pub fn compute_password_hash(password: Secret<String>) -> Result<Secret<String>, anyhow::Error> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let password_hash = Argon2::new(
        Algorithm::Argon2id,
        Version::V0x13,
        Params::new(15000, 2, 1, None).context("Invalid argon2 parameters")?,
    )
    .hash_password(password.expose_secret().as_bytes(), &salt)
    .context("Failed to hash password")?
    .to_string();
    Ok(Secret::new(password_hash))
}

#[tracing::instrument(name = "Get stored credentials", skip(username, pool))]
async fn get_stored_credentials(
    username: &str,
    role: Role,
    pool: &PgPool,
) -> Result<Option<StoredCredentials>, anyhow::Error> {
    let sql = match role {
        Role::Admin => "SELECT id, username, password_hash, TRUE AS is_active FROM admin WHERE username = $1",
        Role::Doctor => "SELECT id, username, password_hash, is_active FROM doctor WHERE username = $1",
        Role::Patient => "SELECT id, username, password_hash, is_active FROM patient WHERE username = $1",
    };
    let row = sqlx::query(sql)
        .bind(username)
        .fetch_optional(pool)
        .await
        .context("Failed to query credentials from db")?;

    row.map(|row| -> Result<StoredCredentials, sqlx::Error> {
        Ok(StoredCredentials {
            user_id: row.try_get("id")?,
            username: row.try_get("username")?,
            password_hash: Secret::new(row.try_get("password_hash")?),
            is_active: row.try_get("is_active")?,
        })
    })
    .transpose()
    .context("Malformed credentials row")
}
