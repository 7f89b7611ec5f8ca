use anyhow::Context;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::compute_password_hash;
use crate::config::BootstrapSettings;
use crate::directory::departments::DEFAULT_DEPARTMENTS;
use crate::telemetry::spawn_blocking_with_tracing;

/// Applies pending migrations and makes sure the default administrator and
/// departments exist. Safe to run on every start.
#[tracing::instrument(name = "Initialising database", skip(pool, settings))]
pub async fn init_database(pool: &PgPool, settings: &BootstrapSettings) -> Result<(), anyhow::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("Failed to migrate the database")?;

    ensure_admin(pool, settings).await?;
    ensure_departments(pool).await?;
    Ok(())
}

async fn ensure_admin(pool: &PgPool, settings: &BootstrapSettings) -> Result<(), anyhow::Error> {
    let existing = sqlx::query("SELECT 1 FROM admin WHERE username = $1")
        .bind(&settings.admin_username)
        .fetch_optional(pool)
        .await
        .context("Failed to look up the default admin")?;
    if existing.is_some() {
        return Ok(());
    }

    let password = settings.admin_password.clone();
    let password_hash = spawn_blocking_with_tracing(move || compute_password_hash(password))
        .await
        .context("Failed to spawn a blocking task")??;

    sqlx::query(
        r#"
        INSERT INTO admin (id, username, password_hash, email)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&settings.admin_username)
    .bind(password_hash.expose_secret())
    .bind(&settings.admin_email)
    .execute(pool)
    .await
    .context("Failed to create the default admin")?;
    tracing::info!(username = %settings.admin_username, "Created default admin");
    Ok(())
}

async fn ensure_departments(pool: &PgPool) -> Result<(), anyhow::Error> {
    for (name, description) in DEFAULT_DEPARTMENTS {
        sqlx::query(
            r#"
            INSERT INTO department (id, name, description)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(description)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to seed department {}", name))?;
    }
    Ok(())
}
