use chrono::{Duration, Local, NaiveDate};
use hospital::auth::compute_password_hash;
use hospital::config::{get_configuration, DatabaseSettings};
use hospital::startup::Application;
use hospital::telemetry::{get_subscriber, init_subscriber};
use once_cell::sync::Lazy;
use secrecy::{ExposeSecret, Secret};
use sqlx::{Connection, Executor, PgConnection, PgPool};
use uuid::Uuid;

// Ensure that the `tracing` stack is only initialised once
static TRACING: Lazy<()> = Lazy::new(|| {
    let default_filter_level = "info".to_string();
    let subscriber_name = "test".to_string();
    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::stdout);
        init_subscriber(subscriber);
    } else {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::sink);
        init_subscriber(subscriber);
    }
});

pub struct TestUser {
    pub id: Uuid,
    pub username: String,
    pub password: String,
    pub role: &'static str,
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub db_pool: PgPool,
    pub api_client: reqwest::Client,
    pub admin: TestUser,
}

impl TestApp {
    pub async fn post_login(&self, username: &str, password: &str, role: &str) -> reqwest::Response {
        self.post_form(
            "/login",
            &serde_json::json!({
                "username": username,
                "password": password,
                "role": role,
            }),
        )
        .await
    }

    pub async fn login_as(&self, user: &TestUser) {
        let response = self.post_login(&user.username, &user.password, user.role).await;
        assert_eq!(303, response.status().as_u16());
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.api_client
            .get(&format!("{}{}", &self.address, path))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get_json(&self, path: &str) -> serde_json::Value {
        let response = self.get(path).await;
        assert_eq!(200, response.status().as_u16(), "GET {} failed", path);
        response.json().await.expect("Failed to parse response.")
    }

    pub async fn post_form<Body>(&self, path: &str, body: &Body) -> reqwest::Response
    where
        Body: serde::Serialize,
    {
        self.api_client
            .post(&format!("{}{}", &self.address, path))
            .form(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Flash messages shown on the next page load.
    pub async fn flash_messages(&self, path: &str) -> Vec<String> {
        let page = self.get_json(path).await;
        page["messages"]
            .as_array()
            .expect("Missing messages")
            .iter()
            .map(|m| m["content"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub async fn department_id(&self, name: &str) -> Uuid {
        let (id,): (Uuid,) = sqlx::query_as("SELECT id FROM department WHERE name = $1")
            .bind(name)
            .fetch_one(&self.db_pool)
            .await
            .expect("Missing department");
        id
    }

    pub async fn create_doctor(&self, name: &str, specialization: &str) -> TestUser {
        let user = TestUser::generate("doctor");
        let department_id = self.department_id("Cardiology").await;
        sqlx::query(
            r#"
            INSERT INTO doctor (id, username, password_hash, name, email, specialization, department_id, experience, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 5, TRUE)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(user.password_hash())
        .bind(name)
        .bind(format!("{}@hospital.test", user.username))
        .bind(specialization)
        .bind(department_id)
        .execute(&self.db_pool)
        .await
        .expect("Failed to store test doctor.");
        user
    }

    pub async fn create_patient(&self, name: &str) -> TestUser {
        let user = TestUser::generate("patient");
        sqlx::query(
            r#"
            INSERT INTO patient (id, username, password_hash, name, email, is_active, is_blacklisted)
            VALUES ($1, $2, $3, $4, $5, TRUE, FALSE)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(user.password_hash())
        .bind(name)
        .bind(format!("{}@mail.test", user.username))
        .execute(&self.db_pool)
        .await
        .expect("Failed to store test patient.");
        user
    }

    pub async fn appointment_statuses(&self, doctor_id: Uuid) -> Vec<String> {
        sqlx::query_as::<_, (String,)>(
            "SELECT status FROM appointment WHERE doctor_id = $1 ORDER BY created_at",
        )
        .bind(doctor_id)
        .fetch_all(&self.db_pool)
        .await
        .expect("Failed to fetch appointments.")
        .into_iter()
        .map(|(status,)| status)
        .collect()
    }
}

impl TestUser {
    pub fn generate(role: &'static str) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: format!("{}-{}", role, Uuid::new_v4()),
            password: Uuid::new_v4().to_string(),
            role,
        }
    }

    fn password_hash(&self) -> String {
        compute_password_hash(Secret::new(self.password.clone()))
            .expect("Failed to hash password")
            .expose_secret()
            .clone()
    }
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn days_from_today(days: i64) -> NaiveDate {
    today() + Duration::days(days)
}

pub fn assert_is_redirect_to(response: &reqwest::Response, location: &str) {
    assert_eq!(response.status().as_u16(), 303);
    assert_eq!(response.headers().get("Location").unwrap(), location);
}

pub async fn spawn_app() -> TestApp {
    Lazy::force(&TRACING);

    // Randomise configuration to ensure test isolation
    let configuration = {
        let mut c = get_configuration().expect("Failed to read configuration.");
        c.database.database_name = Uuid::new_v4().to_string();
        c.application.port = 0;
        c
    };

    let db_pool = configure_database(&configuration.database).await;

    let application = Application::build(configuration.clone())
        .await
        .expect("Failed to build application.");
    let port = application.port();
    let _ = tokio::spawn(application.run_until_stopped());

    let api_client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .cookie_store(true)
        .build()
        .unwrap();

    let admin_id: (Uuid,) = sqlx::query_as("SELECT id FROM admin WHERE username = $1")
        .bind(&configuration.bootstrap.admin_username)
        .fetch_one(&db_pool)
        .await
        .expect("Default admin was not created.");

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        port,
        db_pool,
        api_client,
        admin: TestUser {
            id: admin_id.0,
            username: configuration.bootstrap.admin_username.clone(),
            password: configuration
                .bootstrap
                .admin_password
                .expose_secret()
                .clone(),
            role: "admin",
        },
    }
}

async fn configure_database(config: &DatabaseSettings) -> PgPool {
    // Create database
    let mut connection = PgConnection::connect_with(&config.without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(format!(r#"CREATE DATABASE "{}";"#, config.database_name).as_str())
        .await
        .expect("Failed to create database.");

    // Migrate database
    let connection_pool = PgPool::connect_with(config.with_db())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database");
    connection_pool
}
