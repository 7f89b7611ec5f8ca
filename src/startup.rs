use actix_session::storage::RedisSessionStore;
use actix_session::SessionMiddleware;
use actix_web::cookie::Key;
use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use actix_web_flash_messages::storage::CookieMessageStore;
use actix_web_flash_messages::FlashMessagesFramework;
use secrecy::{ExposeSecret, Secret};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::net::TcpListener;
use tracing_actix_web::TracingLogger;

use crate::bootstrap::init_database;
use crate::config::{DatabaseSettings, Settings};
use crate::routes::*;

pub struct Application {
    port: u16,
    server: Server,
}

impl Application {
    pub async fn build(config: Settings) -> Result<Self, anyhow::Error> {
        let address = format!("{}:{}", config.application.host, config.application.port);
        let listener = TcpListener::bind(address)?;
        let connection = get_connection_pool(&config.database);
        init_database(&connection, &config.bootstrap).await?;

        let port = listener.local_addr()?.port();
        let server = run(
            listener,
            connection,
            config.application.hmac_secret,
            config.redis_uri,
        )
        .await?;

        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

pub fn get_connection_pool(config: &DatabaseSettings) -> PgPool {
    PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(2))
        .connect_lazy_with(config.with_db())
}

pub async fn run(
    listener: TcpListener,
    db_pool: PgPool,
    hmac_secret: Secret<String>,
    redis_uri: Secret<String>,
) -> Result<Server, anyhow::Error> {
    let connection: web::Data<PgPool> = web::Data::new(db_pool);
    let secret_key = Key::from(hmac_secret.expose_secret().as_bytes());
    let message_store = CookieMessageStore::builder(secret_key.clone()).build();
    let message_framework = FlashMessagesFramework::builder(message_store).build();
    let redis_store = RedisSessionStore::new(redis_uri.expose_secret()).await?;
    let server: Server = HttpServer::new(move || {
        App::new()
            .wrap(message_framework.clone())
            .wrap(SessionMiddleware::new(
                redis_store.clone(),
                secret_key.clone(),
            ))
            .wrap(TracingLogger::default())
            .route("/", web::get().to(index))
            .route("/health_check", web::get().to(health_check))
            .route("/login", web::get().to(login_form))
            .route("/login", web::post().to(login))
            .route("/logout", web::get().to(log_out))
            .route("/register", web::get().to(register_form))
            .route("/register", web::post().to(register))
            .service(
                web::scope("/admin")
                    .route("/dashboard", web::get().to(admin_dashboard))
                    .route("/add_doctor", web::get().to(add_doctor_form))
                    .route("/add_doctor", web::post().to(add_doctor))
                    .route("/update_doctor/{id}", web::get().to(update_doctor_form))
                    .route("/update_doctor/{id}", web::post().to(update_doctor))
                    .route("/remove_doctor/{id}", web::get().to(remove_doctor))
                    .route("/remove_patient/{id}", web::get().to(remove_patient))
                    .route("/view_appointments", web::get().to(view_appointments))
                    .service(
                        web::resource("/appointment/{id}/complete")
                            .route(web::get().to(admin_complete_appointment))
                            .route(web::post().to(admin_complete_appointment)),
                    )
                    .service(
                        web::resource("/appointment/{id}/cancel")
                            .route(web::get().to(admin_cancel_appointment))
                            .route(web::post().to(admin_cancel_appointment)),
                    )
                    .route("/search", web::get().to(admin_search_form))
                    .route("/search", web::post().to(admin_search))
                    .service(
                        web::resource("/doctor/{id}/toggle")
                            .route(web::get().to(toggle_doctor))
                            .route(web::post().to(toggle_doctor)),
                    )
                    .route("/doctor/{id}/edit", web::get().to(edit_doctor_form))
                    .route("/doctor/{id}/edit", web::post().to(edit_doctor))
                    .service(
                        web::resource("/patient/{id}/toggle")
                            .route(web::get().to(toggle_patient))
                            .route(web::post().to(toggle_patient)),
                    )
                    .route("/patient/{id}/edit", web::get().to(edit_patient_form))
                    .route("/patient/{id}/edit", web::post().to(edit_patient))
                    .service(
                        web::resource("/patient/{id}/blacklist")
                            .route(web::get().to(toggle_patient_blacklist))
                            .route(web::post().to(toggle_patient_blacklist)),
                    ),
            )
            .service(
                web::scope("/doctor")
                    .route("/dashboard", web::get().to(doctor_dashboard))
                    .service(
                        web::resource("/appointment/{id}/cancel")
                            .route(web::get().to(doctor_cancel_appointment))
                            .route(web::post().to(doctor_cancel_appointment)),
                    )
                    .route("/availability", web::get().to(availability_form))
                    .route("/availability", web::post().to(set_availability))
                    .route(
                        "/mark_appointment/{id}/{status}",
                        web::get().to(mark_appointment),
                    )
                    .route("/update_treatment/{id}", web::get().to(treatment_form))
                    .route("/update_treatment/{id}", web::post().to(update_treatment))
                    .route(
                        "/patient_history/{id}",
                        web::get().to(doctor_patient_history),
                    ),
            )
            .service(
                web::scope("/patient")
                    .route("/dashboard", web::get().to(patient_dashboard))
                    .route("/edit_profile", web::get().to(edit_profile_form))
                    .route("/edit_profile", web::post().to(edit_profile))
                    .route("/search_doctors", web::get().to(search_doctors_form))
                    .route("/search_doctors", web::post().to(search_doctors))
                    .route(
                        "/book_appointment/{doctor_id}",
                        web::get().to(book_appointment_form),
                    )
                    .route(
                        "/book_appointment/{doctor_id}",
                        web::post().to(book_appointment),
                    )
                    .route(
                        "/cancel_appointment/{id}",
                        web::get().to(cancel_appointment),
                    )
                    .route(
                        "/appointment/{id}/reschedule",
                        web::get().to(reschedule_form),
                    )
                    .route(
                        "/appointment/{id}/reschedule",
                        web::post().to(reschedule_appointment),
                    )
                    .route("/history", web::get().to(patient_history)),
            )
            .app_data(connection.clone())
    })
    .listen(listener)?
    .run();
    Ok(server)
}
