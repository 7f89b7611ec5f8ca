use crate::utils::{assert_is_redirect_to, days_from_today, spawn_app, TestApp};
use rstest::rstest;

async fn login_admin(app: &TestApp) {
    app.login_as(&app.admin).await;
}

#[tokio::test]
async fn bootstrap_seeds_default_departments() {
    let app = spawn_app().await;

    let names: Vec<(String,)> = sqlx::query_as("SELECT name FROM department ORDER BY name")
        .fetch_all(&app.db_pool)
        .await
        .unwrap();
    let names: Vec<String> = names.into_iter().map(|(n,)| n).collect();

    assert_eq!(
        names,
        vec!["Cardiology", "General Medicine", "Neurology", "Orthopedics", "Pediatrics"]
    );
}

#[tokio::test]
async fn admin_adds_a_doctor_who_can_then_log_in() {
    let app = spawn_app().await;
    login_admin(&app).await;
    let department_id = app.department_id("Neurology").await;

    let response = app
        .post_form(
            "/admin/add_doctor",
            &serde_json::json!({
                "username": "strange",
                "password": "sanctum",
                "name": "Dr. Strange",
                "email": "strange@hospital.test",
                "specialization": "Neurosurgery",
                "department_id": department_id,
                "experience": "",
            }),
        )
        .await;
    assert_is_redirect_to(&response, "/admin/dashboard");

    let (experience, is_active): (i32, bool) =
        sqlx::query_as("SELECT experience, is_active FROM doctor WHERE username = 'strange'")
            .fetch_one(&app.db_pool)
            .await
            .expect("Doctor was not stored");
    assert_eq!(experience, 0);
    assert!(is_active);

    app.get("/logout").await;
    let response = app.post_login("strange", "sanctum", "doctor").await;
    assert_is_redirect_to(&response, "/doctor/dashboard");
}

#[rstest]
#[case("-3", "Experience cannot be negative.")]
#[case("ten", "Experience must be a whole number.")]
#[tokio::test]
async fn invalid_experience_is_rejected(#[case] experience: &str, #[case] message: &str) {
    let app = spawn_app().await;
    login_admin(&app).await;
    let department_id = app.department_id("Cardiology").await;

    let response = app
        .post_form(
            "/admin/add_doctor",
            &serde_json::json!({
                "username": "strange",
                "password": "sanctum",
                "name": "Dr. Strange",
                "email": "strange@hospital.test",
                "specialization": "Neurosurgery",
                "department_id": department_id,
                "experience": experience,
            }),
        )
        .await;
    assert_is_redirect_to(&response, "/admin/add_doctor");

    let messages = app.flash_messages("/admin/add_doctor").await;
    assert_eq!(messages, vec![message.to_string()]);
}

#[rstest]
#[case::same_username("strange", "other@hospital.test", true)]
#[case::same_email("other", "strange@hospital.test", true)]
#[case::username_matches_an_email("strange@hospital.test", "other@hospital.test", false)]
#[tokio::test]
async fn doctor_uniqueness_is_checked_field_by_field(
    #[case] username: &str,
    #[case] email: &str,
    #[case] rejected: bool,
) {
    let app = spawn_app().await;
    login_admin(&app).await;
    let department_id = app.department_id("Cardiology").await;
    let doctor = |username: &str, email: &str| {
        serde_json::json!({
            "username": username,
            "password": "sanctum",
            "name": "Dr. Strange",
            "email": email,
            "specialization": "Neurosurgery",
            "department_id": department_id,
        })
    };
    app.post_form("/admin/add_doctor", &doctor("strange", "strange@hospital.test"))
        .await;

    let response = app
        .post_form("/admin/add_doctor", &doctor(username, email))
        .await;

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM doctor")
        .fetch_one(&app.db_pool)
        .await
        .unwrap();
    if rejected {
        assert_is_redirect_to(&response, "/admin/add_doctor");
        let messages = app.flash_messages("/admin/add_doctor").await;
        assert_eq!(messages, vec!["Username or email already exists".to_string()]);
        assert_eq!(count, 1);
    } else {
        assert_is_redirect_to(&response, "/admin/dashboard");
        assert_eq!(count, 2);
    }
}

#[tokio::test]
async fn removing_a_doctor_keeps_their_history() {
    let app = spawn_app().await;
    let doctor = app.create_doctor("Dr. House", "Diagnostics").await;
    let patient = app.create_patient("Pat").await;
    let day = days_from_today(2).to_string();

    app.login_as(&doctor).await;
    app.post_form(
        "/doctor/availability",
        &serde_json::json!({
            format!("available_{}", day): "yes",
            format!("start_time_{}", day): "09:00",
            format!("end_time_{}", day): "12:00",
        }),
    )
    .await;
    app.get("/logout").await;
    app.login_as(&patient).await;
    app.post_form(
        &format!("/patient/book_appointment/{}", doctor.id),
        &serde_json::json!({ "date": day, "time": "10:00" }),
    )
    .await;
    app.get("/logout").await;

    login_admin(&app).await;
    let response = app.get(&format!("/admin/remove_doctor/{}", doctor.id)).await;
    assert_is_redirect_to(&response, "/admin/dashboard");
    app.get("/logout").await;

    assert_eq!(app.appointment_statuses(doctor.id).await, vec!["Booked"]);
    let (windows,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM doctor_availability WHERE doctor_id = $1")
            .bind(doctor.id)
            .fetch_one(&app.db_pool)
            .await
            .unwrap();
    assert_eq!(windows, 1);

    app.login_as(&patient).await;
    let page = app.get_json("/patient/dashboard").await;
    assert!(page["data"]["availabilities"].as_array().unwrap().is_empty());
    let response = app
        .post_form(
            "/patient/search_doctors",
            &serde_json::json!({ "search_query": "house" }),
        )
        .await;
    let page: serde_json::Value = response.json().await.unwrap();
    assert!(page["data"]["doctors"].as_array().unwrap().is_empty());
    app.get("/logout").await;

    let response = app.post_login(&doctor.username, &doctor.password, "doctor").await;
    assert_is_redirect_to(&response, "/login");
}

#[tokio::test]
async fn toggling_a_patient_flips_their_status() {
    let app = spawn_app().await;
    let patient = app.create_patient("Pat").await;
    login_admin(&app).await;

    app.get(&format!("/admin/patient/{}/toggle", patient.id)).await;
    let (active,): (bool,) = sqlx::query_as("SELECT is_active FROM patient WHERE id = $1")
        .bind(patient.id)
        .fetch_one(&app.db_pool)
        .await
        .unwrap();
    assert!(!active);

    app.get(&format!("/admin/patient/{}/toggle", patient.id)).await;
    let (active,): (bool,) = sqlx::query_as("SELECT is_active FROM patient WHERE id = $1")
        .bind(patient.id)
        .fetch_one(&app.db_pool)
        .await
        .unwrap();
    assert!(active);
}

#[tokio::test]
async fn admin_search_finds_doctors_with_their_upcoming_appointments() {
    let app = spawn_app().await;
    let doctor = app.create_doctor("Dr. House", "Diagnostics").await;
    app.create_doctor("Dr. Wilson", "Oncology").await;
    let patient = app.create_patient("Pat").await;
    app.login_as(&patient).await;
    app.post_form(
        &format!("/patient/book_appointment/{}", doctor.id),
        &serde_json::json!({ "date": days_from_today(1).to_string(), "time": "10:00" }),
    )
    .await;
    app.get("/logout").await;

    login_admin(&app).await;
    let response = app
        .post_form(
            "/admin/search",
            &serde_json::json!({ "search_query": "diagno", "search_type": "doctor" }),
        )
        .await;
    assert_eq!(200, response.status().as_u16());
    let page: serde_json::Value = response.json().await.unwrap();

    let doctors = page["data"]["doctors"].as_array().unwrap();
    assert_eq!(doctors.len(), 1);
    assert_eq!(doctors[0]["name"], "Dr. House");
    let appointments = page["data"]["appointments"].as_array().unwrap();
    assert_eq!(appointments.len(), 1);
    assert_eq!(appointments[0]["patient_name"], "Pat");
}

#[tokio::test]
async fn unknown_search_types_find_nothing() {
    let app = spawn_app().await;
    app.create_doctor("Dr. House", "Diagnostics").await;
    app.create_patient("Pat").await;
    login_admin(&app).await;

    let response = app
        .post_form(
            "/admin/search",
            &serde_json::json!({ "search_query": "", "search_type": "nurse" }),
        )
        .await;
    assert_eq!(200, response.status().as_u16());
    let page: serde_json::Value = response.json().await.unwrap();

    assert_eq!(page["data"]["search_type"], "nurse");
    for list in ["doctors", "patients", "appointments"] {
        assert!(page["data"][list].as_array().unwrap().is_empty(), "{} not empty", list);
    }
}

#[tokio::test]
async fn admin_cancels_an_appointment() {
    let app = spawn_app().await;
    let doctor = app.create_doctor("Dr. House", "Diagnostics").await;
    let patient = app.create_patient("Pat").await;
    app.login_as(&patient).await;
    app.post_form(
        &format!("/patient/book_appointment/{}", doctor.id),
        &serde_json::json!({ "date": days_from_today(1).to_string(), "time": "10:00" }),
    )
    .await;
    app.get("/logout").await;
    let (appointment_id,): (uuid::Uuid,) = sqlx::query_as("SELECT id FROM appointment")
        .fetch_one(&app.db_pool)
        .await
        .unwrap();

    login_admin(&app).await;
    let response = app
        .get(&format!("/admin/appointment/{}/cancel", appointment_id))
        .await;
    assert_is_redirect_to(&response, "/admin/view_appointments");

    assert_eq!(app.appointment_statuses(doctor.id).await, vec!["Cancelled"]);
    let page = app.get_json("/admin/view_appointments").await;
    assert_eq!(page["data"]["length"], 1);
}
