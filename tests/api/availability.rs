use crate::utils::{assert_is_redirect_to, days_from_today, spawn_app};
use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

#[tokio::test]
async fn only_days_marked_available_are_stored() {
    let app = spawn_app().await;
    let doctor = app.create_doctor("Dr. House", "Diagnostics").await;
    app.login_as(&doctor).await;
    let open = days_from_today(1).to_string();
    let half_filled = days_from_today(2).to_string();
    let declined = days_from_today(3).to_string();

    let response = app
        .post_form(
            "/doctor/availability",
            &serde_json::json!({
                format!("available_{}", open): "yes",
                format!("start_time_{}", open): "09:00",
                format!("end_time_{}", open): "12:00",
                format!("available_{}", half_filled): "yes",
                format!("start_time_{}", half_filled): "09:00",
                format!("available_{}", declined): "no",
                format!("start_time_{}", declined): "13:00",
                format!("end_time_{}", declined): "17:00",
            }),
        )
        .await;
    assert_is_redirect_to(&response, "/doctor/dashboard");

    let rows: Vec<(NaiveDate, NaiveTime, NaiveTime)> = sqlx::query_as(
        "SELECT date, start_time, end_time FROM doctor_availability WHERE doctor_id = $1",
    )
    .bind(doctor.id)
    .fetch_all(&app.db_pool)
    .await
    .unwrap();
    assert_eq!(
        rows,
        vec![(
            days_from_today(1),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
        )]
    );

    let messages = app.flash_messages("/doctor/dashboard").await;
    assert_eq!(messages, vec!["Availability updated".to_string()]);
}

#[tokio::test]
async fn resubmitting_replaces_the_week() {
    let app = spawn_app().await;
    let doctor = app.create_doctor("Dr. House", "Diagnostics").await;
    app.login_as(&doctor).await;
    let first = days_from_today(1).to_string();
    let second = days_from_today(4).to_string();

    app.post_form(
        "/doctor/availability",
        &serde_json::json!({
            format!("available_{}", first): "yes",
            format!("start_time_{}", first): "09:00",
            format!("end_time_{}", first): "12:00",
        }),
    )
    .await;
    app.post_form(
        "/doctor/availability",
        &serde_json::json!({
            format!("available_{}", second): "yes",
            format!("start_time_{}", second): "14:00",
            format!("end_time_{}", second): "18:00",
        }),
    )
    .await;

    let dates: Vec<(NaiveDate,)> =
        sqlx::query_as("SELECT date FROM doctor_availability WHERE doctor_id = $1")
            .bind(doctor.id)
            .fetch_all(&app.db_pool)
            .await
            .unwrap();
    assert_eq!(dates, vec![(days_from_today(4),)]);

    let page = app.get_json("/doctor/availability").await;
    assert_eq!(page["data"]["days"].as_array().unwrap().len(), 7);
    assert_eq!(
        page["data"]["availability"][second.as_str()]["start_time"],
        "14:00:00"
    );
}

#[tokio::test]
async fn malformed_times_leave_availability_untouched() {
    let app = spawn_app().await;
    let doctor = app.create_doctor("Dr. House", "Diagnostics").await;
    app.login_as(&doctor).await;
    let day = days_from_today(1).to_string();

    let response = app
        .post_form(
            "/doctor/availability",
            &serde_json::json!({
                format!("available_{}", day): "yes",
                format!("start_time_{}", day): "nine",
                format!("end_time_{}", day): "12:00",
            }),
        )
        .await;

    assert_is_redirect_to(&response, "/doctor/availability");
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM doctor_availability")
        .fetch_one(&app.db_pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn patients_see_open_windows_of_active_doctors() {
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
    let page = app.get_json("/patient/dashboard").await;
    let listings = page["data"]["availabilities"].as_array().unwrap();
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0]["doctor_name"], "Dr. House");
    assert_eq!(listings[0]["date"], day.as_str());

    let page = app
        .get_json(&format!("/patient/book_appointment/{}", doctor.id))
        .await;
    assert_eq!(page["data"]["availabilities"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn resubmitting_leaves_days_outside_the_week_alone() {
    let app = spawn_app().await;
    let doctor = app.create_doctor("Dr. House", "Diagnostics").await;
    for offset in [-1, 0, 7] {
        sqlx::query(
            r#"
            INSERT INTO doctor_availability (id, doctor_id, date, start_time, end_time, is_available)
            VALUES ($1, $2, $3, '09:00', '12:00', TRUE)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(doctor.id)
        .bind(days_from_today(offset))
        .execute(&app.db_pool)
        .await
        .expect("Failed to seed availability.");
    }
    app.login_as(&doctor).await;
    let day = days_from_today(6).to_string();

    let response = app
        .post_form(
            "/doctor/availability",
            &serde_json::json!({
                format!("available_{}", day): "yes",
                format!("start_time_{}", day): "14:00",
                format!("end_time_{}", day): "18:00",
            }),
        )
        .await;
    assert_is_redirect_to(&response, "/doctor/dashboard");

    let dates: Vec<(NaiveDate,)> = sqlx::query_as(
        "SELECT date FROM doctor_availability WHERE doctor_id = $1 ORDER BY date",
    )
    .bind(doctor.id)
    .fetch_all(&app.db_pool)
    .await
    .unwrap();
    assert_eq!(
        dates,
        vec![
            (days_from_today(-1),),
            (days_from_today(6),),
            (days_from_today(7),),
        ]
    );
}
