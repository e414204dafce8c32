use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use physio_clinic::{api, auth::TokenKeys, migrator::Migrator};
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::MigratorTrait;
use serde_json::{json, Value};
use tower::ServiceExt;

const SECRET: &str = "test-secret";

async fn test_app() -> Router {
    let mut options = ConnectOptions::new("sqlite::memory:");
    // One long-lived connection, otherwise each pooled connection would get
    // its own empty in-memory database.
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    Migrator::up(&db, None).await.unwrap();

    api::router(
        db,
        TokenKeys::new(SECRET, Duration::days(7)),
        chrono_tz::Europe::Lisbon,
    )
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, value)
}

async fn register(app: &Router, email: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "email": email, "password": "hunter22", "name": "Ana Costa" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["token"].as_str().unwrap().to_string()
}

async fn create_client(app: &Router, token: &str, name: &str, phone: &str) -> i64 {
    let (status, body) = send(
        app,
        "POST",
        "/api/clients",
        Some(token),
        Some(json!({ "name": name, "phone": phone, "email": format!("{}@mail.pt", name.to_lowercase().replace(' ', ".")) })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_i64().unwrap()
}

async fn create_appointment(app: &Router, token: &str, client_id: i64, date: &str) -> i64 {
    let (status, body) = send(
        app,
        "POST",
        "/api/appointments",
        Some(token),
        Some(json!({ "clientId": client_id, "date": date, "duration": 60, "type": "sessao" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let app = test_app().await;
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK".into()));
}

#[tokio::test]
async fn register_login_and_me() {
    let app = test_app().await;
    let token = register(&app, "Ana@Clinic.pt").await;

    let (status, me) = send(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "ana@clinic.pt");
    assert_eq!(me["role"], "fisioterapeuta");
    assert!(me.get("passwordHash").is_none());

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "ana@clinic.pt", "password": "hunter22" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].as_str().is_some());
    assert_eq!(body["user"]["name"], "Ana Costa");

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "ana@clinic.pt", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials");

    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "email": "ana@clinic.pt", "password": "x", "name": "Dup" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "email": "new@clinic.pt", "name": "No Password" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Name, email and password are required");
}

#[tokio::test]
async fn password_change_requires_current_password() {
    let app = test_app().await;
    let token = register(&app, "ana@clinic.pt").await;

    let (status, _) = send(
        &app,
        "PATCH",
        "/api/auth/me",
        Some(&token),
        Some(json!({ "currentPassword": "nope", "newPassword": "better-one" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "PATCH",
        "/api/auth/me",
        Some(&token),
        Some(json!({ "currentPassword": "hunter22", "newPassword": "better-one", "phone": "+351 912 000 000" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phone"], "+351 912 000 000");

    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "ana@clinic.pt", "password": "better-one" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let app = test_app().await;

    let (status, body) = send(&app, "GET", "/api/clients", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");

    let (status, _) = send(&app, "GET", "/api/stats", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let foreign = TokenKeys::new("another-secret", Duration::days(7));
    let now = Utc::now().timestamp();
    let forged = foreign
        .sign(&physio_clinic::auth::Claims {
            sub: 1,
            email: "x@y.pt".into(),
            name: "X".into(),
            role: "fisioterapeuta".into(),
            iat: now,
            exp: now + 3600,
        })
        .unwrap();
    let (status, _) = send(&app, "GET", "/api/clients", Some(&forged), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn client_requires_name_and_phone() {
    let app = test_app().await;
    let token = register(&app, "ana@clinic.pt").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/clients",
        Some(&token),
        Some(json!({ "name": "Maria Santos" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Name and phone are required");

    let (status, _) = send(
        &app,
        "POST",
        "/api/clients",
        Some(&token),
        Some(json!({ "name": "Maria Santos", "phone": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/api/clients",
        Some(&token),
        Some(json!({ "name": "Maria Santos", "phone": "+351 923 456 789", "birthDate": "yesterday" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn clients_are_scoped_to_their_owner() {
    let app = test_app().await;
    let ana = register(&app, "ana@clinic.pt").await;
    let rui = register(&app, "rui@clinic.pt").await;

    let maria = create_client(&app, &ana, "Maria Santos", "+351 923 456 789").await;

    let uri = format!("/api/clients/{maria}");
    let (status, body) = send(&app, "GET", &uri, Some(&rui), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Client not found");

    let (status, _) = send(&app, "PATCH", &uri, Some(&rui), Some(json!({ "name": "Hijacked" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "DELETE", &uri, Some(&rui), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(
        &app,
        "POST",
        &format!("{uri}/comments"),
        Some(&rui),
        Some(json!({ "content": "sneaky" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "POST",
        "/api/appointments",
        Some(&rui),
        Some(json!({ "clientId": maria, "date": "2024-03-13T09:30:00Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = send(&app, "GET", "/api/clients", Some(&rui), None).await;
    assert_eq!(list.as_array().unwrap().len(), 0);

    let (status, body) = send(&app, "GET", &uri, Some(&ana), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Maria Santos");
}

#[tokio::test]
async fn client_listing_search_and_counts() {
    let app = test_app().await;
    let token = register(&app, "ana@clinic.pt").await;

    let pedro = create_client(&app, &token, "Pedro Oliveira", "+351 945 678 901").await;
    create_client(&app, &token, "Maria Santos", "+351 923 456 789").await;
    create_appointment(&app, &token, pedro, "2024-03-13T09:30:00Z").await;
    create_appointment(&app, &token, pedro, "2024-03-20T09:30:00Z").await;

    let (status, list) = send(&app, "GET", "/api/clients", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["name"], "Maria Santos");
    assert_eq!(list[0]["appointmentCount"], 0);
    assert_eq!(list[1]["appointmentCount"], 2);

    let (_, found) = send(&app, "GET", "/api/clients?search=OLIV", Some(&token), None).await;
    assert_eq!(found.as_array().unwrap().len(), 1);
    assert_eq!(found[0]["id"], pedro);

    let (_, by_phone) = send(&app, "GET", "/api/clients?search=923%20456", Some(&token), None).await;
    assert_eq!(by_phone[0]["name"], "Maria Santos");

    let (_, limited) = send(&app, "GET", "/api/clients?limit=1", Some(&token), None).await;
    assert_eq!(limited.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn client_update_applies_partial_changes() {
    let app = test_app().await;
    let token = register(&app, "ana@clinic.pt").await;
    let id = create_client(&app, &token, "Maria Santos", "+351 923 456 789").await;
    let uri = format!("/api/clients/{id}");

    let (status, body) = send(
        &app,
        "PATCH",
        &uri,
        Some(&token),
        Some(json!({ "allergies": "Latex", "birthDate": "1985-03-15", "phone": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allergies"], "Latex");
    assert_eq!(body["birthDate"], "1985-03-15");
    // Blank phone is ignored rather than clearing a required field.
    assert_eq!(body["phone"], "+351 923 456 789");

    let (_, body) = send(&app, "PUT", &uri, Some(&token), Some(json!({ "allergies": null }))).await;
    assert!(body["allergies"].is_null());
    assert_eq!(body["birthDate"], "1985-03-15");
}

#[tokio::test]
async fn client_detail_includes_notes_files_and_recent_appointments() {
    let app = test_app().await;
    let token = register(&app, "ana@clinic.pt").await;
    let maria = create_client(&app, &token, "Maria Santos", "+351 923 456 789").await;
    let pedro = create_client(&app, &token, "Pedro Oliveira", "+351 945 678 901").await;
    let base = format!("/api/clients/{maria}");

    for day in 1..=12 {
        create_appointment(&app, &token, maria, &format!("2024-05-{day:02}T10:00:00Z")).await;
    }

    let (status, comment) = send(
        &app,
        "POST",
        &format!("{base}/comments"),
        Some(&token),
        Some(json!({ "content": "Responde bem ao tratamento" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        "POST",
        &format!("{base}/comments"),
        Some(&token),
        Some(json!({ "content": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Content is required");

    let (status, file) = send(
        &app,
        "POST",
        &format!("{base}/files"),
        Some(&token),
        Some(json!({ "name": "RX joelho", "url": "https://drive.google.com/file/d/abc" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(file["type"], "document");

    let (status, _) = send(
        &app,
        "POST",
        &format!("{base}/files"),
        Some(&token),
        Some(json!({ "name": "RX", "url": "drive/abc" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, detail) = send(&app, "GET", &base, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["appointmentCount"], 12);
    let recent = detail["appointments"].as_array().unwrap();
    assert_eq!(recent.len(), 10);
    assert_eq!(recent[0]["date"], "2024-05-12T10:00:00Z");
    assert!(recent[0]["comments"].as_array().unwrap().is_empty());
    assert_eq!(detail["comments"][0]["content"], "Responde bem ao tratamento");
    assert_eq!(detail["files"][0]["name"], "RX joelho");

    // A comment can only be deleted through the client it belongs to.
    let comment_id = comment["id"].as_i64().unwrap();
    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/clients/{pedro}/comments/{comment_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        "DELETE",
        &format!("{base}/comments/{comment_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let file_id = file["id"].as_i64().unwrap();
    let (status, _) = send(&app, "DELETE", &format!("{base}/files/{file_id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, detail) = send(&app, "GET", &base, Some(&token), None).await;
    assert!(detail["comments"].as_array().unwrap().is_empty());
    assert!(detail["files"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn appointment_status_update_is_persisted() {
    let app = test_app().await;
    let token = register(&app, "ana@clinic.pt").await;
    let client = create_client(&app, &token, "Maria Santos", "+351 923 456 789").await;
    let id = create_appointment(&app, &token, client, "2024-03-13T09:30:00Z").await;
    let uri = format!("/api/appointments/{id}");

    let (_, created) = send(&app, "GET", &uri, Some(&token), None).await;
    assert_eq!(created["status"], "scheduled");
    assert_eq!(created["type"], "sessao");
    assert_eq!(created["client"]["name"], "Maria Santos");

    let (status, body) = send(
        &app,
        "PATCH",
        &uri,
        Some(&token),
        Some(json!({ "status": "completed", "treatmentNotes": "Mobilização do joelho" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");

    let (_, fetched) = send(&app, "GET", &uri, Some(&token), None).await;
    assert_eq!(fetched["status"], "completed");
    assert_eq!(fetched["treatmentNotes"], "Mobilização do joelho");

    // Any status can follow any other.
    let (_, body) = send(&app, "PATCH", &uri, Some(&token), Some(json!({ "status": "no-show" }))).await;
    assert_eq!(body["status"], "no-show");
    let (_, body) = send(&app, "PATCH", &uri, Some(&token), Some(json!({ "status": "scheduled" }))).await;
    assert_eq!(body["status"], "scheduled");

    let (status, _) = send(&app, "PATCH", &uri, Some(&token), Some(json!({ "status": "finished" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn appointment_creation_validates_input() {
    let app = test_app().await;
    let token = register(&app, "ana@clinic.pt").await;
    let client = create_client(&app, &token, "Maria Santos", "+351 923 456 789").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/appointments",
        Some(&token),
        Some(json!({ "clientId": client })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Client and date are required");

    let (status, _) = send(
        &app,
        "POST",
        "/api/appointments",
        Some(&token),
        Some(json!({ "clientId": client, "date": "2024-03-13T09:30:00Z", "duration": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "POST",
        "/api/appointments",
        Some(&token),
        Some(json!({ "clientId": 9999, "date": "2024-03-13T09:30:00Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Client not found");

    let (status, body) = send(
        &app,
        "POST",
        "/api/appointments",
        Some(&token),
        Some(json!({ "clientId": client, "date": "2024-03-13T09:30:00Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["duration"], 60);
    assert_eq!(body["type"], "consulta");
    assert_eq!(body["status"], "scheduled");
}

#[tokio::test]
async fn appointment_list_filters() {
    let app = test_app().await;
    let token = register(&app, "ana@clinic.pt").await;
    let maria = create_client(&app, &token, "Maria Santos", "+351 923 456 789").await;
    let pedro = create_client(&app, &token, "Pedro Oliveira", "+351 945 678 901").await;

    let future = (Utc::now() + Duration::days(3)).to_rfc3339();
    let far_future = (Utc::now() + Duration::days(10)).to_rfc3339();
    create_appointment(&app, &token, maria, "2024-03-13T09:30:00Z").await;
    create_appointment(&app, &token, maria, "2024-03-13T15:00:00Z").await;
    let soon = create_appointment(&app, &token, pedro, &future).await;
    let cancelled = create_appointment(&app, &token, maria, &far_future).await;
    send(
        &app,
        "PATCH",
        &format!("/api/appointments/{cancelled}"),
        Some(&token),
        Some(json!({ "status": "cancelled" })),
    )
    .await;

    let (_, all) = send(&app, "GET", "/api/appointments", Some(&token), None).await;
    let all = all.as_array().unwrap();
    assert_eq!(all.len(), 4);
    assert_eq!(all[0]["date"], "2024-03-13T09:30:00Z");
    assert_eq!(all[0]["client"]["name"], "Maria Santos");

    let (_, upcoming) = send(&app, "GET", "/api/appointments?upcoming=true", Some(&token), None).await;
    let upcoming = upcoming.as_array().unwrap();
    assert_eq!(upcoming.len(), 1);
    assert_eq!(upcoming[0]["id"], soon);

    let (_, day) = send(&app, "GET", "/api/appointments?date=2024-03-13", Some(&token), None).await;
    assert_eq!(day.as_array().unwrap().len(), 2);

    let (_, for_pedro) = send(
        &app,
        "GET",
        &format!("/api/appointments?clientId={pedro}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(for_pedro.as_array().unwrap().len(), 1);

    let (_, limited) = send(&app, "GET", "/api/appointments?limit=2", Some(&token), None).await;
    assert_eq!(limited.as_array().unwrap().len(), 2);

    // `from` is inclusive, `to` exclusive.
    let (status, window) = send(
        &app,
        "GET",
        "/api/appointments?from=2024-03-13T09:30:00Z&to=2024-03-13T15:00:00Z",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let window = window.as_array().unwrap();
    assert_eq!(window.len(), 1);
    assert_eq!(window[0]["date"], "2024-03-13T09:30:00Z");

    let (_, wider) = send(
        &app,
        "GET",
        "/api/appointments?from=2024-03-13T09:30:01Z&to=2024-03-13T15:00:01Z",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(wider.as_array().unwrap().len(), 1);
    assert_eq!(wider[0]["date"], "2024-03-13T15:00:00Z");
}

#[tokio::test]
async fn appointment_cannot_move_to_another_users_client() {
    let app = test_app().await;
    let ana = register(&app, "ana@clinic.pt").await;
    let rui = register(&app, "rui@clinic.pt").await;

    let maria = create_client(&app, &ana, "Maria Santos", "+351 923 456 789").await;
    let pedro = create_client(&app, &rui, "Pedro Oliveira", "+351 945 678 901").await;
    let id = create_appointment(&app, &ana, maria, "2024-03-13T09:30:00Z").await;
    let uri = format!("/api/appointments/{id}");

    let (status, body) = send(&app, "PATCH", &uri, Some(&ana), Some(json!({ "clientId": pedro }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Client not found");

    let (_, unchanged) = send(&app, "GET", &uri, Some(&ana), None).await;
    assert_eq!(unchanged["clientId"], maria);
}

#[tokio::test]
async fn dates_at_the_edge_of_the_calendar_are_rejected() {
    let app = test_app().await;
    let token = register(&app, "ana@clinic.pt").await;

    for uri in [
        "/api/agenda/month?month=%2B262142-12",
        "/api/agenda/week?date=%2B262142-12-31",
        "/api/agenda/week?date=-262143-01-01",
        "/api/appointments?date=%2B262142-12-31",
    ] {
        let (status, body) = send(&app, "GET", uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["error"], "Invalid date", "{uri}");
    }
}

#[tokio::test]
async fn malformed_query_and_path_values_get_json_errors() {
    let app = test_app().await;
    let token = register(&app, "ana@clinic.pt").await;

    let (status, body) = send(&app, "GET", "/api/clients/abc", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().is_some(), "{body}");

    let (status, body) = send(&app, "GET", "/api/appointments?limit=many", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().is_some(), "{body}");

    let (status, body) = send(&app, "GET", "/api/agenda/week?date=13-03-2024", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().is_some(), "{body}");
}

#[tokio::test]
async fn appointment_comments_and_files() {
    let app = test_app().await;
    let token = register(&app, "ana@clinic.pt").await;
    let client = create_client(&app, &token, "Maria Santos", "+351 923 456 789").await;
    let id = create_appointment(&app, &token, client, "2024-03-13T09:30:00Z").await;
    let base = format!("/api/appointments/{id}");

    let (status, comment) = send(
        &app,
        "POST",
        &format!("{base}/comments"),
        Some(&token),
        Some(json!({ "content": "Dor reduziu" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(comment["appointmentId"], id);

    let (status, _) = send(
        &app,
        "POST",
        &format!("{base}/files"),
        Some(&token),
        Some(json!({ "name": "Plano", "url": "https://drive.google.com/x", "type": "exercise" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, detail) = send(&app, "GET", &base, Some(&token), None).await;
    assert_eq!(detail["comments"][0]["content"], "Dor reduziu");
    assert_eq!(detail["files"][0]["type"], "exercise");

    let (_, listed) = send(&app, "GET", "/api/appointments", Some(&token), None).await;
    assert_eq!(listed[0]["comments"].as_array().unwrap().len(), 1);

    let comment_id = comment["id"].as_i64().unwrap();
    let (status, _) = send(
        &app,
        "DELETE",
        &format!("{base}/comments/{comment_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &app,
        "DELETE",
        &format!("{base}/comments/{comment_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_a_client_removes_its_appointments() {
    let app = test_app().await;
    let token = register(&app, "ana@clinic.pt").await;
    let client = create_client(&app, &token, "Maria Santos", "+351 923 456 789").await;
    let appointment = create_appointment(&app, &token, client, "2024-03-13T09:30:00Z").await;

    let (status, body) = send(&app, "DELETE", &format!("/api/clients/{client}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/appointments/{appointment}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stats_count_only_own_data_in_range() {
    let app = test_app().await;
    let ana = register(&app, "ana@clinic.pt").await;
    let rui = register(&app, "rui@clinic.pt").await;

    let client = create_client(&app, &ana, "Maria Santos", "+351 923 456 789").await;
    create_appointment(&app, &ana, client, &Utc::now().to_rfc3339()).await;
    create_appointment(&app, &ana, client, &(Utc::now() + Duration::days(45)).to_rfc3339()).await;
    create_appointment(&app, &ana, client, &(Utc::now() - Duration::days(400)).to_rfc3339()).await;

    let other = create_client(&app, &rui, "Pedro Oliveira", "+351 945 678 901").await;
    create_appointment(&app, &rui, other, &Utc::now().to_rfc3339()).await;

    let (status, stats) = send(&app, "GET", "/api/stats", Some(&ana), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        stats,
        json!({
            "totalClients": 1,
            "todayAppointments": 1,
            "weekAppointments": 1,
            "monthAppointments": 1
        })
    );
}

#[tokio::test]
async fn weekly_agenda_places_blocks() {
    let app = test_app().await;
    let token = register(&app, "ana@clinic.pt").await;
    let client = create_client(&app, &token, "Maria Santos", "+351 923 456 789").await;
    // Lisbon is on UTC in March before the DST switch.
    create_appointment(&app, &token, client, "2024-03-13T09:30:00Z").await;
    create_appointment(&app, &token, client, "2024-03-13T06:00:00Z").await;

    let (status, week) = send(&app, "GET", "/api/agenda/week?date=2024-03-15", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(week["weekStart"], "2024-03-11");
    assert_eq!(week["columnHeight"], 1080.0);
    let slots = week["slots"].as_array().unwrap();
    assert_eq!(slots.len(), 68);
    assert_eq!(slots[10], json!({ "hour": 9, "minute": 30, "top": 150.0 }));
    let days = week["days"].as_array().unwrap();
    assert_eq!(days.len(), 7);

    let wednesday = days[2]["appointments"].as_array().unwrap();
    assert_eq!(days[2]["date"], "2024-03-13");
    assert_eq!(wednesday.len(), 2);
    assert!(wednesday[0]["block"].is_null());
    assert_eq!(wednesday[1]["start"], "09:30");
    assert_eq!(wednesday[1]["clientName"], "Maria Santos");
    assert_eq!(wednesday[1]["block"]["top"], 150.0);
    assert_eq!(wednesday[1]["block"]["height"], 60.0);
    assert!(week["nowMarker"].is_null());
}

#[tokio::test]
async fn monthly_agenda_grid() {
    let app = test_app().await;
    let token = register(&app, "ana@clinic.pt").await;
    let client = create_client(&app, &token, "Maria Santos", "+351 923 456 789").await;
    create_appointment(&app, &token, client, "2024-02-27T10:00:00Z").await;

    let (status, month) = send(&app, "GET", "/api/agenda/month?month=2024-03", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let days = month["days"].as_array().unwrap();
    assert_eq!(days.len(), 35);
    assert_eq!(days[0]["date"], "2024-02-26");
    assert_eq!(days[0]["inMonth"], false);
    assert_eq!(days[1]["appointments"].as_array().unwrap().len(), 1);
    assert_eq!(days[4]["date"], "2024-03-01");
    assert_eq!(days[4]["inMonth"], true);

    let (status, _) = send(&app, "GET", "/api/agenda/month?month=March", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
