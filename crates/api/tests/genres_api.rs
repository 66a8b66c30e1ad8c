//! HTTP-level integration tests for the `/generos` resource.

mod common;

use axum::http::StatusCode;
use common::{
    admin_token, body_json, delete_auth, get_auth, post_auth, post_json_auth, put_json_auth,
    register_user,
};
use serde_json::{json, Value};

async fn create_genre(app: &common::TestApp, token: &str, name: &str) -> Value {
    let response = post_json_auth(
        app.app(),
        "/api/v1/generos",
        json!({ "name": name, "description": "Narrativa breve" }),
        token,
    )
    .await;
    assert_eq!(
        response.status(),
        StatusCode::CREATED,
        "create genre {name}"
    );
    body_json(response).await["data"].clone()
}

/// Create, delete, restore through HTTP.
#[tokio::test]
async fn test_genre_lifecycle() {
    let app = common::build_test_app().await;
    let token = admin_token(&app).await;
    let genre = create_genre(&app, &token, "Cuento").await;
    let id = genre["id"].as_i64().unwrap();
    assert_eq!(genre["status_name"], "active");

    let response = delete_auth(app.app(), &format!("/api/v1/generos/{id}"), &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["status_name"], "deleted");

    let response = delete_auth(app.app(), &format!("/api/v1/generos/{id}"), &token).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = post_auth(app.app(), &format!("/api/v1/generos/{id}/restore"), &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status_name"], "active");
    assert!(json["data"]["restored_at"].is_string());

    let actions: Vec<String> = app
        .audit_entries()
        .into_iter()
        .filter(|e| e.action.starts_with("GENRE_"))
        .map(|e| e.action)
        .collect();
    assert_eq!(
        actions,
        ["GENRE_CREATED", "GENRE_DELETED", "GENRE_RESTORED"]
    );
}

/// A deleted name blocks re-creation with a hint to restore it.
#[tokio::test]
async fn test_duplicate_deleted_genre_suggests_restore() {
    let app = common::build_test_app().await;
    let token = admin_token(&app).await;
    let genre = create_genre(&app, &token, "Poesía").await;
    delete_auth(
        app.app(),
        &format!("/api/v1/generos/{}", genre["id"]),
        &token,
    )
    .await;

    let response = post_json_auth(
        app.app(),
        "/api/v1/generos",
        json!({ "name": "Poesía" }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert!(
        json["error"].as_str().unwrap().contains("restore"),
        "{json}"
    );
}

/// Books cannot be filed under a deleted genre.
#[tokio::test]
async fn test_book_rejects_deleted_genre() {
    let app = common::build_test_app().await;
    let token = admin_token(&app).await;
    let genre = create_genre(&app, &token, "Ensayo").await;
    let id = genre["id"].as_i64().unwrap();
    delete_auth(app.app(), &format!("/api/v1/generos/{id}"), &token).await;

    let response = post_json_auth(
        app.app(),
        "/api/v1/libros",
        json!({
            "title": "Otras inquisiciones",
            "author": "Borges",
            "editorial": "Sur",
            "price": 8.0,
            "genre_id": id,
        }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Search filters by name and status.
#[tokio::test]
async fn test_genre_search() {
    let app = common::build_test_app().await;
    let token = admin_token(&app).await;
    create_genre(&app, &token, "Novela").await;
    let gone = create_genre(&app, &token, "Novela gráfica").await;
    create_genre(&app, &token, "Teatro").await;
    delete_auth(
        app.app(),
        &format!("/api/v1/generos/{}", gone["id"]),
        &token,
    )
    .await;

    let json = body_json(get_auth(app.app(), "/api/v1/generos?name=novela", &token).await).await;
    assert_eq!(json["data"]["total"], 2);

    let json = body_json(
        get_auth(
            app.app(),
            "/api/v1/generos?name=novela&estado=activo",
            &token,
        )
        .await,
    )
    .await;
    assert_eq!(json["data"]["total"], 1);
    assert_eq!(json["data"]["items"][0]["name"], "Novela");
}

/// Users may read genres but not change them.
#[tokio::test]
async fn test_genre_rbac() {
    let app = common::build_test_app().await;
    let admin = admin_token(&app).await;
    let (_, user) = register_user(&app, "lector@example.com").await;
    let genre = create_genre(&app, &admin, "Cuento").await;
    let id = genre["id"].as_i64().unwrap();

    let response = get_auth(app.app(), &format!("/api/v1/generos/{id}"), &user).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = put_json_auth(
        app.app(),
        &format!("/api/v1/generos/{id}"),
        json!({ "name": "Relato" }),
        &user,
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = put_json_auth(
        app.app(),
        &format!("/api/v1/generos/{id}"),
        json!({ "name": "Relato" }),
        &admin,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["name"], "Relato");
}
