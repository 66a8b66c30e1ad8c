//! HTTP-level integration tests for the `/libros` resource.
//!
//! Tests cover the soft-delete lifecycle, status filtering, CSV export,
//! RBAC enforcement, validation, and cover image uploads.

mod common;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{Request, StatusCode};
use biblioteca_api::services::books::CSV_HEADER;
use biblioteca_core::search::MAX_PAGE;
use common::{
    admin_token, body_json, body_text, create_book, delete_auth, get, get_auth, post_auth,
    post_json_auth, put_json_auth, register_user, send,
};
use serde_json::json;

/// Build a single-field multipart body carrying `data` as `file_name`.
fn multipart_request(uri: &str, token: &str, file_name: &str, data: &[u8]) -> Request<Body> {
    let boundary = "biblioteca-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Delete, double delete, restore, double restore.
#[tokio::test]
async fn test_book_soft_delete_lifecycle() {
    let app = common::build_test_app().await;
    let token = admin_token(&app).await;
    let book = create_book(&app, &token, "Ficciones", "Sur").await;
    let id = book["id"].as_i64().unwrap();
    assert_eq!(book["status_name"], "active");
    assert!(book["deleted_at"].is_null());

    let response = delete_auth(app.app(), &format!("/api/v1/libros/{id}"), &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let deleted = body_json(response).await;
    assert_eq!(deleted["data"]["status_name"], "deleted");
    assert!(deleted["data"]["deleted_at"].is_string());
    assert!(deleted["data"]["restored_at"].is_null());

    let response = delete_auth(app.app(), &format!("/api/v1/libros/{id}"), &token).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("already deleted"));

    // Deleted rows are still readable by id.
    let response = get_auth(app.app(), &format!("/api/v1/libros/{id}"), &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = post_auth(app.app(), &format!("/api/v1/libros/{id}/restore"), &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let restored = body_json(response).await;
    assert_eq!(restored["data"]["status_name"], "active");
    assert!(restored["data"]["deleted_at"].is_null());
    assert!(restored["data"]["restored_at"].is_string());

    let response = post_auth(app.app(), &format!("/api/v1/libros/{id}/restore"), &token).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

/// Each successful transition records one domain entry.
#[tokio::test]
async fn test_book_transitions_are_audited() {
    let app = common::build_test_app().await;
    let token = admin_token(&app).await;
    let book = create_book(&app, &token, "Rayuela", "Sudamericana").await;
    let id = book["id"].as_i64().unwrap();

    delete_auth(app.app(), &format!("/api/v1/libros/{id}"), &token).await;
    delete_auth(app.app(), &format!("/api/v1/libros/{id}"), &token).await;
    post_auth(app.app(), &format!("/api/v1/libros/{id}/restore"), &token).await;

    let actions: Vec<String> = app
        .audit_entries()
        .into_iter()
        .filter(|e| e.action.starts_with("BOOK_"))
        .map(|e| e.action)
        .collect();
    assert_eq!(actions, ["BOOK_CREATED", "BOOK_DELETED", "BOOK_RESTORED"]);
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// `estado` narrows listings to one status; without it both are returned.
#[tokio::test]
async fn test_search_filters_by_estado() {
    let app = common::build_test_app().await;
    let token = admin_token(&app).await;
    create_book(&app, &token, "El Aleph", "Losada").await;
    let gone = create_book(&app, &token, "El Túnel", "Sur").await;
    let gone_id = gone["id"].as_i64().unwrap();
    delete_auth(app.app(), &format!("/api/v1/libros/{gone_id}"), &token).await;

    let json = body_json(get_auth(app.app(), "/api/v1/libros?estado=eliminado", &token).await)
        .await;
    assert_eq!(json["data"]["total"], 1);
    assert_eq!(json["data"]["items"][0]["id"], gone_id);

    let json = body_json(get_auth(app.app(), "/api/v1/libros?estado=activo", &token).await).await;
    assert_eq!(json["data"]["total"], 1);
    assert_eq!(json["data"]["items"][0]["title"], "El Aleph");

    let json = body_json(get_auth(app.app(), "/api/v1/libros", &token).await).await;
    assert_eq!(json["data"]["total"], 2);
    // Active rows sort before deleted ones.
    assert_eq!(json["data"]["items"][0]["status_name"], "active");
}

/// Title search is partial and ignores accents.
#[tokio::test]
async fn test_search_title_is_accent_insensitive() {
    let app = common::build_test_app().await;
    let token = admin_token(&app).await;
    create_book(&app, &token, "El Túnel", "Sur").await;
    create_book(&app, &token, "Rayuela", "Sudamericana").await;

    let json = body_json(get_auth(app.app(), "/api/v1/libros?title=tunel", &token).await).await;
    assert_eq!(json["data"]["total"], 1);
    assert_eq!(json["data"]["items"][0]["title"], "El Túnel");
}

/// Pagination metadata reflects the requested page.
#[tokio::test]
async fn test_search_pagination() {
    let app = common::build_test_app().await;
    let token = admin_token(&app).await;
    for i in 0..3 {
        create_book(&app, &token, &format!("Tomo {i}"), "Planeta").await;
    }

    let json = body_json(get_auth(app.app(), "/api/v1/libros?page=2&limit=2", &token).await).await;
    assert_eq!(json["data"]["total"], 3);
    assert_eq!(json["data"]["page"], 2);
    assert_eq!(json["data"]["limit"], 2);
    assert_eq!(json["data"]["total_pages"], 2);
    assert_eq!(json["data"]["items"].as_array().unwrap().len(), 1);
}

/// Out-of-range page numbers are clamped instead of overflowing the offset.
#[tokio::test]
async fn test_search_huge_page_is_empty() {
    let app = common::build_test_app().await;
    let token = admin_token(&app).await;
    create_book(&app, &token, "Ficciones", "Sur").await;
    let before = app.request_entries().len();

    let uri = "/api/v1/libros?page=9223372036854775807&limit=100";
    let response = get_auth(app.app(), uri, &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["total"], 1);
    assert_eq!(json["data"]["page"], MAX_PAGE);
    assert!(json["data"]["items"].as_array().unwrap().is_empty());
    assert_eq!(app.request_entries().len(), before + 1);
}

/// An unknown `estado` value is a 400.
#[tokio::test]
async fn test_search_invalid_estado_rejected() {
    let app = common::build_test_app().await;
    let token = admin_token(&app).await;

    let response = get_auth(app.app(), "/api/v1/libros?estado=borrado", &token).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// CSV export
// ---------------------------------------------------------------------------

/// The export is a quoted CSV attachment with the fixed header row.
#[tokio::test]
async fn test_export_csv() {
    let app = common::build_test_app().await;
    let token = admin_token(&app).await;
    let book = create_book(&app, &token, r#"Libro "A""#, "Sur").await;
    let id = book["id"].as_i64().unwrap();

    let response = get_auth(app.app(), "/api/v1/libros/export", &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/csv"), "{content_type}");
    let disposition = response.headers()[CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert!(disposition.contains("libros.csv"), "{disposition}");

    let csv = body_text(response).await;
    let mut lines = csv.lines();
    assert_eq!(lines.next().unwrap(), CSV_HEADER.join(","));
    let row = lines.next().unwrap();
    assert!(
        row.starts_with(&format!("{id},\"Libro \"\"A\"\"\",\"Jorge Luis Borges\",\"Sur\",19.9,")),
        "{row}"
    );
    assert!(row.contains("\"Activo\""), "{row}");
    assert!(lines.next().is_none());

    assert!(app.has_audit_action("BOOKS_EXPORTED"));
}

/// The export honours the same filters as search.
#[tokio::test]
async fn test_export_respects_estado() {
    let app = common::build_test_app().await;
    let token = admin_token(&app).await;
    create_book(&app, &token, "Activo", "Sur").await;
    let gone = create_book(&app, &token, "Borrado", "Sur").await;
    delete_auth(app.app(), &format!("/api/v1/libros/{}", gone["id"]), &token).await;

    let csv = body_text(get_auth(app.app(), "/api/v1/libros/export?estado=eliminado", &token).await)
        .await;
    let rows: Vec<&str> = csv.lines().skip(1).collect();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].contains("\"Borrado\""));
    assert!(rows[0].contains("\"Eliminado\""));
}

// ---------------------------------------------------------------------------
// RBAC and validation
// ---------------------------------------------------------------------------

/// Reads need a token; writes need the admin role.
#[tokio::test]
async fn test_book_rbac() {
    let app = common::build_test_app().await;
    let admin = admin_token(&app).await;
    let (_, user) = register_user(&app, "lector@example.com").await;
    let book = create_book(&app, &admin, "Ficciones", "Sur").await;
    let id = book["id"].as_i64().unwrap();

    assert_eq!(
        get(app.app(), "/api/v1/libros").await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        get_auth(app.app(), "/api/v1/libros", &user).await.status(),
        StatusCode::OK
    );

    let response = post_json_auth(
        app.app(),
        "/api/v1/libros",
        json!({ "title": "X", "author": "Y", "editorial": "Z", "price": 1.0 }),
        &user,
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "Admin role required");

    let response = delete_auth(app.app(), &format!("/api/v1/libros/{id}"), &user).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

/// Empty titles and negative prices are rejected.
#[tokio::test]
async fn test_create_book_validation() {
    let app = common::build_test_app().await;
    let token = admin_token(&app).await;

    let response = post_json_auth(
        app.app(),
        "/api/v1/libros",
        json!({ "title": "", "author": "Y", "editorial": "Z", "price": 1.0 }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_json_auth(
        app.app(),
        "/api/v1/libros",
        json!({ "title": "X", "author": "Y", "editorial": "Z", "price": -3.0 }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Same title and editorial twice is a 409.
#[tokio::test]
async fn test_create_book_duplicate_conflicts() {
    let app = common::build_test_app().await;
    let token = admin_token(&app).await;
    create_book(&app, &token, "Ficciones", "Sur").await;

    let response = post_json_auth(
        app.app(),
        "/api/v1/libros",
        json!({ "title": "Ficciones", "author": "Borges", "editorial": "Sur", "price": 5.0 }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

/// A book can be attached to an existing genre, but not to a missing one.
#[tokio::test]
async fn test_create_book_with_genre() {
    let app = common::build_test_app().await;
    let token = admin_token(&app).await;
    let response = post_json_auth(
        app.app(),
        "/api/v1/generos",
        json!({ "name": "Cuento" }),
        &token,
    )
    .await;
    let genre_id = body_json(response).await["data"]["id"].as_i64().unwrap();

    let response = post_json_auth(
        app.app(),
        "/api/v1/libros",
        json!({
            "title": "El Aleph",
            "author": "Borges",
            "editorial": "Losada",
            "price": 9.5,
            "genre_id": genre_id,
        }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["data"]["genre_name"], "Cuento");

    let response = post_json_auth(
        app.app(),
        "/api/v1/libros",
        json!({
            "title": "Otro",
            "author": "Borges",
            "editorial": "Losada",
            "price": 9.5,
            "genre_id": 999,
        }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// Updates change only the given fields.
#[tokio::test]
async fn test_update_book() {
    let app = common::build_test_app().await;
    let token = admin_token(&app).await;
    let book = create_book(&app, &token, "Ficciones", "Sur").await;
    let id = book["id"].as_i64().unwrap();

    let response = put_json_auth(
        app.app(),
        &format!("/api/v1/libros/{id}"),
        json!({ "price": 25.0, "available": false }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["price"], 25.0);
    assert_eq!(json["data"]["available"], false);
    assert_eq!(json["data"]["title"], "Ficciones");
}

/// Unknown ids are 404 for every verb.
#[tokio::test]
async fn test_missing_book_returns_404() {
    let app = common::build_test_app().await;
    let token = admin_token(&app).await;

    let response = get_auth(app.app(), "/api/v1/libros/999", &token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");

    let response = delete_auth(app.app(), "/api/v1/libros/999", &token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = post_auth(app.app(), "/api/v1/libros/999/restore", &token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Image upload
// ---------------------------------------------------------------------------

/// A PNG upload is stored and linked from the book.
#[tokio::test]
async fn test_upload_image() {
    let app = common::build_test_app().await;
    let token = admin_token(&app).await;
    let book = create_book(&app, &token, "Ficciones", "Sur").await;
    let id = book["id"].as_i64().unwrap();

    let request = multipart_request(
        &format!("/api/v1/libros/{id}/imagen"),
        &token,
        "portada.PNG",
        b"\x89PNG fake image bytes",
    );
    let response = send(app.app(), request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let url = json["data"]["image_url"].as_str().unwrap();
    assert!(
        url.starts_with(&format!("/uploads/books/book_{id}_")),
        "{url}"
    );
    assert!(url.ends_with(".png"), "{url}");

    let stored = url.trim_start_matches("/uploads/");
    assert!(app.uploads.path().join(stored).exists());
}

/// Unsupported extensions are rejected before anything is written.
#[tokio::test]
async fn test_upload_rejects_unsupported_extension() {
    let app = common::build_test_app().await;
    let token = admin_token(&app).await;
    let book = create_book(&app, &token, "Ficciones", "Sur").await;
    let id = book["id"].as_i64().unwrap();

    let request = multipart_request(
        &format!("/api/v1/libros/{id}/imagen"),
        &token,
        "virus.exe",
        b"MZ",
    );
    let response = send(app.app(), request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!app.uploads.path().join("books").exists());
}
