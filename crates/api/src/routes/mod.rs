pub mod audit;
pub mod auth;
pub mod books;
pub mod genres;
pub mod health;
pub mod users;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Every resource router carries its own request-audit layer.
///
/// ```text
/// /auth/register                                   register (public)
/// /auth/login                                      login (public)
/// /auth/me                                         current user (auth)
///
/// /libros                                          search (auth), create (admin)
/// /libros/export                                   CSV export (auth)
/// /libros/{id}                                     get (auth), update, delete (admin)
/// /libros/{id}/restore                             restore (admin)
/// /libros/{id}/imagen                              cover upload (admin, multipart)
///
/// /generos                                         search (auth), create (admin)
/// /generos/{id}                                    get (auth), update, delete (admin)
/// /generos/{id}/restore                            restore (admin)
///
/// /usuarios                                        search, create (admin)
/// /usuarios/{id}                                   get, update, delete (admin)
/// /usuarios/{id}/restore                           restore (admin)
///
/// /audit/report                                    filtered entries (admin)
/// /audit/users/{id}/activity                       one user's entries (admin)
/// /audit/security                                  SECURITY entries (admin)
/// /audit/statistics                                usage statistics (admin)
/// /audit/suspicious-activity                       pattern detection (admin)
/// ```
pub fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router(state))
        .nest("/libros", books::router(state))
        .nest("/generos", genres::router(state))
        .nest("/usuarios", users::router(state))
        .nest("/audit", audit::router(state))
}
