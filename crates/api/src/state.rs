use std::sync::Arc;

use biblioteca_audit::{AuditRecorder, AuditReportEngine, LogSink};
use biblioteca_db::store::Store;

use crate::config::ServerConfig;
use crate::services::auth::AuthService;
use crate::services::books::BookService;
use crate::services::genres::GenreService;
use crate::services::lifecycle::LifecycleService;
use crate::services::users::UserService;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Persistence backend (PostgreSQL or in-memory).
    pub store: Arc<dyn Store>,
    pub config: Arc<ServerConfig>,
    /// Writes audit entries to the shared log sink.
    pub recorder: AuditRecorder,
    /// Reads the audit stream back for reports.
    pub reports: AuditReportEngine,
    pub books: BookService,
    pub genres: GenreService,
    pub users: UserService,
    pub auth: AuthService,
}

impl AppState {
    /// Wire every service over one store and one log sink.
    pub fn new(store: Arc<dyn Store>, sink: Arc<dyn LogSink>, config: ServerConfig) -> Self {
        let recorder = AuditRecorder::new(sink);
        let reports = AuditReportEngine::new(recorder.clone());
        let lifecycle = LifecycleService::new(store.clone(), config.status_fallback);

        let books = BookService::new(
            store.clone(),
            lifecycle.clone(),
            recorder.clone(),
            config.upload_dir.clone(),
        );
        let genres = GenreService::new(store.clone(), lifecycle.clone(), recorder.clone());
        let users = UserService::new(store.clone(), lifecycle, recorder.clone());
        let auth = AuthService::new(users.clone(), recorder.clone(), config.jwt.clone());

        Self {
            store,
            config: Arc::new(config),
            recorder,
            reports,
            books,
            genres,
            users,
            auth,
        }
    }
}
