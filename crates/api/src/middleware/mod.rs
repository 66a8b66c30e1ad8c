//! Request extractors and the audit instrumentation layer.
//!
//! - [`auth::AuthUser`] -- Extracts the authenticated user from a JWT Bearer token.
//! - [`rbac::RequireAdmin`] -- Requires the `admin` role.
//! - [`rbac::RequireAuth`] -- Requires an authenticated, non-deleted account.
//! - [`client::ClientMeta`] -- Client IP and user agent.
//! - [`audit::audit_requests`] -- One audit entry per request.

pub mod audit;
pub mod auth;
pub mod client;
pub mod rbac;
