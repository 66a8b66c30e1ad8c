pub mod audit;
pub mod auth;
pub mod books;
pub mod genres;
pub mod users;

use biblioteca_core::lifecycle::LifecycleState;
use biblioteca_core::search::parse_estado;

use crate::error::AppResult;

/// Parse the optional `estado` query parameter.
pub(crate) fn parse_state(estado: Option<&str>) -> AppResult<Option<LifecycleState>> {
    Ok(estado.map(parse_estado).transpose()?)
}
