use std::sync::Arc;

use handraise_db::Database;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    /// Include error cause chains in 500 responses.
    pub debug: bool,
    /// When set, write endpoints require a bearer token signed with this secret.
    pub jwt_secret: Option<String>,
}
