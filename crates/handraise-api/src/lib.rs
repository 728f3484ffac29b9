pub mod error;
pub mod messages;
pub mod middleware;
pub mod privilege;
pub mod routes;
pub mod state;
pub mod users;

pub use error::ApiError;
pub use routes::router;
pub use state::{AppState, AppStateInner};
