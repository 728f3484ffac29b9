use axum::{
    Json, Router,
    http::{HeaderName, Method, StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use handraise_types::api::StatusResponse;

use crate::middleware::{attach_traceback, require_auth};
use crate::state::AppState;
use crate::{messages, privilege, users};

pub fn router(state: AppState) -> Router {
    let mut write_routes = Router::new()
        .route("/auth", post(users::register))
        .route("/post", post(messages::post_message))
        .route("/add", post(privilege::raise_hand))
        .route("/accept", post(privilege::accept_request))
        .route("/delete", post(privilege::remove_from_list));

    if state.jwt_secret.is_some() {
        write_routes =
            write_routes.route_layer(middleware::from_fn_with_state(state.clone(), require_auth));
    }

    let mut app = Router::new()
        .route("/", get(ping))
        .merge(write_routes)
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .with_state(state.clone());

    if state.debug {
        app = app.layer(middleware::from_fn(attach_traceback));
    }

    app.layer(cors()).layer(TraceLayer::new_for_http())
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_headers([HeaderName::from_static("x-requested-with"), header::AUTHORIZATION])
        .allow_methods([Method::POST, Method::GET, Method::OPTIONS])
}

/// GET / — liveness check.
pub async fn ping() -> Json<StatusResponse> {
    Json(StatusResponse::ok("Looks good"))
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(StatusResponse::new(404, "Illegal call")),
    )
}

async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(StatusResponse::new(405, "Method Not Allowed")),
    )
}
