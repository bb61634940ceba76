use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Endpoints any signed-in principal may call, with or without a recognized role. Each
/// handler takes the `AuthUser` extractor, and `create_router` also layers the
/// authentication check over the whole group.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        // Principal, resolved role and post-login landing path.
        .route("/me", get(handlers::get_me))
        // GET /me/nav
        // Navbar view state: role menu plus unread notification badge.
        .route("/me/nav", get(handlers::get_my_nav))
        // POST /access/check
        // Guard decision for a client-side route's allowed roles.
        .route("/access/check", post(handlers::check_access))
}
