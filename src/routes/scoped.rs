use crate::{AppState, handlers, models::Role};
use axum::{Router, routing::get};

/// Role-Scoped Router Module
///
/// One subtree per role, mounted at `scope_path(role)`. `create_router` wraps each with
/// the role guard configured for exactly that role, so handlers in here can rely on the
/// `GrantedRole` extension being present.
pub fn role_routes() -> Router<AppState> {
    Router::new()
        // GET /{scope}
        // Layout landing data: the caller's profile row and menu.
        .route("/", get(handlers::scope_landing))
}

/// Mount point of a role's subtree.
pub fn scope_path(role: Role) -> &'static str {
    match role {
        Role::Student => "/estudiante",
        Role::Advisor => "/consejero",
        Role::Coordinator => "/coordinador",
    }
}
