use crate::{
    AppState,
    auth::{AuthUser, GrantedRole},
    guard::{AllowedRoles, RouteGuard},
    models::{
        AccessCheckRequest, GuardDecision, MeResponse, NavView, Principal, Role, ScopeLanding,
    },
    navigation,
    session::Session,
};
use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
};

/// get_me
///
/// [Authenticated Route] The signed-in principal, its resolved role and where it should
/// land. A principal without a role gets `role: null` and no home.
///
/// Returns 503 when the role could not be resolved because the backend failed.
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Session summary", body = MeResponse),
        (status = 401, description = "Not signed in"),
        (status = 503, description = "Backend unavailable")
    )
)]
pub async fn get_me(
    AuthUser { principal }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<MeResponse>, StatusCode> {
    let role = resolve_or_unavailable(&state, &principal).await?;

    Ok(Json(MeResponse {
        id: principal.id,
        email: principal.email,
        role,
        home: role.map(|r| navigation::home_path(r).to_string()),
        expires_at: principal.expires_at,
    }))
}

/// get_my_nav
///
/// [Authenticated Route] Navbar view state for the signed-in principal.
///
/// The unread badge is best-effort: if the notifications lookup fails the badge is 0 and
/// the menu is still served.
#[utoipa::path(
    get,
    path = "/me/nav",
    responses(
        (status = 200, description = "Navigation view", body = NavView),
        (status = 401, description = "Not signed in"),
        (status = 503, description = "Backend unavailable")
    )
)]
pub async fn get_my_nav(
    AuthUser { principal }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<NavView>, StatusCode> {
    let role = resolve_or_unavailable(&state, &principal).await?;

    let unread = match state.repo.count_unread_notifications(principal.id).await {
        Ok(count) => count,
        Err(e) => {
            tracing::warn!(principal_id = %principal.id, error = %e, "unread count unavailable");
            0
        }
    };

    Ok(Json(NavView::derive(Some(&principal), role, unread)))
}

/// check_access
///
/// [Authenticated Route] Runs the route guard for a client-side route that accepts
/// `allowed_roles`. Every denial produces the same body.
#[utoipa::path(
    post,
    path = "/access/check",
    request_body = AccessCheckRequest,
    responses(
        (status = 200, description = "Guard decision", body = GuardDecision),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn check_access(
    AuthUser { principal }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<AccessCheckRequest>,
) -> Json<GuardDecision> {
    let allowed: AllowedRoles = payload.allowed_roles.into_iter().collect();
    let guard = RouteGuard::new(allowed, state.config.fallback_route.clone());
    let session = Session::signed_in(principal);

    let decision = match guard.evaluate(&session.subscribe(), &state.resolver).await {
        Ok(role) => GuardDecision::granted(role),
        Err(_) => GuardDecision::denied(),
    };
    Json(decision)
}

/// scope_landing
///
/// [Role-Scoped Route] Landing data for `/estudiante`, `/consejero` and `/coordinador`:
/// the caller's profile row (for the layout's display name) and its menu. Only reachable
/// through the role guard, which supplies `GrantedRole` (principal and role).
#[utoipa::path(
    get,
    path = "/{scope}",
    params(("scope" = String, Path, description = "estudiante | consejero | coordinador")),
    responses(
        (status = 200, description = "Scope landing", body = ScopeLanding),
        (status = 303, description = "Denied; redirected to the public fallback route"),
        (status = 503, description = "Backend unavailable")
    )
)]
pub async fn scope_landing(
    Extension(GrantedRole { principal, role }): Extension<GrantedRole>,
    State(state): State<AppState>,
) -> Result<Json<ScopeLanding>, StatusCode> {
    let profile = state
        .repo
        .find_role_profile(role, principal.id)
        .await
        .map_err(|e| {
            tracing::error!(principal_id = %principal.id, error = %e, "profile lookup failed");
            StatusCode::SERVICE_UNAVAILABLE
        })?;

    Ok(Json(ScopeLanding {
        role,
        profile,
        nav: navigation::entries_for(Some(role)).to_vec(),
    }))
}

async fn resolve_or_unavailable(
    state: &AppState,
    principal: &Principal,
) -> Result<Option<Role>, StatusCode> {
    state.resolver.resolve(principal.id).await.map_err(|e| {
        tracing::error!(principal_id = %principal.id, error = %e, "role resolution failed");
        StatusCode::SERVICE_UNAVAILABLE
    })
}
