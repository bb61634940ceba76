use axum::{
    Router,
    extract::{FromRef, Request, State},
    http::HeaderName,
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod models;
pub mod navigation;
pub mod repository;
pub mod resolver;
pub mod session;
pub mod supabase;

pub mod routes;
use routes::{authenticated, public, scoped};

use auth::{AuthUser, GrantedRole, authenticate};
use error::AccessError;
use guard::{AllowedRoles, RouteGuard};
use models::Role;
use session::Session;

// --- Public Re-exports ---

pub use config::AppConfig;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use resolver::{LookupMode, RoleResolver};
pub use supabase::SupabaseRestRepository;

/// ApiDoc
///
/// OpenAPI document for the portal access API, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_me, handlers::get_my_nav, handlers::check_access,
        handlers::scope_landing
    ),
    components(
        schemas(
            models::Role, models::Principal, models::RoleProfile, models::GuardDecision,
            models::NavEntry, models::NavView, models::MeResponse, models::ScopeLanding,
            models::AccessCheckRequest,
        )
    ),
    tags(
        (name = "link-estudiantil", description = "Student portal access API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, immutable state handed to every request.
#[derive(Clone)]
pub struct AppState {
    /// Identity & data backend.
    pub repo: RepositoryState,
    /// Role resolver over `repo`.
    pub resolver: RoleResolver,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        let resolver = RoleResolver::new(repo.clone(), config.lookup);
        Self {
            repo,
            resolver,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for RoleResolver {
    fn from_ref(app_state: &AppState) -> RoleResolver {
        app_state.resolver.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Rejects requests without a principal before they reach the authenticated routes.
/// `AuthUser` does the work; its rejection (401/503) short-circuits the request.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// RoleScope
///
/// State for one role-scoped subtree's guard: the app state plus the roles it admits.
#[derive(Clone)]
struct RoleScope {
    app: AppState,
    allowed: AllowedRoles,
}

/// role_guard
///
/// Runs the route guard for a role-scoped subtree. On `Authorized` the request proceeds
/// with a `GrantedRole` extension; every denial is the same 303 to the fallback route.
///
/// The steps:
/// 1. Authentication: the request's principal (or none) seeds a per-request `Session`.
/// 2. Guard Evaluation: the same `RouteGuard::evaluate` path the UI shell uses.
/// 3. Hand-off: the granted principal and role travel to the handler as an extension,
///    so the handler never re-authenticates.
async fn role_guard(State(scope): State<RoleScope>, request: Request, next: Next) -> Response {
    let RoleScope { app, allowed } = scope;
    let (parts, body) = request.into_parts();
    let guard = RouteGuard::new(allowed, app.config.fallback_route.clone());

    // 1. Authentication
    // A backend failure while identifying the caller is a denial like any other.
    let principal = match authenticate(&parts, &app.repo, &app.config).await {
        Ok(principal) => principal,
        Err(e) => {
            AccessError::BackendUnavailable(e).log();
            return Redirect::to(guard.fallback()).into_response();
        }
    };
    let session = match principal.clone() {
        Some(principal) => Session::signed_in(principal),
        None => Session::signed_out(),
    };

    // 2. Guard Evaluation
    // Denials are logged inside `evaluate`; the response does not say which kind it was.
    let role = match guard.evaluate(&session.subscribe(), &app.resolver).await {
        Ok(role) => role,
        Err(_) => return Redirect::to(guard.fallback()).into_response(),
    };

    // 3. Hand-off
    // `Authorized` implies a principal was present.
    let Some(principal) = principal else {
        return Redirect::to(guard.fallback()).into_response();
    };
    let mut request = Request::from_parts(parts, body);
    request
        .extensions_mut()
        .insert(GrantedRole { principal, role });
    next.run(request).await
}

/// create_router
///
/// Assembles the routing tree: public routes, authenticated routes behind
/// `auth_middleware`, and one guarded subtree per role. Observability and CORS wrap the
/// whole tree.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let mut base_router = Router::new()
        // Documentation: Swagger UI over the generated OpenAPI document.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public Routes: no middleware.
        .merge(public::public_routes())
        // Authenticated Routes: any signed-in principal, whatever its role.
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        );

    // 3. Role-Scoped Subtrees
    // Each subtree admits exactly one role. The guard runs as a route layer, so unknown
    // paths under a scope still 404 instead of redirecting.
    for role in Role::PRIORITY {
        let scope = RoleScope {
            app: state.clone(),
            allowed: AllowedRoles::only(role),
        };
        base_router = base_router.nest(
            scoped::scope_path(role),
            scoped::role_routes().route_layer(middleware::from_fn_with_state(scope, role_guard)),
        );
    }

    // 4. Observability and Correlation Layers
    base_router
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                // 4a. Request ID Generation: a UUID per incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 4b. Request Tracing: one span per request, tagged with the request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 4c. Request ID Propagation: echo `x-request-id` back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 5. CORS Layer (outermost)
        .layer(cors)
}

/// trace_span_logger
///
/// Span per request carrying method, uri and the `x-request-id` set above, so every log
/// line of a request (including guard denials) can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
