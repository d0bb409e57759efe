use axum::Router;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::http::header::LOCATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum_extra::extract::cookie::CookieJar;
use tower_sessions::Session;

use super::controllers::{self, CallbackOutcome, LoginOutcome};
use super::cookies;
use super::error::AuthError;
use super::session::{load, store};
use super::state::AuthState;
use super::traits::OidcClient;
use super::types::OidcSession;

/// Create the OIDC authentication router.
///
/// Mounts `login`, `callback`, `logout` and `session/remaining-time` under
/// the configured auth path. Must run inside [`session_layer`](super::session_layer).
pub fn auth_routes<C: OidcClient>(state: AuthState<C>) -> Router {
    let auth_path = state.options.auth_path.trim_end_matches('/').to_string();

    Router::new()
        .route(&format!("{auth_path}/login"), get(login::<C>))
        .route(&format!("{auth_path}/callback"), get(callback::<C>))
        .route(
            &format!("{auth_path}/logout"),
            get(logout::<C>).post(logout::<C>),
        )
        .route(
            &format!("{auth_path}/session/remaining-time"),
            get(session_idle_remaining_time::<C>),
        )
        .with_state(state)
}

// ── Login ──────────────────────────────────────────────────────────

async fn login<C: OidcClient>(
    State(state): State<AuthState<C>>,
    session: Session,
    request: Request,
) -> Result<Response, AuthError> {
    let (parts, _body) = request.into_parts();
    let mut record = load(&session).await?;

    let outcome = controllers::login(state.client(), state.options(), &mut record, &parts)?;

    if let LoginOutcome::Authorize(_) = &outcome {
        store(&session, &record).await?;
    }

    Ok(found(outcome.location()))
}

// ── Callback ───────────────────────────────────────────────────────

async fn callback<C: OidcClient>(
    State(state): State<AuthState<C>>,
    session: Session,
    request: Request,
) -> Result<Response, AuthError> {
    let (parts, _body) = request.into_parts();
    let mut record = load(&session).await?;
    let had_pending_login = record.oidc_state.is_some();

    let outcome =
        controllers::callback(state.client(), state.options(), &mut record, &parts).await;

    if let CallbackOutcome::Authenticated { .. } = &outcome {
        // New privilege level, new session ID.
        session.cycle_id().await?;
        store(&session, &record).await?;
    } else if had_pending_login {
        store(&session, &record).await?;
    }

    Ok(found(outcome.location()))
}

// ── Token set ──────────────────────────────────────────────────────

/// Middleware for protected routes: refreshes an expired token set and
/// attaches an [`AuthContext`](super::AuthContext) to the request.
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/dashboard", get(dashboard))
///     .route_layer(axum::middleware::from_fn_with_state(
///         auth.clone(),
///         token_set_middleware::<ProviderClient>,
///     ))
///     .merge(auth_routes(auth))
///     .layer(session_layer(&options, MemoryStore::default()));
/// ```
///
/// # Errors
///
/// Returns [`AuthError::Session`] if the session store fails.
pub async fn token_set_middleware<C: OidcClient>(
    State(state): State<AuthState<C>>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if state.options.bypass.token_set {
        return Ok(next.run(request).await);
    }

    let mut record = load(&session).await?;
    let outcome = controllers::token_set(state.client(), state.options(), &mut record).await;

    if outcome.session_changed() {
        store(&session, &record).await?;
    }

    request.extensions_mut().insert(outcome.context());
    Ok(next.run(request).await)
}

// ── Logout ─────────────────────────────────────────────────────────

async fn logout<C: OidcClient>(
    State(state): State<AuthState<C>>,
    session: Session,
    jar: CookieJar,
) -> Result<(CookieJar, Response), AuthError> {
    let record = load(&session).await.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Session unreadable during logout");
        OidcSession::default()
    });

    let outcome = controllers::logout(state.client(), state.options(), &record);

    if outcome.destroy_session {
        session.flush().await?;
        tracing::info!("OIDC session destroyed on logout");
    }

    let jar = jar.add(cookies::clear_sso_cookie(&state.options.application_domain));
    Ok((jar, found(&outcome.redirect)))
}

// ── Session idle remaining time ────────────────────────────────────

async fn session_idle_remaining_time<C: OidcClient>(
    State(state): State<AuthState<C>>,
    session: Session,
) -> Result<Json<i64>, AuthError> {
    let record = load(&session).await?;
    Ok(Json(controllers::session_idle_remaining_time(
        state.options(),
        &record,
    )))
}

// ── Helpers ────────────────────────────────────────────────────────

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}
