use crate::db::users;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use tower_sessions::Session;

/// Cookie session key holding the logged-in user's id
pub const SESSION_USER_KEY: &str = "user_id";

/// The caller, as resolved by [`require_auth`]
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub email: String,
}

/// Reject requests without a logged-in user; expose the user to handlers
/// as `Extension<CurrentUser>`.
///
/// A cookie session wins over a bearer token when both are present.
pub async fn require_auth(
    State(state): State<AppState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = match session_user(&state, &session).await? {
        Some(user) => Some(user),
        None => match bearer_token(request.headers()) {
            Some(token) => bearer_user(&state, token).await?,
            None => None,
        },
    };

    match user {
        Some(user) => {
            request.extensions_mut().insert(user);
            Ok(next.run(request).await)
        }
        None => Err(AppError::Unauthorized("Not authenticated".to_string())),
    }
}

/// `Authorization: Bearer <token>`, if present
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

async fn session_user(state: &AppState, session: &Session) -> AppResult<Option<CurrentUser>> {
    let user_id: Option<String> = session
        .get(SESSION_USER_KEY)
        .await
        .map_err(|e| AppError::Internal(format!("Session error: {}", e)))?;

    let Some(user_id) = user_id else {
        return Ok(None);
    };

    // A session can outlive its user
    match users::find_by_id(&state.db, &user_id).await {
        Ok(user) => Ok(Some(CurrentUser {
            id: user.id,
            email: user.email,
        })),
        Err(AppError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Resolve a bearer token through the identity provider and map it to the
/// local user record, mirroring identities seen for the first time.
async fn bearer_user(state: &AppState, token: &str) -> AppResult<Option<CurrentUser>> {
    let Some(identity) = state.identity.resolve_access_token(token).await? else {
        return Ok(None);
    };
    let Some(email) = identity.email else {
        tracing::debug!(identity = %identity.id, "Identity without email cannot use passkeys");
        return Ok(None);
    };

    let user = match users::find_by_email(&state.db, &email).await? {
        Some(user) => user,
        None => {
            tracing::info!(identity = %identity.id, "Mirroring new identity user");
            users::create_user(&state.db, &email).await?
        }
    };

    Ok(Some(CurrentUser {
        id: user.id,
        email: user.email,
    }))
}
