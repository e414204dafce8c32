use axum::{
    extract::{Extension, Request},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::error::ApiError;
use crate::auth::{bearer_token, AuthUser, TokenKeys};

/// Rejects the request with 401 unless it carries a valid bearer token.
/// On success the caller is available to handlers as `Extension<AuthUser>`.
pub async fn require_auth(
    Extension(keys): Extension<TokenKeys>,
    mut request: Request,
    next: Next,
) -> Response {
    let claims = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .and_then(|token| keys.verify(token));

    match claims {
        Some(claims) => {
            tracing::Span::current().record("user_id", claims.sub);
            request.extensions_mut().insert(AuthUser::from(claims));
            next.run(request).await
        }
        None => ApiError::Unauthorized.into_response(),
    }
}
