use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, Uri},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::AppState;

/// Bearer token from the `Authorization` header, falling back to a `token` query
/// parameter.
fn presented_token(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    let from_header = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(|value| value.strip_prefix("Bearer ").unwrap_or(value).trim().to_string());

    from_header.or_else(|| {
        uri.query().and_then(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == "token")
                .map(|(_, value)| value.into_owned())
        })
    })
}

pub async fn admin_auth(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let authorized = presented_token(req.headers(), req.uri())
        .is_some_and(|token| state.authorizer.authorize(&token));

    if !authorized {
        tracing::warn!(uri = %req.uri().path(), "admin request rejected");
        return Err(AppError::Unauthorized("invalid admin token".to_string()));
    }

    Ok(next.run(req).await)
}

/// Pet identifier of the signed-in customer.
pub struct CustomerIdentity(pub String);

#[async_trait]
impl FromRequestParts<AppState> for CustomerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = presented_token(&parts.headers, &parts.uri)
            .ok_or_else(|| AppError::Unauthorized("missing session token".to_string()))?;

        state.customers.authenticate(&token).map(CustomerIdentity)
    }
}
