//! Request authentication.
//!
//! Two mechanisms populate [`AuthContext`]:
//!
//! 1. `Authorization: ApiKey <secret>`, validated against the key registry
//! 2. A tenant id forwarded by a trusted upstream session layer
//!
//! A request carrying neither passes through untouched; handlers that need an
//! identity reject it when extracting [`AuthContext`].

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{error::AppError, models::api_key::ApiKey, state::AppState};

/// Authorization scheme accepted by [`api_key_auth_middleware`].
pub const API_KEY_SCHEME: &str = "ApiKey";

/// Who is making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    /// Machine caller authenticated by API key. Subject to rate limiting.
    Api,
    /// Interactive caller authenticated upstream.
    Session,
}

/// Authentication context attached to authenticated requests.
///
/// Inserted into the request's extension map; handlers take it as an extractor
/// and get a 401 when no mechanism authenticated the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub tenant_id: Uuid,
    pub principal: Principal,
    pub api_key_id: Option<Uuid>,
    pub scopes: Vec<String>,
}

impl AuthContext {
    pub fn api(key: &ApiKey) -> Self {
        Self {
            tenant_id: key.tenant_id,
            principal: Principal::Api,
            api_key_id: Some(key.id),
            scopes: key.scopes.clone(),
        }
    }

    pub fn session(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            principal: Principal::Session,
            api_key_id: None,
            scopes: Vec::new(),
        }
    }
}

impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| AppError::unauthorized("Authentication required"))
    }
}

/// Secret of an `Authorization: ApiKey <secret>` header, if that is the scheme used.
///
/// The scheme is matched case-insensitively on the raw bytes. Any other scheme
/// (e.g. `Bearer`) yields `Ok(None)`; an `ApiKey` credential whose secret is not
/// valid UTF-8 is rejected rather than treated as absent.
pub fn extract_api_key(headers: &HeaderMap) -> Result<Option<&str>, AppError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let bytes = value.as_bytes();
    let (scheme, secret) = match bytes.iter().position(|b| *b == b' ') {
        Some(space) => (&bytes[..space], &bytes[space + 1..]),
        None => (bytes, &[][..]),
    };

    if !scheme.eq_ignore_ascii_case(API_KEY_SCHEME.as_bytes()) {
        return Ok(None);
    }

    std::str::from_utf8(secret)
        .map(|secret| Some(secret.trim()))
        .map_err(|_| AppError::unauthorized("Malformed API key"))
}

/// API key authentication middleware function.
///
/// # Flow
///
/// 1. No `ApiKey` credential: call the next handler unchanged
///    (a malformed one is rejected with 401)
/// 2. Validate the secret against the registry
/// 3. If valid: inject `AuthContext` and call the next handler
/// 4. If unknown or revoked: return 401 without reaching the handler
pub async fn api_key_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let presented = extract_api_key(request.headers()).inspect_err(|_| {
        state
            .observability
            .record_metric("auth.rejected", 1.0, &[("reason", "malformed_api_key")]);
    })?;
    let Some(secret) = presented.map(str::to_owned) else {
        return Ok(next.run(request).await);
    };

    let Some(key) = state.registry.validate(&secret).await? else {
        state
            .observability
            .record_metric("auth.rejected", 1.0, &[("reason", "invalid_api_key")]);
        return Err(AppError::unauthorized("Invalid or revoked API key"));
    };

    request.extensions_mut().insert(AuthContext::api(&key));

    Ok(next.run(request).await)
}

/// Accept a tenant asserted by the trusted upstream header.
///
/// Only consulted when no API key authenticated the request, so an API-key
/// rejection can never be overridden by a forwarded header. A malformed tenant id
/// is ignored.
pub async fn forwarded_identity_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(header) = &state.trusted_tenant_header {
        let already_authenticated = request.extensions().get::<AuthContext>().is_some();
        let forwarded_tenant = request
            .headers()
            .get(header)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v.trim()).ok());

        if let (false, Some(tenant_id)) = (already_authenticated, forwarded_tenant) {
            request.extensions_mut().insert(AuthContext::session(tenant_id));
        }
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(authorization: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(authorization).unwrap());
        headers
    }

    fn secret_of(authorization: &str) -> Option<String> {
        extract_api_key(&headers(authorization))
            .unwrap()
            .map(str::to_owned)
    }

    #[test]
    fn extracts_api_key_scheme() {
        assert_eq!(secret_of("ApiKey ak_abc").as_deref(), Some("ak_abc"));
        assert_eq!(secret_of("ApiKey   ak_abc ").as_deref(), Some("ak_abc"));
    }

    #[test]
    fn scheme_is_case_insensitive() {
        assert_eq!(secret_of("apikey ak_abc").as_deref(), Some("ak_abc"));
        assert_eq!(secret_of("APIKEY ak_abc").as_deref(), Some("ak_abc"));
    }

    #[test]
    fn other_schemes_are_ignored() {
        assert_eq!(secret_of("Bearer ak_abc"), None);
        assert_eq!(secret_of("Basic dXNlcjpwYXNz"), None);
        assert_eq!(secret_of("ApiKeyak_abc"), None);
        assert!(matches!(extract_api_key(&HeaderMap::new()), Ok(None)));
    }

    #[test]
    fn empty_secret_is_still_an_api_key_attempt() {
        assert_eq!(secret_of("ApiKey ").as_deref(), Some(""));
        assert_eq!(secret_of("ApiKey").as_deref(), Some(""));
    }

    #[test]
    fn non_utf8_secret_is_rejected_not_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_bytes(b"ApiKey ak_\xffbogus").unwrap(),
        );

        assert!(matches!(
            extract_api_key(&headers),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn non_utf8_value_under_other_scheme_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_bytes(b"Bearer \xfftoken").unwrap(),
        );

        assert!(matches!(extract_api_key(&headers), Ok(None)));
    }

    #[tokio::test]
    async fn extractor_rejects_unauthenticated_requests() {
        let (mut parts, _) = Request::new(axum::body::Body::empty()).into_parts();
        let result = AuthContext::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));

        let context = AuthContext::session(Uuid::new_v4());
        parts.extensions.insert(context.clone());
        let extracted = AuthContext::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(extracted, context);
    }
}
