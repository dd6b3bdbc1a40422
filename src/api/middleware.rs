use crate::api::AppState;
use crate::domain::auth_session::Authenticated;
use crate::error::{AppError, AuthFailure};
use axum::{
    extract::FromRequestParts,
    http::{HeaderValue, Request, header, request::Parts},
};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// The verified caller of a protected route.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Authenticated);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AppError::Auth(AuthFailure::MissingToken))?;

        let auth = state.token_verifier.verify(token).await?;
        tracing::Span::current().record("user_id", tracing::field::display(auth.user.id));

        Ok(Self(auth))
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

/// Reuses a client-supplied `x-request-id` when it is a UUID, otherwise mints one.
#[derive(Clone, Copy, Debug, Default)]
pub struct MakeRequestUuidOrHeader;

impl MakeRequestId for MakeRequestUuidOrHeader {
    fn make_request_id<B>(&mut self, request: &Request<B>) -> Option<RequestId> {
        if let Some(existing) = request.headers().get("x-request-id")
            && existing.to_str().ok().is_some_and(|v| Uuid::parse_str(v).is_ok())
        {
            return Some(RequestId::new(existing.clone()));
        }

        HeaderValue::from_str(&Uuid::new_v4().to_string()).ok().map(RequestId::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn parts(authorization: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc.def.ghi"))), Some("abc.def.ghi"));
        assert_eq!(bearer_token(&parts(Some("Basic dXNlcjpwYXNz"))), None);
        assert_eq!(bearer_token(&parts(Some("Bearer "))), None);
        assert_eq!(bearer_token(&parts(None)), None);
    }

    #[test]
    fn test_request_id_reuses_valid_uuid_only() {
        let id = Uuid::new_v4().to_string();
        let request = Request::builder().header("x-request-id", &id).body(()).unwrap();
        let made = MakeRequestUuidOrHeader.make_request_id(&request).unwrap();
        assert_eq!(made.header_value().to_str().unwrap(), id);

        let request = Request::builder().header("x-request-id", "<script>").body(()).unwrap();
        let made = MakeRequestUuidOrHeader.make_request_id(&request).unwrap();
        assert_ne!(made.header_value().to_str().unwrap(), "<script>");
    }
}
