//! Error response handling for authentication extractors.

use axum::{
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use medai_api::ApiError;

use crate::error::AuthError;

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthorized { message } => ApiError::unauthorized(message),
            AuthError::Forbidden { message } => ApiError::forbidden(message),
            other => ApiError::internal(other.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let challenge = matches!(self, AuthError::Unauthorized { .. });
        let mut response = ApiError::from(self).into_response();
        if challenge {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn unauthorized_carries_bearer_challenge() {
        let resp = AuthError::unauthorized("Not authenticated").into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            resp.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }

    #[test]
    fn forbidden_has_no_challenge() {
        let resp = AuthError::forbidden("Admin access only").into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert!(resp.headers().get(header::WWW_AUTHENTICATE).is_none());
    }

    #[test]
    fn hashing_failure_is_internal() {
        let api: ApiError = AuthError::password_hash("boom").into();
        assert_eq!(api.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
