use crate::error::Error;
use crate::models::actor::{Actor, Role};
use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Bearer token claims. `sub` carries the LMS user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub role: Option<String>,
}

impl TryFrom<&Claims> for Actor {
    type Error = Error;

    fn try_from(claims: &Claims) -> Result<Self, Self::Error> {
        let id = claims
            .sub
            .trim()
            .parse::<i64>()
            .map_err(|_| Error::Unauthorized("invalid_subject".to_string()))?;
        let role = claims
            .role
            .as_deref()
            .map(Role::parse)
            .ok_or_else(|| Error::Unauthorized("missing_role".to_string()))?;
        Ok(Actor::new(id, role))
    }
}

pub fn decode_bearer(header: Option<&str>, secret: &str) -> Result<Claims, Error> {
    let Some(auth_str) = header else {
        return Err(Error::Unauthorized("missing_authorization".to_string()));
    };
    let Some(token) = auth_str.strip_prefix("Bearer ") else {
        return Err(Error::Unauthorized("unsupported_scheme".to_string()));
    };

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    decode::<Claims>(
        token.trim(),
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| Error::Unauthorized("invalid_token".to_string()))
}

pub async fn require_bearer_auth(mut req: Request, next: Next) -> Response {
    let header = match req.headers().get(axum::http::header::AUTHORIZATION) {
        Some(value) => match value.to_str() {
            Ok(s) => Some(s.to_string()),
            Err(_) => {
                return Error::Unauthorized("bad_authorization".to_string()).into_response();
            }
        },
        None => None,
    };

    let config = crate::config::get_config();
    match decode_bearer(header.as_deref(), &config.jwt_secret) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(err) => {
            tracing::debug!(error = %err, "rejected bearer credential");
            err.into_response()
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts
            .extensions
            .get::<Claims>()
            .ok_or_else(|| Error::Unauthorized("missing_authorization".to_string()))?;
        Actor::try_from(claims)
    }
}
