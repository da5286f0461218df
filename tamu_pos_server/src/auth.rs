//! Access tokens.
//!
//! Staff authenticate with an HS256 JWT in the `Authorization: Bearer <token>` header. The claims carry the
//! restaurant the user works for, and every authenticated route is scoped to that restaurant. Tokens are issued by the
//! account service that shares `TPOS_JWT_SECRET` with this server; [`TokenIssuer`] exists for that service, the CLI
//! and tests.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, http::header::AUTHORIZATION, web, FromRequest, HttpRequest};
use chrono::{Duration, Utc};
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::*;
use serde::{Deserialize, Serialize};
use tamu_pos_engine::db_types::RestaurantId;

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JwtClaims {
    pub user_id: String,
    pub email: String,
    pub role: String,
    pub restaurant_id: RestaurantId,
    /// Expiry, in seconds since the Unix epoch
    pub exp: i64,
}

impl JwtClaims {
    pub fn new<S: Into<String>>(user_id: S, email: S, role: S, restaurant_id: RestaurantId, valid_for: Duration) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            role: role.into(),
            restaurant_id,
            exp: (Utc::now() + valid_for).timestamp(),
        }
    }
}

impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(claims_from_request(req))
    }
}

fn claims_from_request(req: &HttpRequest) -> Result<JwtClaims, ServerError> {
    let validator = req
        .app_data::<web::Data<TokenValidator>>()
        .ok_or_else(|| ServerError::ConfigurationError("No access token validator has been configured".into()))?;
    let header = req.headers().get(AUTHORIZATION).ok_or(AuthError::MissingToken)?;
    let token = header
        .to_str()
        .ok()
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AuthError::InvalidToken("Expected a Bearer token".into()))?;
    let claims = validator.validate(token)?;
    trace!("💻️ Access token validated for {} ({})", claims.email, claims.restaurant_id);
    Ok(claims)
}

pub struct TokenIssuer {
    key: EncodingKey,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self { key: EncodingKey::from_secret(config.jwt_secret.reveal().as_bytes()) }
    }

    pub fn issue_token(&self, claims: &JwtClaims) -> Result<String, ServerError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.key)
            .map_err(|e| ServerError::Unspecified(format!("Could not sign access token. {e}")))
    }
}

pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(config: &AuthConfig) -> Self {
        let key = DecodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);
        Self { key, validation }
    }

    pub fn validate(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.key, &self.validation).map_err(|e| {
            debug!("💻️ Rejecting access token. {e}");
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken(e.to_string()),
            }
        })?;
        Ok(data.claims)
    }
}
