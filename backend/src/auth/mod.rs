use std::convert::Infallible;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crates::domain::value_objects::accounts::IdentityProfile;

#[derive(Debug, Serialize, Deserialize)]
pub struct SupabaseClaims {
    pub sub: String,
    pub role: Option<String>,
    pub email: Option<String>,
    pub exp: usize,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UserMetadata {
    pub full_name: Option<String>,
    pub name: Option<String>,
    pub email_verified: Option<bool>,
}

#[derive(Debug)]
pub struct AuthError(anyhow::Error);

impl AuthError {
    pub fn into_inner(self) -> anyhow::Error {
        self.0
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        AuthError(err)
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn validate_supabase_jwt(token: &str, secret: &str) -> Result<SupabaseClaims, AuthError> {
    if secret.is_empty() {
        return Err(anyhow::anyhow!("JWT secret is not configured").into());
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&["authenticated"]);

    let token_data = decode::<SupabaseClaims>(token, &decoding_key, &validation)
        .map_err(|e| anyhow::anyhow!("JWT validation failed: {}", e))?;

    Ok(token_data.claims)
}

impl SupabaseClaims {
    pub fn into_profile(self) -> Result<IdentityProfile, AuthError> {
        let subject = Uuid::parse_str(&self.sub)
            .map_err(|_| anyhow::anyhow!("Invalid user ID in token"))?;

        let email = self
            .email
            .map(|email| email.trim().to_ascii_lowercase())
            .filter(|email| !email.is_empty());

        let display_name = self
            .user_metadata
            .full_name
            .or(self.user_metadata.name)
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        Ok(IdentityProfile {
            subject,
            email,
            display_name,
            email_verified: self.user_metadata.email_verified.unwrap_or(false),
        })
    }
}

/// Raw bearer token, if the request carried one. Verification happens in the identity gate
/// so the abuse throttle can run first.
#[derive(Debug, Clone, Default)]
pub struct Credential(pub Option<String>);

impl Credential {
    pub fn token(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

pub fn bearer_token(header_value: &str) -> Option<&str> {
    let token = header_value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() { None } else { Some(token) }
}

#[async_trait]
impl<S> FromRequestParts<S> for Credential
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .map(str::to_string);

        Ok(Credential(token))
    }
}
