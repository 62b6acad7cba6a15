use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config;
use crate::types::AccountType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub tenant_id: i64,
    pub org_id: Option<i64>,
    pub account: String,
    pub account_type: i32,
    pub jti: Uuid,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(
        user_id: i64,
        tenant_id: i64,
        org_id: Option<i64>,
        account: String,
        account_type: AccountType,
    ) -> Self {
        let now = Utc::now();
        let expiry_hours = config::config().security.jwt_expiry_hours;
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            user_id,
            tenant_id,
            org_id,
            account,
            account_type: account_type.as_i32(),
            jti: Uuid::new_v4(),
            exp,
            iat: now.timestamp(),
        }
    }
}

/// Authenticated caller identity consumed (read-only) by scope resolution
/// and the row-filter builder.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub tenant_id: i64,
    pub org_id: Option<i64>,
    pub account: String,
    pub account_type: AccountType,
}

impl AuthUser {
    pub fn is_super_admin(&self) -> bool {
        self.account_type == AccountType::SuperAdmin
    }
}

impl TryFrom<Claims> for AuthUser {
    type Error = JwtError;

    fn try_from(claims: Claims) -> Result<Self, JwtError> {
        let account_type = AccountType::from_i32(claims.account_type)
            .ok_or(JwtError::InvalidClaims("unknown account type"))?;
        Ok(Self {
            user_id: claims.user_id,
            tenant_id: claims.tenant_id,
            org_id: claims.org_id,
            account: claims.account,
            account_type,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("JWT validation error: {0}")]
    TokenValidation(String),

    #[error("invalid claims: {0}")]
    InvalidClaims(&'static str),

    #[error("JWT secret not configured")]
    MissingSecret,
}

pub fn generate_jwt(claims: &Claims) -> Result<String, JwtError> {
    let secret = &config::config().security.jwt_secret;
    if secret.is_empty() {
        return Err(JwtError::MissingSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key)
        .map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

pub fn validate_jwt(token: &str) -> Result<Claims, JwtError> {
    let secret = &config::config().security.jwt_secret;
    if secret.is_empty() {
        return Err(JwtError::MissingSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let token_data = decode::<Claims>(token, &decoding_key, &Validation::default())
        .map_err(|e| JwtError::TokenValidation(e.to_string()))?;
    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normal_user() -> AuthUser {
        AuthUser {
            user_id: 7,
            tenant_id: 1,
            org_id: Some(100),
            account: "user1".to_string(),
            account_type: AccountType::Normal,
        }
    }

    #[test]
    fn super_admin_flag_follows_account_type() {
        let mut user = normal_user();
        assert!(!user.is_super_admin());
        user.account_type = AccountType::SuperAdmin;
        assert!(user.is_super_admin());
    }

    #[test]
    fn claims_with_unknown_account_type_are_rejected() {
        let claims = Claims {
            user_id: 1,
            tenant_id: 1,
            org_id: None,
            account: "x".to_string(),
            account_type: 99,
            jti: Uuid::new_v4(),
            exp: 0,
            iat: 0,
        };
        assert!(AuthUser::try_from(claims).is_err());
    }
}
