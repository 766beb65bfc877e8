use actix_web::{dev::Payload, Error as ActixWebError};
use actix_web::{error::ErrorUnauthorized, http, FromRequest, HttpMessage, HttpRequest};
use core::fmt;
use jsonwebtoken::{decode, DecodingKey, Validation};
use once_cell::sync::OnceCell;
use secrecy::ExposeSecret;
use std::future::{ready, Ready};
use uuid::Uuid;

use crate::core::config::JwtAuthConfig;
use crate::core::AppError;
use crate::models::principals::PrincipalRole;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", serde_json::to_string(&self).unwrap())
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    message: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtClaims {
    pub sub: String, // principal ID
    pub email: String,
    pub role: String,
    pub exp: usize, // expiration time
}

#[derive(Debug)]
pub struct JwtMiddleware {
    pub principal_id: Uuid,
    pub role: PrincipalRole,
    pub claims: JwtClaims,
}

// development fallback, overridden by init_jwt_auth at server build
const DEFAULT_JWT_SECRET: &str = "QWENVAOLDIEMAPOFURHALWOEMCHALIEDB";
const DEFAULT_TOKEN_LIFETIME_SECONDS: i64 = 7 * 24 * 60 * 60;

struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    token_lifetime_seconds: i64,
}

impl JwtKeys {
    fn from_secret(secret: &str, token_lifetime_seconds: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_ref()),
            decoding: DecodingKey::from_secret(secret.as_ref()),
            token_lifetime_seconds,
        }
    }

    fn from_config(config: &JwtAuthConfig) -> Self {
        Self::from_secret(
            config.secret.expose_secret(),
            config.token_expiration_time,
        )
    }
}

static KEYS: OnceCell<JwtKeys> = OnceCell::new();

/// Install the signing material from configuration. Must run before the
/// first token is minted or checked; later calls are ignored.
pub fn init_jwt_auth(config: &JwtAuthConfig) {
    let _ = KEYS.set(JwtKeys::from_config(config));
}

fn keys() -> &'static JwtKeys {
    KEYS.get_or_init(|| {
        JwtKeys::from_secret(DEFAULT_JWT_SECRET, DEFAULT_TOKEN_LIFETIME_SECONDS)
    })
}

/// Lifetime a freshly minted token should carry, in seconds.
pub fn token_lifetime_seconds() -> i64 {
    keys().token_lifetime_seconds
}

impl FromRequest for JwtMiddleware {
    type Error = ActixWebError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let token = req
            .headers()
            .get(http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|auth_header| auth_header.strip_prefix("Bearer "))
            .map(|token| token.to_string());

        if token.is_none() {
            let error = ErrorResponse {
                message: "Invalid login credentials".to_string(),
                success: false,
            };

            return ready(Err(ErrorUnauthorized(error)));
        }

        let claims = match decode::<JwtClaims>(
            &token.unwrap(),
            &keys().decoding,
            &Validation::default(),
        ) {
            Ok(c) => c.claims,
            Err(_ea) => {
                let error = ErrorResponse {
                    message: "Invalid token".to_string(),
                    success: false,
                };
                return ready(Err(ErrorUnauthorized(error)));
            }
        };

        let principal_id: Uuid = match claims.sub.parse() {
            Ok(id) => id,
            Err(_) => {
                let error = ErrorResponse {
                    message: "Invalid principal ID in token".to_string(),
                    success: false,
                };
                return ready(Err(ErrorUnauthorized(error)));
            }
        };

        let role: PrincipalRole = match claims.role.parse() {
            Ok(role) => role,
            Err(_) => {
                let error = ErrorResponse {
                    message: "Invalid role in token".to_string(),
                    success: false,
                };
                return ready(Err(ErrorUnauthorized(error)));
            }
        };

        req.extensions_mut().insert(claims.clone());

        ready(Ok(JwtMiddleware {
            principal_id,
            role,
            claims,
        }))
    }
}

pub fn generate_jwt_token(claims: &JwtClaims) -> Result<String, AppError> {
    let header = Header::default();

    encode(&header, claims, &keys().encoding)
        .map_err(|_| AppError::internal_error("Failed to generate JWT token"))
}

impl FromRequest for JwtClaims {
    type Error = ActixWebError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        if let Some(claims) = req.extensions().get::<JwtClaims>() {
            ready(Ok(claims.clone()))
        } else {
            let error = ErrorResponse {
                message: "No authentication token found".to_string(),
                success: false,
            };
            ready(Err(ErrorUnauthorized(error)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claim::assert_ok;
    use secrecy::Secret;

    fn sample_claims(role: &str) -> JwtClaims {
        JwtClaims {
            sub: Uuid::new_v4().to_string(),
            email: "clinic@example.org".to_string(),
            role: role.to_string(),
            exp: (chrono::Utc::now() + chrono::Duration::days(1)).timestamp() as usize,
        }
    }

    #[test]
    fn minted_token_decodes_back_to_the_same_claims() {
        let claims = sample_claims("hospital");

        let token = generate_jwt_token(&claims);
        let token = assert_ok!(token);

        let decoded = decode::<JwtClaims>(&token, &keys().decoding, &Validation::default())
            .expect("token should decode")
            .claims;

        assert_eq!(decoded.sub, claims.sub);
        assert_eq!(decoded.email, claims.email);
        assert_eq!(decoded.role, claims.role);
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = JwtClaims {
            sub: Uuid::new_v4().to_string(),
            email: "p@example.org".to_string(),
            role: "patient".to_string(),
            exp: (chrono::Utc::now() - chrono::Duration::hours(2)).timestamp() as usize,
        };

        let token = generate_jwt_token(&claims).unwrap();
        let decoded = decode::<JwtClaims>(&token, &keys().decoding, &Validation::default());
        assert!(decoded.is_err());
    }

    #[test]
    fn configured_secret_and_lifetime_drive_the_keys() {
        let config = JwtAuthConfig {
            secret: Secret::new("rotated-secret".to_string()),
            token_expiration_time: 3600,
        };
        let configured = JwtKeys::from_config(&config);
        assert_eq!(configured.token_lifetime_seconds, 3600);

        let claims = sample_claims("patient");
        let token = encode(&Header::default(), &claims, &configured.encoding).unwrap();

        let decoded =
            decode::<JwtClaims>(&token, &configured.decoding, &Validation::default())
                .expect("token should decode with its own keys")
                .claims;
        assert_eq!(decoded.sub, claims.sub);

        // a token from another secret must not verify
        let other = JwtKeys::from_secret("some-other-secret", 3600);
        assert!(decode::<JwtClaims>(&token, &other.decoding, &Validation::default()).is_err());
    }
}
